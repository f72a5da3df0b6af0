//! Audio input capture and the analysis thread behind it.
//!
//! The cpal callback only appends samples to a shared buffer; all FFT work
//! happens on a dedicated analysis thread that publishes `AudioLevels`
//! snapshots without ever blocking the capture or render side.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{AudioLevels, SpectrumAnalyzer};
use crate::params::{AnalyzerConfig, SharedParams};

/// Hardware availability reported upward; never prevents instantiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureStatus {
    Available,
    Denied,
    Restricted,
    Unknown,
}

/// Device-switch state machine. A new switch request invalidates any switch
/// already in progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchState {
    Idle,
    Switching,
    Ready,
    Failed,
}

/// Audio capture subsystem.
///
/// Always constructs: with no usable input device it emits all-zero levels so
/// the renderer runs on procedural content alone.
pub struct AudioCapture {
    config: AnalyzerConfig,
    levels: Arc<Mutex<AudioLevels>>,
    sample_buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<cpal::Stream>,
    status: CaptureStatus,
    switch_state: SwitchState,
    /// Device sample rate, shared with the analysis thread
    sample_rate: Arc<AtomicUsize>,
    _analysis_thread: thread::JoinHandle<()>,
}

impl AudioCapture {
    /// Start capture on the named device (substring match) or the default
    /// input device. Hardware failure degrades to zeroed levels.
    pub fn new(config: AnalyzerConfig, params: SharedParams, device_hint: Option<&str>) -> Self {
        let levels = Arc::new(Mutex::new(AudioLevels::default()));
        let sample_buffer = Arc::new(Mutex::new(Vec::<f32>::new()));
        let sample_rate = Arc::new(AtomicUsize::new(config.sample_rate_hz));

        let analysis_thread = spawn_analysis_thread(
            config.clone(),
            Arc::clone(&sample_buffer),
            Arc::clone(&levels),
            Arc::clone(&sample_rate),
            params,
        );

        let mut capture = Self {
            config,
            levels,
            sample_buffer,
            stream: None,
            status: CaptureStatus::Unknown,
            switch_state: SwitchState::Idle,
            sample_rate,
            _analysis_thread: analysis_thread,
        };
        capture.switch_device(device_hint);
        capture
    }

    /// Most recent fully-computed levels snapshot.
    pub fn levels(&self) -> AudioLevels {
        *self.levels.lock().unwrap()
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn switch_state(&self) -> SwitchState {
        self.switch_state
    }

    /// Names of all input devices on the default host.
    pub fn list_devices() -> Vec<String> {
        let host = cpal::default_host();
        match host.input_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                eprintln!("[audio] device enumeration failed: {e}");
                Vec::new()
            }
        }
    }

    /// Tear down the current stream and rebuild capture on a new device.
    /// Buffered samples from the old device are discarded, not queued.
    pub fn switch_device(&mut self, device_hint: Option<&str>) {
        self.switch_state = SwitchState::Switching;

        // Stop the old stream before touching the buffer so no stale block
        // lands after the clear.
        self.stream = None;
        self.sample_buffer.lock().unwrap().clear();
        *self.levels.lock().unwrap() = AudioLevels::default();

        match self.build_stream(device_hint) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.status = CaptureStatus::Available;
                self.switch_state = SwitchState::Ready;
            }
            Err((status, msg)) => {
                eprintln!("[audio] capture unavailable: {msg}");
                self.status = status;
                self.switch_state = SwitchState::Failed;
            }
        }
    }

    fn build_stream(
        &mut self,
        device_hint: Option<&str>,
    ) -> Result<cpal::Stream, (CaptureStatus, String)> {
        let host = cpal::default_host();

        let device = match device_hint {
            Some(hint) => {
                let hint_lower = hint.to_lowercase();
                host.input_devices()
                    .map_err(|e| (CaptureStatus::Unknown, e.to_string()))?
                    .find(|d| {
                        d.name()
                            .map(|n| n.to_lowercase().contains(&hint_lower))
                            .unwrap_or(false)
                    })
                    .ok_or((
                        CaptureStatus::Unknown,
                        format!("no input device matching '{hint}'"),
                    ))?
            }
            None => host
                .default_input_device()
                .ok_or((CaptureStatus::Unknown, "no input device found".to_string()))?,
        };

        let stream_config = device
            .default_input_config()
            .map_err(|e| (CaptureStatus::Restricted, e.to_string()))?;

        self.config.sample_rate_hz = stream_config.sample_rate().0 as usize;
        self.sample_rate
            .store(self.config.sample_rate_hz, Ordering::Relaxed);
        let channels = stream_config.channels() as usize;
        let window = self.config.window_size;

        println!(
            "[audio] capture: {} @ {}Hz ({} ch)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            self.config.sample_rate_hz,
            channels
        );

        let buffer = Arc::clone(&self.sample_buffer);
        let stream = device
            .build_input_stream(
                &stream_config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut buf = buffer.lock().unwrap();
                    // Downmix interleaved frames to mono
                    for frame in data.chunks(channels.max(1)) {
                        let sum: f32 = frame.iter().sum();
                        buf.push(sum / frame.len() as f32);
                    }
                    // Under load, drop stale history instead of queueing:
                    // only the most recent windows matter.
                    let len = buf.len();
                    if len > window * 4 {
                        buf.drain(0..len - window * 2);
                    }
                },
                |err| eprintln!("[audio] stream error: {err}"),
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => {
                    (CaptureStatus::Restricted, e.to_string())
                }
                cpal::BuildStreamError::BackendSpecific { .. } => {
                    (CaptureStatus::Denied, e.to_string())
                }
                other => (CaptureStatus::Unknown, other.to_string()),
            })?;

        stream
            .play()
            .map_err(|e| (CaptureStatus::Unknown, e.to_string()))?;

        Ok(stream)
    }
}

/// Spawn the analysis thread: consumes the capture buffer at its own cadence
/// and publishes smoothed levels. The publish side never waits on the render
/// thread; a contended slot keeps its previous snapshot.
fn spawn_analysis_thread(
    config: AnalyzerConfig,
    sample_buffer: Arc<Mutex<Vec<f32>>>,
    levels: Arc<Mutex<AudioLevels>>,
    sample_rate: Arc<AtomicUsize>,
    params: SharedParams,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut analyzer = match SpectrumAnalyzer::new(config.clone()) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("[audio] analyzer init failed: {e}");
                return;
            }
        };
        let mut window = vec![0.0f32; config.window_size];

        loop {
            thread::sleep(Duration::from_millis(config.update_interval_ms));

            let ready = {
                let mut buf = sample_buffer.lock().unwrap();
                if buf.len() >= config.window_size {
                    window.copy_from_slice(&buf[..config.window_size]);
                    // 50% overlap between consecutive windows
                    buf.drain(0..config.window_size / 2);
                    true
                } else {
                    false
                }
            };

            if ready {
                let sr = sample_rate.load(Ordering::Relaxed);
                if sr != analyzer.config().sample_rate_hz {
                    analyzer.set_sample_rate(sr);
                }
                let p = params.snapshot();
                let new_levels = analyzer.analyze(&window, (p.freq_min, p.freq_max));
                if let Ok(mut slot) = levels.try_lock() {
                    *slot = new_levels;
                }
            }
        }
    })
}
