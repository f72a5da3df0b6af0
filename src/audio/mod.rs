//! Real-time spectral analysis: capture, FFT band extraction, smoothing.

mod analyzer;
mod capture;

pub use analyzer::{hann_window, SpectrumAnalyzer};
pub use capture::{AudioCapture, CaptureStatus, SwitchState};

/// Smoothed frequency band energies, published once per analysis window and
/// snapshotted by the render thread once per video frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioLevels {
    /// Mean magnitude across the whole spectrum [0,1]
    pub overall: f32,
    /// Bass band (20-250 Hz) [0,1]
    pub bass: f32,
    /// Mid band (250-2000 Hz) [0,1]
    pub mid: f32,
    /// High band (2000-20000 Hz) [0,1]
    pub high: f32,
    /// User-configurable band [0,1]
    pub user_band: f32,
    /// Fast-attack / slow-decay transient tracker [0,1]
    pub peak: f32,
    /// Extra-smoothed overall level for slow modulation [0,1]
    pub smooth: f32,
}
