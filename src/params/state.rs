//! Shared control-parameter state written by external collaborators
//! (UI, MIDI, OSC) and snapshotted once per frame by the compositor.

use std::sync::{Arc, Mutex};

/// User-controllable runtime parameters.
///
/// All writers go through the clamped setters; readers take a copy per frame
/// so a mid-frame write can never tear a pass sequence.
#[derive(Debug, Clone, Copy)]
pub struct ControlParams {
    /// Overall visual intensity [0,1]
    pub intensity: f32,
    /// Glitch probability and severity [0,1]
    pub glitch_amount: f32,
    /// Animation speed multiplier {1,2,3,4}
    pub speed: u32,
    /// Global hue rotation [0,1]
    pub color_shift: f32,
    /// How strongly visuals respond to beats [0,1]
    pub pulse_strength: f32,
    /// User-band lower bound (Hz)
    pub freq_min: f32,
    /// User-band upper bound (Hz)
    pub freq_max: f32,
    /// Collapse output to luminance
    pub monochrome: bool,
    /// Fire-once reset trigger, consumed at the top of the next frame
    reset_pending: bool,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            intensity: 0.7,
            glitch_amount: 0.3,
            speed: 2,
            color_shift: 0.0,
            pulse_strength: 0.5,
            freq_min: 20.0,
            freq_max: 20000.0,
            monochrome: false,
            reset_pending: false,
        }
    }
}

impl ControlParams {
    pub fn set_intensity(&mut self, v: f32) {
        self.intensity = v.clamp(0.0, 1.0);
    }

    pub fn set_glitch_amount(&mut self, v: f32) {
        self.glitch_amount = v.clamp(0.0, 1.0);
    }

    pub fn set_speed(&mut self, v: u32) {
        self.speed = v.clamp(1, 4);
    }

    pub fn set_color_shift(&mut self, v: f32) {
        self.color_shift = v.clamp(0.0, 1.0);
    }

    pub fn set_pulse_strength(&mut self, v: f32) {
        self.pulse_strength = v.clamp(0.0, 1.0);
    }

    /// User-band bounds in Hz. Ordering is the writer's job; the core only
    /// clamps into the audible span.
    pub fn set_freq_band(&mut self, min_hz: f32, max_hz: f32) {
        self.freq_min = min_hz.clamp(20.0, 20000.0);
        self.freq_max = max_hz.clamp(20.0, 20000.0);
    }

    pub fn set_monochrome(&mut self, on: bool) {
        self.monochrome = on;
    }

    /// Arm the fire-once reset trigger.
    pub fn trigger_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Consume the reset trigger if armed.
    pub fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset_pending)
    }
}

/// Thread-shared parameter state. Writers hold the lock only to mutate a
/// field; the render thread holds it only to copy the record out.
#[derive(Clone, Default)]
pub struct SharedParams {
    inner: Arc<Mutex<ControlParams>>,
}

impl SharedParams {
    pub fn new(params: ControlParams) -> Self {
        Self {
            inner: Arc::new(Mutex::new(params)),
        }
    }

    /// Copy the current parameter record.
    pub fn snapshot(&self) -> ControlParams {
        *self.inner.lock().unwrap()
    }

    /// Mutate the parameters under the lock.
    pub fn update(&self, f: impl FnOnce(&mut ControlParams)) {
        let mut guard = self.inner.lock().unwrap();
        f(&mut guard);
    }

    /// Consume the fire-once reset trigger.
    pub fn take_reset(&self) -> bool {
        self.inner.lock().unwrap().take_reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_clamp() {
        let mut p = ControlParams::default();
        p.set_intensity(2.5);
        p.set_glitch_amount(-1.0);
        p.set_speed(9);
        p.set_freq_band(-50.0, 99999.0);

        assert_eq!(p.intensity, 1.0);
        assert_eq!(p.glitch_amount, 0.0);
        assert_eq!(p.speed, 4);
        assert_eq!(p.freq_min, 20.0);
        assert_eq!(p.freq_max, 20000.0);
    }

    #[test]
    fn test_reset_is_fire_once() {
        let shared = SharedParams::default();
        assert!(!shared.take_reset());

        shared.update(|p| p.trigger_reset());
        assert!(shared.take_reset());
        assert!(!shared.take_reset());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let shared = SharedParams::default();
        let snap = shared.snapshot();
        shared.update(|p| p.set_intensity(0.0));

        // Earlier snapshot is unaffected by later writes
        assert_eq!(snap.intensity, ControlParams::default().intensity);
        assert_eq!(shared.snapshot().intensity, 0.0);
    }
}
