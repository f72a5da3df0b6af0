//! FFT band extraction, exponential smoothing and transient detection.
//!
//! The analyzer is a plain struct operating on sample slices, so tests can
//! feed it synthetic buffers without any audio hardware behind it.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use super::AudioLevels;
use crate::params::AnalyzerConfig;

/// Smoothing coefficient for the extra-slow `smooth` field
const SLOW_SMOOTHING: f32 = 0.9;

/// Spectral analyzer turning raw sample windows into smoothed band energies.
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    levels: AudioLevels,
}

impl SpectrumAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, String> {
        config.validate()?;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.window_size);
        let scratch = vec![Complex::new(0.0, 0.0); config.window_size];
        let magnitudes = vec![0.0; config.window_size / 2];

        Ok(Self {
            config,
            fft,
            scratch,
            magnitudes,
            levels: AudioLevels::default(),
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Adopt the capture device's actual sample rate. Band bin ranges are
    /// recomputed from the config on every call, so this takes effect on the
    /// next window.
    pub fn set_sample_rate(&mut self, sample_rate_hz: usize) {
        if sample_rate_hz > 0 {
            self.config.sample_rate_hz = sample_rate_hz;
        }
    }

    /// Most recent analysis result.
    pub fn levels(&self) -> AudioLevels {
        self.levels
    }

    /// Analyze one window of mono samples and fold the result into the
    /// smoothed levels.
    ///
    /// `user_band_hz` is re-read every call so the boundary can move live.
    /// `window` must hold at least `config.window_size` samples; only the
    /// first window-size samples are used.
    pub fn analyze(&mut self, window: &[f32], user_band_hz: (f32, f32)) -> AudioLevels {
        let n = self.config.window_size;
        debug_assert!(window.len() >= n);

        for i in 0..n {
            let w = hann_window(i, n);
            self.scratch[i] = Complex::new(window[i] * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        for (i, mag) in self.magnitudes.iter_mut().enumerate() {
            // Guard against NaN/inf samples leaking into band means
            let m = self.scratch[i].norm();
            *mag = if m.is_finite() { m } else { 0.0 };
        }

        let raw_overall = self.band_energy(0..self.magnitudes.len());
        let raw = AudioLevels {
            overall: raw_overall,
            bass: self.band_energy(self.config.bass_bins()),
            mid: self.band_energy(self.config.mid_bins()),
            high: self.band_energy(self.config.high_bins()),
            user_band: self.band_energy(self.config.bins_for(user_band_hz)),
            peak: 0.0,
            smooth: 0.0,
        };

        let a = self.config.smoothing;
        let prev = self.levels;
        self.levels = AudioLevels {
            overall: prev.overall * a + raw.overall * (1.0 - a),
            bass: prev.bass * a + raw.bass * (1.0 - a),
            mid: prev.mid * a + raw.mid * (1.0 - a),
            high: prev.high * a + raw.high * (1.0 - a),
            user_band: prev.user_band * a + raw.user_band * (1.0 - a),
            // Instant attack, multiplicative decay
            peak: if raw.overall > prev.peak {
                raw.overall
            } else {
                prev.peak * self.config.peak_decay
            },
            smooth: prev.smooth * SLOW_SMOOTHING + raw.overall * (1.0 - SLOW_SMOOTHING),
        };

        self.levels
    }

    /// Mean magnitude across a bin range, scaled and clamped to [0,1].
    /// An empty range reports 0 rather than failing.
    fn band_energy(&self, bins: std::ops::Range<usize>) -> f32 {
        if bins.is_empty() {
            return 0.0;
        }
        let len = bins.len() as f32;
        let sum: f32 = self.magnitudes[bins].iter().sum();
        (sum / len * self.config.band_gain).clamp(0.0, 1.0)
    }
}

/// Hann window function
pub fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> SpectrumAnalyzer {
        SpectrumAnalyzer::new(AnalyzerConfig::default()).unwrap()
    }

    fn full_band() -> (f32, f32) {
        (20.0, 20000.0)
    }

    /// Sine wave at the given frequency, one analysis window long
    fn sine(freq_hz: f32, config: &AnalyzerConfig) -> Vec<f32> {
        (0..config.window_size)
            .map(|i| {
                (2.0 * PI * freq_hz * i as f32 / config.sample_rate_hz as f32).sin()
            })
            .collect()
    }

    #[test]
    fn test_hann_window() {
        let size = 2048;

        // 0 at the edges, 1 at the center
        assert!((hann_window(0, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size - 1, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_silence_yields_zero_levels() {
        let mut a = analyzer();
        let silent = vec![0.0; a.config().window_size];
        let levels = a.analyze(&silent, full_band());

        assert_eq!(levels.overall, 0.0);
        assert_eq!(levels.bass, 0.0);
        assert_eq!(levels.mid, 0.0);
        assert_eq!(levels.high, 0.0);
        assert_eq!(levels.user_band, 0.0);
        assert_eq!(levels.peak, 0.0);
    }

    #[test]
    fn test_bass_tone_lands_in_bass_band() {
        let mut a = analyzer();
        let tone = sine(100.0, a.config());

        // Run several windows so smoothing converges toward the raw value
        let mut levels = AudioLevels::default();
        for _ in 0..20 {
            levels = a.analyze(&tone, full_band());
        }

        assert!(levels.bass > 0.0);
        assert!(levels.bass > levels.high * 4.0);
    }

    #[test]
    fn test_levels_clamped_for_adversarial_input() {
        let mut a = analyzer();
        let n = a.config().window_size;

        // Full-scale square wave, then NaN/inf contamination
        let loud: Vec<f32> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut poisoned = loud.clone();
        poisoned[0] = f32::NAN;
        poisoned[1] = f32::INFINITY;

        for buf in [&loud, &poisoned] {
            for _ in 0..10 {
                let levels = a.analyze(buf, full_band());
                for v in [
                    levels.overall,
                    levels.bass,
                    levels.mid,
                    levels.high,
                    levels.user_band,
                    levels.peak,
                    levels.smooth,
                ] {
                    assert!((0.0..=1.0).contains(&v), "out of range: {v}");
                    assert!(v.is_finite());
                }
            }
        }
    }

    #[test]
    fn test_smoothing_converges() {
        // Single-pole EMA driven by a constant must converge within 1e-3
        // after 50 iterations at alpha = 0.7
        let a = 0.7f32;
        let target = 0.63f32;
        let mut smoothed = 0.0f32;
        for _ in 0..50 {
            smoothed = smoothed * a + target * (1.0 - a);
        }
        assert!((smoothed - target).abs() < 1e-3);
    }

    #[test]
    fn test_peak_attack_and_monotone_decay() {
        let mut a = analyzer();
        let n = a.config().window_size;
        let tone = sine(100.0, a.config());
        let silent = vec![0.0; n];

        // Impulse: one loud window
        let levels = a.analyze(&tone, full_band());
        let peak_after_impulse = levels.peak;
        assert!(peak_after_impulse > 0.0);
        // Attack is instant: peak tracks the raw overall upward immediately
        assert!(peak_after_impulse >= levels.overall);

        // Decay: strictly below previous value each step, by the decay factor
        let decay = a.config().peak_decay;
        let mut prev = peak_after_impulse;
        for _ in 0..10 {
            let levels = a.analyze(&silent, full_band());
            assert!((levels.peak - prev * decay).abs() < 1e-6);
            assert!(levels.peak <= prev);
            prev = levels.peak;
        }
    }

    #[test]
    fn test_collapsed_user_band_reports_zero() {
        let mut a = analyzer();
        let tone = sine(440.0, a.config());
        let levels = a.analyze(&tone, (5000.0, 100.0));
        assert_eq!(levels.user_band, 0.0);
    }
}
