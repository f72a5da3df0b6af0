//! Spectral analysis configuration and constants.

use std::ops::Range;

/// Analysis configuration with frequency band mappings
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Audio sample rate (Hz), replaced with the device rate at capture setup
    pub sample_rate_hz: usize,

    /// Analysis window size in samples (must be power of 2)
    /// 2048 @ 44.1 kHz ≈ 46 ms
    pub window_size: usize,

    /// Analysis interval (milliseconds) for the FFT thread
    pub update_interval_ms: u64,

    /// Bass frequency range (Hz)
    pub bass_range_hz: (f32, f32),

    /// Mid frequency range (Hz)
    pub mid_range_hz: (f32, f32),

    /// High frequency range (Hz)
    pub high_range_hz: (f32, f32),

    /// Gain applied to mean band magnitude before clamping to [0,1]
    pub band_gain: f32,

    /// EMA coefficient for band smoothing: smoothed = smoothed*a + new*(1-a)
    pub smoothing: f32,

    /// Multiplicative decay applied to the peak tracker per analysis cycle
    pub peak_decay: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44100,
            window_size: 2048,
            update_interval_ms: 10,
            bass_range_hz: (20.0, 250.0),
            mid_range_hz: (250.0, 2000.0),
            high_range_hz: (2000.0, 20000.0),
            band_gain: 0.12,
            smoothing: 0.7,
            peak_decay: 0.95,
        }
    }
}

impl AnalyzerConfig {
    /// Convert frequency (Hz) to FFT bin index
    pub fn hz_to_bin(&self, hz: f32) -> usize {
        ((hz * self.window_size as f32) / self.sample_rate_hz as f32) as usize
    }

    /// Bin range for an arbitrary frequency span, clamped to the usable half-spectrum.
    /// Collapsed spans produce an empty range rather than an error.
    pub fn bins_for(&self, range_hz: (f32, f32)) -> Range<usize> {
        let half = self.window_size / 2;
        let start = self.hz_to_bin(range_hz.0).min(half);
        let end = (self.hz_to_bin(range_hz.1) + 1).min(half);
        start..end.max(start)
    }

    /// Bin range for bass frequencies
    pub fn bass_bins(&self) -> Range<usize> {
        self.bins_for(self.bass_range_hz)
    }

    /// Bin range for mid frequencies
    pub fn mid_bins(&self) -> Range<usize>  {
        self.bins_for(self.mid_range_hz)
    }

    /// Bin range for high frequencies
    pub fn high_bins(&self) -> Range<usize> {
        self.bins_for(self.high_range_hz)
    }

    /// Validate configuration (window size must be power of 2, etc.)
    pub fn validate(&self) -> Result<(), String> {
        if !self.window_size.is_power_of_two() {
            return Err(format!(
                "analysis window must be power of 2, got {}",
                self.window_size
            ));
        }
        if self.sample_rate_hz == 0 {
            return Err("sample rate must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hz_to_bin() {
        let config = AnalyzerConfig::default();

        // At 44100 Hz and 2048-sample window: ~21.5 Hz per bin
        assert_eq!(config.hz_to_bin(0.0), 0);
        assert_eq!(config.hz_to_bin(80.0), 3);
        assert_eq!(config.hz_to_bin(4200.0), 195);
    }

    #[test]
    fn test_user_band_example() {
        // 80-4200 Hz @ 44.1 kHz / 2048 samples covers bins 3..=194
        let config = AnalyzerConfig::default();
        let bins = config.bins_for((80.0, 4200.0));
        assert_eq!(bins.start, 3);
        assert!(bins.contains(&194));
    }

    #[test]
    fn test_collapsed_band_is_empty() {
        let config = AnalyzerConfig::default();
        let bins = config.bins_for((1000.0, 1000.0));
        // A degenerate span still yields a well-formed (possibly tiny) range
        assert!(bins.start <= bins.end);

        let inverted = config.bins_for((4000.0, 100.0));
        assert!(inverted.is_empty());
    }

    #[test]
    fn test_band_ranges_ordered() {
        let config = AnalyzerConfig::default();
        assert!(config.bass_bins().start <= config.mid_bins().start);
        assert!(config.mid_bins().start <= config.high_bins().start);
        // High band top is clamped to the usable half-spectrum
        assert!(config.high_bins().end <= config.window_size / 2);
    }

    #[test]
    fn test_validate_rejects_bad_window() {
        let mut config = AnalyzerConfig::default();
        config.window_size = 1000;
        assert!(config.validate().is_err());
    }
}
