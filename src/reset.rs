//! Reset state machine: re-seeds pattern selection and drives the crossfade
//! transition. No other component changes the pattern or texture order.

/// Number of procedural base patterns
pub const PATTERN_COUNT: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetPhase {
    Idle,
    Transitioning,
}

/// Seed, pattern index and crossfade progress. `active_pattern` is a pure
/// function of the seed and stays stable between resets so the visuals never
/// pop mid-performance.
#[derive(Clone, Copy, Debug)]
pub struct ResetController {
    transition_progress: f32,
    transition_duration: f32,
    current_seed: u32,
    active_pattern: u32,
}

impl ResetController {
    pub fn new(seed: u32, transition_duration_s: f32) -> Self {
        Self {
            transition_progress: 1.0,
            transition_duration: transition_duration_s.max(1e-3),
            current_seed: seed,
            active_pattern: seed % PATTERN_COUNT,
        }
    }

    pub fn phase(&self) -> ResetPhase {
        if self.transition_progress >= 1.0 {
            ResetPhase::Idle
        } else {
            ResetPhase::Transitioning
        }
    }

    pub fn seed(&self) -> u32 {
        self.current_seed
    }

    pub fn active_pattern(&self) -> u32 {
        self.active_pattern
    }

    /// Crossfade progress in [0,1]; 1.0 means no transition is running.
    pub fn transition_progress(&self) -> f32 {
        self.transition_progress
    }

    /// Reset with a freshly drawn 32-bit seed.
    pub fn reset(&mut self) {
        self.reset_to_seed(fastrand::u32(..));
    }

    /// Reset to an explicit seed: recompute the pattern index and start the
    /// crossfade from zero. A reset during a transition restarts it; the
    /// latest seed wins.
    pub fn reset_to_seed(&mut self, seed: u32) {
        self.current_seed = seed;
        self.active_pattern = seed % PATTERN_COUNT;
        self.transition_progress = 0.0;
    }

    /// Advance the crossfade by one frame.
    pub fn advance(&mut self, delta_time_s: f32) {
        if self.transition_progress < 1.0 {
            self.transition_progress =
                (self.transition_progress + delta_time_s / self.transition_duration).min(1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let rc = ResetController::new(42, 1.5);
        assert_eq!(rc.phase(), ResetPhase::Idle);
        assert_eq!(rc.transition_progress(), 1.0);
    }

    #[test]
    fn test_pattern_is_seed_mod_8() {
        // seed 42 selects pattern 2 (plasma waves)
        let rc = ResetController::new(42, 1.5);
        assert_eq!(rc.active_pattern(), 2);

        let mut rc = ResetController::new(0, 1.5);
        rc.reset_to_seed(15);
        assert_eq!(rc.active_pattern(), 7);
    }

    #[test]
    fn test_transition_advances_and_completes() {
        let mut rc = ResetController::new(0, 1.0);
        rc.reset_to_seed(7);
        assert_eq!(rc.phase(), ResetPhase::Transitioning);

        // 30 frames at ~33ms ≈ 1 second
        for _ in 0..29 {
            rc.advance(1.0 / 30.0);
            assert!(rc.transition_progress() <= 1.0);
        }
        rc.advance(1.0 / 30.0);
        rc.advance(1.0 / 30.0);
        assert_eq!(rc.phase(), ResetPhase::Idle);
        assert_eq!(rc.transition_progress(), 1.0);
    }

    #[test]
    fn test_double_reset_takes_second_seed() {
        let mut rc = ResetController::new(0, 1.0);
        rc.reset_to_seed(100);
        rc.reset_to_seed(200);

        assert_eq!(rc.seed(), 200);
        assert_eq!(rc.active_pattern(), 200 % PATTERN_COUNT);
        assert_eq!(rc.transition_progress(), 0.0);

        // Runs to completion like a single reset would
        for _ in 0..60 {
            rc.advance(1.0 / 30.0);
        }
        assert_eq!(rc.phase(), ResetPhase::Idle);
        assert_eq!(rc.transition_progress(), 1.0);
        assert_eq!(rc.seed(), 200);
    }

    #[test]
    fn test_zero_duration_is_clamped() {
        let mut rc = ResetController::new(0, 0.0);
        rc.reset_to_seed(1);
        rc.advance(1.0 / 30.0);
        assert_eq!(rc.phase(), ResetPhase::Idle);
    }
}
