//! Per-frame uniform blocks shared by all shader passes.
//!
//! `FrameUniforms` is rebuilt from scratch every frame before any pass runs,
//! so all four passes observe the same audio state. Layout is `#[repr(C)]`
//! and must track the `Uniforms` struct in `shaders/common.wgsl` field for
//! field.

use bytemuck::{Pod, Zeroable};

use crate::audio::AudioLevels;
use crate::pack::{ColorPalette, PALETTE_SIZE};
use crate::params::ControlParams;
use crate::reset::ResetController;

/// Glitch amounts below this skip the glitch pass entirely
pub const GLITCH_MIN_THRESHOLD: f32 = 0.01;

/// Per-frame uniform block, identical for all passes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniforms {
    pub time: f32,
    pub delta_time: f32,

    // Audio
    pub level: f32,
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    pub user_band: f32,
    pub peak: f32,
    pub smooth: f32,

    // Controls
    pub intensity: f32,
    pub glitch_amount: f32,
    pub speed: f32,
    pub color_shift: f32,
    pub pulse_strength: f32,
    pub monochrome: i32,

    pub texture_count: i32,

    // vec2 must sit on an 8-byte boundary for WGSL
    pub resolution: [f32; 2],

    pub random_seed: u32,
    pub active_pattern: i32,

    // Glitch stutter scratch
    pub last_glitch_time: f32,
    pub glitch_hold_time: f32,

    pub transition_progress: f32,
    pub _pad: f32,
}

/// Palette block bound separately: 6 RGBA colors + count, padded to a
/// 16-byte-aligned 112-byte block.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct PaletteUniform {
    pub colors: [[f32; 4]; PALETTE_SIZE],
    pub count: u32,
    pub _pad: [u32; 3],
}

impl From<ColorPalette> for PaletteUniform {
    fn from(p: ColorPalette) -> Self {
        Self {
            colors: p.colors,
            count: p.count,
            _pad: [0; 3],
        }
    }
}

impl FrameUniforms {
    /// Assemble the frame's uniform snapshot. Every normalized field is
    /// clamped here, never inside a shader.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        time: f32,
        delta_time: f32,
        levels: AudioLevels,
        params: ControlParams,
        reset: &ResetController,
        glitch: &GlitchTimer,
        resolution: (u32, u32),
        texture_count: usize,
    ) -> Self {
        Self {
            time,
            delta_time,
            level: levels.overall.clamp(0.0, 1.0),
            bass: levels.bass.clamp(0.0, 1.0),
            mid: levels.mid.clamp(0.0, 1.0),
            high: levels.high.clamp(0.0, 1.0),
            user_band: levels.user_band.clamp(0.0, 1.0),
            peak: levels.peak.clamp(0.0, 1.0),
            smooth: levels.smooth.clamp(0.0, 1.0),
            intensity: params.intensity.clamp(0.0, 1.0),
            glitch_amount: params.glitch_amount.clamp(0.0, 1.0),
            speed: params.speed.clamp(1, 4) as f32,
            color_shift: params.color_shift.clamp(0.0, 1.0),
            pulse_strength: params.pulse_strength.clamp(0.0, 1.0),
            monochrome: params.monochrome as i32,
            texture_count: texture_count.min(4) as i32,
            resolution: [resolution.0 as f32, resolution.1 as f32],
            random_seed: reset.seed(),
            active_pattern: reset.active_pattern() as i32,
            last_glitch_time: glitch.last_glitch_time(),
            glitch_hold_time: glitch.hold_time(),
            transition_progress: reset.transition_progress().clamp(0.0, 1.0),
            _pad: 0.0,
        }
    }
}

/// CPU-side stutter/freeze scheduler for the glitch pass.
///
/// Opens probabilistic freeze windows whose chance and length grow with the
/// glitch amount and transient peaks. The multipliers are tuned by ear, not
/// derived.
#[derive(Clone, Copy, Debug)]
pub struct GlitchTimer {
    last_glitch_time: f32,
    hold_time: f32,
    state: u32,
}

/// Chance per eligible frame that a freeze window opens, at full glitch
const FREEZE_CHANCE: f32 = 0.3;
/// Peak contribution to the freeze chance
const PEAK_FREEZE_BOOST: f32 = 0.5;
/// Longest freeze window (seconds), scaled by glitch amount
const MAX_HOLD_S: f32 = 0.25;
/// Shortest freeze window (seconds)
const MIN_HOLD_S: f32 = 0.05;

impl GlitchTimer {
    pub fn new(seed: u32) -> Self {
        Self {
            last_glitch_time: -1.0,
            hold_time: 0.0,
            state: seed | 1,
        }
    }

    pub fn last_glitch_time(&self) -> f32 {
        self.last_glitch_time
    }

    pub fn hold_time(&self) -> f32 {
        self.hold_time
    }

    /// True while a freeze window is open at `time`.
    pub fn frozen(&self, time: f32) -> bool {
        time >= self.last_glitch_time && time < self.last_glitch_time + self.hold_time
    }

    /// Advance the stutter schedule one frame.
    pub fn update(&mut self, time: f32, glitch_amount: f32, peak: f32) {
        if glitch_amount < GLITCH_MIN_THRESHOLD || self.frozen(time) {
            return;
        }
        let roll = self.next_f32();
        let chance =
            (glitch_amount * FREEZE_CHANCE + peak * glitch_amount * PEAK_FREEZE_BOOST) * 0.1;
        if roll < chance {
            self.last_glitch_time = time;
            self.hold_time = MIN_HOLD_S + self.next_f32() * MAX_HOLD_S * glitch_amount;
        } else {
            self.hold_time = 0.0;
        }
    }

    fn next_f32(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        (self.state >> 16) as f32 / 65536.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ControlParams;
    use crate::reset::ResetController;

    fn adversarial_levels() -> AudioLevels {
        AudioLevels {
            overall: 7.0,
            bass: -3.0,
            mid: 1.5,
            high: 0.5,
            user_band: 2.0,
            peak: 9.9,
            smooth: -0.1,
        }
    }

    #[test]
    fn test_uniform_sizes() {
        // Fixed-order binary layout shared with WGSL; both blocks 16-byte
        // aligned, palette exactly 112 bytes
        assert_eq!(std::mem::size_of::<FrameUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<PaletteUniform>(), 112);
    }

    #[test]
    fn test_build_clamps_everything() {
        let mut params = ControlParams::default();
        params.set_intensity(1.0);
        let reset = ResetController::new(42, 1.5);
        let glitch = GlitchTimer::new(42);

        let u = FrameUniforms::build(
            1.0,
            0.033,
            adversarial_levels(),
            params,
            &reset,
            &glitch,
            (1280, 720),
            9,
        );

        for v in [
            u.level,
            u.bass,
            u.mid,
            u.high,
            u.user_band,
            u.peak,
            u.smooth,
            u.intensity,
            u.glitch_amount,
            u.color_shift,
            u.pulse_strength,
            u.transition_progress,
        ] {
            assert!((0.0..=1.0).contains(&v), "out of range: {v}");
        }
        assert!((1.0..=4.0).contains(&u.speed));
        // Bound-per-frame cap
        assert_eq!(u.texture_count, 4);
        assert_eq!(u.active_pattern, 2);
        assert_eq!(u.random_seed, 42);
    }

    #[test]
    fn test_glitch_timer_quiet_below_threshold() {
        let mut timer = GlitchTimer::new(123);
        for frame in 0..1000 {
            timer.update(frame as f32 / 30.0, 0.0, 1.0);
        }
        assert_eq!(timer.hold_time(), 0.0);
        assert!(!timer.frozen(33.0));
    }

    #[test]
    fn test_glitch_timer_eventually_freezes_at_full_glitch() {
        let mut timer = GlitchTimer::new(123);
        let mut froze = false;
        for frame in 0..10000 {
            let t = frame as f32 / 30.0;
            timer.update(t, 1.0, 1.0);
            froze |= timer.frozen(t);
        }
        assert!(froze);
    }

    #[test]
    fn test_freeze_window_is_bounded() {
        let mut timer = GlitchTimer::new(9);
        for frame in 0..10000 {
            timer.update(frame as f32 / 30.0, 1.0, 1.0);
            assert!(timer.hold_time() <= MIN_HOLD_S + MAX_HOLD_S);
        }
    }
}
