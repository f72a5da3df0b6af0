//! Rendering configuration.

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Window width (pixels)
    pub window_width: u32,

    /// Window height (pixels)
    pub window_height: u32,

    /// Target frame rate (frames per second); the frame budget is 1/fps
    pub target_fps: u32,

    /// Maximum resident reference textures
    pub texture_cache_limit: usize,

    /// Reference textures bound per frame
    pub textures_per_frame: usize,

    /// Crossfade duration after a reset (seconds)
    pub transition_duration_s: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            target_fps: 30,
            texture_cache_limit: 16,
            textures_per_frame: 4,
            transition_duration_s: 1.5,
        }
    }
}

impl RenderConfig {
    /// Per-frame time budget in milliseconds
    pub fn frame_budget_ms(&self) -> f32 {
        1000.0 / self.target_fps as f32
    }
}
