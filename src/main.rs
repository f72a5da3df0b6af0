//! Motionweave - audio-reactive multi-pass visual compositor
//!
//! Live audio drives a four-pass GPU pipeline: a procedural pattern layer,
//! a media-pack texture composite, a glitch stage, and a final grade.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use motionweave::audio::AudioCapture;
use motionweave::cli::Args;
use motionweave::compositor::FrameCompositor;
use motionweave::params::{AnalyzerConfig, ControlParams, RenderConfig, SharedParams};
use motionweave::reset::ResetController;
use motionweave::textures::TextureCache;
use motionweave::uniforms::{FrameUniforms, GlitchTimer, PaletteUniform};

/// Main application state
struct App {
    args: Args,

    // Window and rendering
    window: Option<Arc<Window>>,
    compositor: Option<FrameCompositor>,
    texture_cache: Option<TextureCache>,

    // Audio and control
    capture: Option<AudioCapture>,
    params: SharedParams,
    reset: ResetController,
    glitch: GlitchTimer,

    // Configuration
    render_config: RenderConfig,

    // Time tracking
    start_time: Instant,
    last_frame: Instant,
}

impl App {
    fn new(args: Args) -> Self {
        let render_config = args.render_config();
        let seed = args.seed.unwrap_or_else(|| fastrand::u32(..));
        let reset = ResetController::new(seed, render_config.transition_duration_s);
        let glitch = GlitchTimer::new(seed);

        Self {
            args,
            window: None,
            compositor: None,
            texture_cache: None,
            capture: None,
            params: SharedParams::new(ControlParams::default()),
            reset,
            glitch,
            render_config,
            start_time: Instant::now(),
            last_frame: Instant::now(),
        }
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &winit::event_loop::ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        let window_attributes = Window::default_attributes()
            .with_title("Motionweave")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.render_config.window_width,
                self.render_config.window_height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                eprintln!("[render] failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        // GPU init failure is fatal; the program has nothing to show without it
        let compositor = match pollster::block_on(FrameCompositor::new(Arc::clone(&window))) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("[render] failed to initialize GPU: {e:#}");
                event_loop.exit();
                return;
            }
        };

        let mut texture_cache = TextureCache::new(self.render_config.texture_cache_limit);
        if let Some(ref pack_dir) = self.args.pack {
            texture_cache.load_pack(&compositor.device, &compositor.queue, pack_dir);
        } else {
            println!("[pack] no pack directory given, rendering procedural layers only");
        }

        // Audio fails open: a capture error degrades to silence, not an exit
        let capture = AudioCapture::new(
            AnalyzerConfig::default(),
            self.params.clone(),
            self.args.device.as_deref(),
        );
        println!("[audio] capture status: {:?}", capture.status());

        println!();
        println!("Motionweave is running (seed {})", self.reset.seed());
        println!("  Space       trigger reset");
        println!("  Up/Down     intensity");
        println!("  Left/Right  speed");
        println!("  G/H         glitch amount");
        println!("  C/V         color shift");
        println!("  O/P         pulse strength");
        println!("  M           monochrome toggle");
        println!("  Esc         quit");
        println!();

        self.window = Some(window);
        self.compositor = Some(compositor);
        self.texture_cache = Some(texture_cache);
        self.capture = Some(capture);
        self.last_frame = Instant::now();
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(ref mut compositor) = self.compositor {
                    compositor.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code),
            WindowEvent::RedrawRequested => {
                self.render_frame();
            }
            _ => {}
        }
    }
}

impl App {
    fn handle_key(&mut self, event_loop: &winit::event_loop::ActiveEventLoop, code: KeyCode) {
        match code {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::Space => self.params.update(|p| p.trigger_reset()),
            KeyCode::ArrowUp => self.params.update(|p| p.set_intensity(p.intensity + 0.05)),
            KeyCode::ArrowDown => self.params.update(|p| p.set_intensity(p.intensity - 0.05)),
            KeyCode::ArrowRight => self.params.update(|p| p.set_speed(p.speed + 1)),
            KeyCode::ArrowLeft => self.params.update(|p| p.set_speed(p.speed.saturating_sub(1))),
            KeyCode::KeyG => self
                .params
                .update(|p| p.set_glitch_amount(p.glitch_amount - 0.05)),
            KeyCode::KeyH => self
                .params
                .update(|p| p.set_glitch_amount(p.glitch_amount + 0.05)),
            KeyCode::KeyC => self
                .params
                .update(|p| p.set_color_shift(p.color_shift - 0.05)),
            KeyCode::KeyV => self
                .params
                .update(|p| p.set_color_shift(p.color_shift + 0.05)),
            KeyCode::KeyO => self
                .params
                .update(|p| p.set_pulse_strength(p.pulse_strength - 0.05)),
            KeyCode::KeyP => self
                .params
                .update(|p| p.set_pulse_strength(p.pulse_strength + 0.05)),
            KeyCode::KeyM => self.params.update(|p| p.set_monochrome(!p.monochrome)),
            _ => {}
        }
    }

    /// Render a single frame
    fn render_frame(&mut self) {
        let Some(ref mut compositor) = self.compositor else {
            return;
        };
        let Some(ref cache) = self.texture_cache else {
            return;
        };

        let now = Instant::now();
        let time_s = self.start_time.elapsed().as_secs_f32();
        // Clamp gaps from minimized/suspended windows so transitions stay smooth
        let delta_s = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        let levels = self
            .capture
            .as_ref()
            .map(|c| c.levels())
            .unwrap_or_default();
        let params = self.params.snapshot();

        // Reset trigger is consumed exactly once, before the uniform build
        if self.params.take_reset() {
            self.reset.reset();
            self.glitch = GlitchTimer::new(self.reset.seed());
            println!(
                "[render] reset: seed {} pattern {}",
                self.reset.seed(),
                self.reset.active_pattern()
            );
        }
        self.reset.advance(delta_s);
        self.glitch.update(time_s, params.glitch_amount, levels.peak);

        let views = cache.select(self.reset.seed(), self.render_config.textures_per_frame);
        let uniforms = FrameUniforms::build(
            time_s,
            delta_s,
            levels,
            params,
            &self.reset,
            &self.glitch,
            compositor.size(),
            views.len(),
        );
        let palette = PaletteUniform::from(cache.palette());

        if let Err(e) = compositor.render(&uniforms, &palette, &views) {
            eprintln!("[render] frame error: {e:#}");
        }

        // Frame pacing toward the target rate; vsync still caps above it
        let budget = Duration::from_secs_f32(self.render_config.frame_budget_ms() / 1000.0);
        let spent = now.elapsed();
        if spent < budget {
            std::thread::sleep(budget - spent);
        }
    }
}

fn main() {
    let args = Args::parse();

    if args.list_devices {
        println!("Audio capture devices:");
        for name in AudioCapture::list_devices() {
            println!("  {name}");
        }
        return;
    }

    println!("Motionweave - audio-reactive visual compositor");
    println!("Initializing...");

    let mut app = App::new(args);
    let event_loop = EventLoop::new().expect("failed to create event loop");
    let _ = event_loop.run_app(&mut app);
}
