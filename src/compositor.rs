//! Multi-pass frame compositor with wgpu pipeline and shader management.
//!
//! Four ordered full-screen passes per frame: procedural base, texture
//! composite, glitch, post-process. Passes ping-pong between two offscreen
//! targets; the post pass writes the presentation surface. All passes share
//! one uniform snapshot built before the first draw.

use anyhow::{anyhow, Context, Result};

use crate::uniforms::{FrameUniforms, PaletteUniform, GLITCH_MIN_THRESHOLD};

/// Shared WGSL prelude (uniforms, bindings, fullscreen vertex stage)
const COMMON_SRC: &str = include_str!("shaders/common.wgsl");
const BASE_SRC: &str = include_str!("shaders/base.wgsl");
const COMPOSITE_SRC: &str = include_str!("shaders/composite.wgsl");
const GLITCH_SRC: &str = include_str!("shaders/glitch.wgsl");
const POST_SRC: &str = include_str!("shaders/post.wgsl");
const BLIT_SRC: &str = include_str!("shaders/blit.wgsl");

/// Offscreen pass target format; the surface keeps its negotiated format
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Reference texture slots bound per frame
pub const TEXTURE_SLOTS: usize = 4;

struct OffscreenTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Two same-size offscreen color targets, reallocated only on resize.
struct RenderTargetPair {
    a: OffscreenTarget,
    b: OffscreenTarget,
    width: u32,
    height: u32,
}

impl RenderTargetPair {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self {
            a: Self::make_target(device, width, height, "target-a"),
            b: Self::make_target(device, width, height, "target-b"),
            width,
            height,
        }
    }

    fn make_target(device: &wgpu::Device, width: u32, height: u32, label: &str) -> OffscreenTarget {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        OffscreenTarget {
            _texture: texture,
            view,
        }
    }
}

/// The four pass pipelines plus the pass-through fallback. A `None` entry is
/// a pipeline whose shader failed validation; its pass degrades rather than
/// aborting the frame.
struct PassPipelines {
    base: Option<wgpu::RenderPipeline>,
    composite: Option<wgpu::RenderPipeline>,
    glitch: Option<wgpu::RenderPipeline>,
    post: Option<wgpu::RenderPipeline>,
    /// Pass-through to the surface, used when the post pipeline is missing
    blit: Option<wgpu::RenderPipeline>,
}

/// Multi-pass renderer. Sole owner of all GPU resources; driven once per
/// video frame from the event loop.
pub struct FrameCompositor {
    surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,

    uniform_buffer: wgpu::Buffer,
    palette_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    /// 1x1 mid-gray texture bound in unused reference slots so zero-texture
    /// packs stay a deterministic function of the base layer
    placeholder_view: wgpu::TextureView,
    _placeholder: wgpu::Texture,

    pipelines: PassPipelines,
    targets: RenderTargetPair,
}

impl FrameCompositor {
    /// Create the compositor for a window surface.
    pub async fn new(window: std::sync::Arc<winit::window::Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Window must have 'static lifetime via Arc
        let surface = instance
            .create_surface(window)
            .context("failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("no suitable GPU adapter"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("failed to request device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        // Per-frame uniform blocks, rebuilt before any pass runs
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let palette_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Palette"),
            size: std::mem::size_of::<PaletteUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                uniform_layout_entry(0),
                uniform_layout_entry(1),
            ],
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: palette_buffer.as_entire_binding(),
                },
            ],
        });

        // Group 1: sampler + pass input + 4 reference slots, shared by all
        // passes so one pipeline layout covers the whole chain
        let mut texture_entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        }];
        for i in 0..(1 + TEXTURE_SLOTS) {
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: (i + 1) as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &texture_entries,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Pass Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let (placeholder, placeholder_view) = make_placeholder(&device, &queue);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pass Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipelines = PassPipelines {
            base: create_pass_pipeline(&device, &pipeline_layout, "base", BASE_SRC, OFFSCREEN_FORMAT),
            composite: create_pass_pipeline(
                &device,
                &pipeline_layout,
                "composite",
                COMPOSITE_SRC,
                OFFSCREEN_FORMAT,
            ),
            glitch: create_pass_pipeline(
                &device,
                &pipeline_layout,
                "glitch",
                GLITCH_SRC,
                OFFSCREEN_FORMAT,
            ),
            post: create_pass_pipeline(&device, &pipeline_layout, "post", POST_SRC, surface_format),
            blit: create_pass_pipeline(&device, &pipeline_layout, "blit", BLIT_SRC, surface_format),
        };

        let targets = RenderTargetPair::new(&device, surface_config.width, surface_config.height);

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            uniform_buffer,
            palette_buffer,
            frame_bind_group,
            texture_layout,
            sampler,
            placeholder_view,
            _placeholder: placeholder,
            pipelines,
            targets,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// Resize the surface and render targets. No-op when unchanged.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if width == self.surface_config.width && height == self.surface_config.height {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.targets = RenderTargetPair::new(&self.device, width, height);
    }

    /// Render one frame: write the uniform snapshot, run the pass chain,
    /// present. A missing drawable is a silent no-op frame.
    pub fn render(
        &mut self,
        uniforms: &FrameUniforms,
        palette: &PaletteUniform,
        reference_views: &[&wgpu::TextureView],
    ) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => return Ok(()),
            Err(e) => return Err(anyhow!("surface error: {e}")),
        };
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // One snapshot for all passes; never updated mid-frame
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
        self.queue
            .write_buffer(&self.palette_buffer, 0, bytemuck::cast_slice(&[*palette]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        // Pass 1: procedural base into target A. With no base pipeline the
        // chain starts from cleared black.
        {
            let mut pass = begin_pass(&mut encoder, &self.targets.a.view, "base");
            if let Some(ref pipeline) = self.pipelines.base {
                let bind = self.texture_bind_group(None, reference_views);
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.frame_bind_group, &[]);
                pass.set_bind_group(1, &bind, &[]);
                pass.draw(0..3, 0..1);
            }
        }

        // Ping-pong through the optional passes; a skipped pass leaves its
        // input as the next pass's source.
        let mut src_is_a = true;

        // Pass 2: texture composite
        if let Some(ref pipeline) = self.pipelines.composite {
            let (src, dst) = self.pick_targets(src_is_a);
            let bind = self.texture_bind_group(Some(src), reference_views);
            let mut pass = begin_pass(&mut encoder, dst, "composite");
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            pass.set_bind_group(1, &bind, &[]);
            pass.draw(0..3, 0..1);
            drop(pass);
            src_is_a = !src_is_a;
        }

        // Pass 3: glitch, short-circuited below the threshold
        if uniforms.glitch_amount >= GLITCH_MIN_THRESHOLD {
            if let Some(ref pipeline) = self.pipelines.glitch {
                let (src, dst) = self.pick_targets(src_is_a);
                let bind = self.texture_bind_group(Some(src), reference_views);
                let mut pass = begin_pass(&mut encoder, dst, "glitch");
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.frame_bind_group, &[]);
                pass.set_bind_group(1, &bind, &[]);
                pass.draw(0..3, 0..1);
                drop(pass);
                src_is_a = !src_is_a;
            }
        }

        // Pass 4: post-process into the surface; degrade to a plain copy if
        // the post pipeline is missing.
        let final_pipeline = self.pipelines.post.as_ref().or(self.pipelines.blit.as_ref());
        if let Some(pipeline) = final_pipeline {
            let src = if src_is_a {
                &self.targets.a.view
            } else {
                &self.targets.b.view
            };
            let bind = self.texture_bind_group(Some(src), reference_views);
            let mut pass = begin_pass(&mut encoder, &surface_view, "post");
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            pass.set_bind_group(1, &bind, &[]);
            pass.draw(0..3, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn pick_targets(&self, src_is_a: bool) -> (&wgpu::TextureView, &wgpu::TextureView) {
        if src_is_a {
            (&self.targets.a.view, &self.targets.b.view)
        } else {
            (&self.targets.b.view, &self.targets.a.view)
        }
    }

    /// Group 1 for one pass: sampler, pass input (placeholder for pass 1) and
    /// the four reference slots, padded with the placeholder.
    fn texture_bind_group(
        &self,
        input: Option<&wgpu::TextureView>,
        reference_views: &[&wgpu::TextureView],
    ) -> wgpu::BindGroup {
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(
                    input.unwrap_or(&self.placeholder_view),
                ),
            },
        ];
        for slot in 0..TEXTURE_SLOTS {
            let view = reference_views
                .get(slot)
                .copied()
                .unwrap_or(&self.placeholder_view);
            entries.push(wgpu::BindGroupEntry {
                binding: (slot + 2) as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Pass Textures"),
            layout: &self.texture_layout,
            entries: &entries,
        })
    }
}

fn uniform_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn begin_pass<'a>(
    encoder: &'a mut wgpu::CommandEncoder,
    target: &'a wgpu::TextureView,
    label: &'static str,
) -> wgpu::RenderPass<'a> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

/// Compile one pass program (shared prelude + pass fragment stage). A
/// validation failure yields `None` and the pass degrades to pass-through
/// instead of aborting rendering.
fn create_pass_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    label: &str,
    frag_src: &str,
    target_format: wgpu::TextureFormat,
) -> Option<wgpu::RenderPipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let source = format!("{COMMON_SRC}\n{frag_src}");
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        None => Some(pipeline),
        Some(e) => {
            eprintln!("[render] pass '{label}' failed validation, degrading: {e}");
            None
        }
    }
}

/// 1x1 mid-gray texture for unused binding slots.
fn make_placeholder(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("placeholder"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[128u8, 128, 128, 255],
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

// Pass construction needs a live device, so these tests pin the shader-side
// contracts that the pipeline code relies on.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_grade_owns_global_hue_shift() {
        // The hue rotation control is applied exactly once, in the post pass;
        // the shared prelude (and through it the base-layer fallback ramp)
        // must not fold it in a second time.
        assert_eq!(POST_SRC.matches("u.color_shift").count(), 1);
        for src in [COMMON_SRC, BASE_SRC, COMPOSITE_SRC, GLITCH_SRC, BLIT_SRC] {
            assert!(!src.contains("u.color_shift"));
        }
    }

    #[test]
    fn test_any_loaded_palette_drives_the_post_tint() {
        // A one-color palette still tints (uniformly); only an empty palette
        // takes the desaturation path.
        assert!(POST_SRC.contains("palette.count != 0u"));
        assert!(!POST_SRC.contains("palette.count >= 2u"));
    }

    #[test]
    fn test_every_pass_shader_has_both_entry_points() {
        // Each pass module is the shared prelude plus a fragment stage
        assert!(COMMON_SRC.contains("fn vs_main"));
        for src in [BASE_SRC, COMPOSITE_SRC, GLITCH_SRC, POST_SRC, BLIT_SRC] {
            assert!(src.contains("fn fs_main"));
            assert!(!src.contains("fn vs_main"));
        }
    }
}
