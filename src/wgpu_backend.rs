//! [`Backend`] implementation on wgpu.
//!
//! Render targets are a color texture (multisampled plus a resolve texture
//! when the pipeline asks for samples) and an optional depth buffer. Every
//! fullscreen program shares one bind group layout:
//!
//! ```wgsl
//! @group(0) @binding(0) var<uniform> u: PassUniforms;
//! @group(0) @binding(1) var input_texture: texture_2d<f32>;
//! @group(0) @binding(2) var input_sampler: sampler;
//! ```
//!
//! so render pipelines are cached per (program, output format, sample count)
//! and built the first time a combination is drawn.

use std::collections::HashMap;
use std::fmt;

use crate::backend::{
    Backend, Capabilities, FullscreenDraw, Output, TargetDescriptor, TargetHandle,
};
use crate::error::{ComposerError, Result};
use crate::frame::FrameContext;
use crate::gpu::{GpuContext, texture_format};
use crate::shader::ShaderProgram;
use crate::uniforms::PassUniforms;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Attachment layout a [`SceneRenderer`] draws into.
///
/// Scene pipelines must match `format`, `sample_count` and `depth_format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTarget {
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub width: u32,
    pub height: u32,
}

/// Draws the scene graph for [`RenderScenePass`](crate::RenderScenePass).
///
/// The render pass is already begun with cleared color (and depth, when
/// `target.depth_format` is set).
pub trait SceneRenderer: Send {
    fn render(
        &mut self,
        gpu: &GpuContext,
        pass: &mut wgpu::RenderPass<'_>,
        target: &SceneTarget,
        frame: &FrameContext,
    );
}

/// Reports a call sequence [`PassPipeline`](crate::PassPipeline) never
/// produces. Logged and skipped in release builds, a panic in debug builds.
#[track_caller]
fn misuse(message: fmt::Arguments<'_>) {
    log::warn!("{message}");
    if cfg!(debug_assertions) {
        panic!("backend misuse: {message}");
    }
}

struct GpuTarget {
    descriptor: TargetDescriptor,
    /// Render attachment; multisampled when `samples > 1`.
    color: wgpu::TextureView,
    resolve: Option<wgpu::TextureView>,
    depth: Option<wgpu::TextureView>,
}

impl GpuTarget {
    fn create(device: &wgpu::Device, descriptor: &TargetDescriptor) -> Self {
        let samples = descriptor.samples.max(1);
        let format = texture_format(descriptor.format);
        let size = wgpu::Extent3d {
            width: descriptor.width,
            height: descriptor.height,
            depth_or_array_layers: 1,
        };
        let view = |label: &str, sample_count: u32, format, usage| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size,
                    mip_level_count: 1,
                    sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };

        let sampled =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let (color, resolve) = if samples > 1 {
            (
                view(
                    descriptor.label,
                    samples,
                    format,
                    wgpu::TextureUsages::RENDER_ATTACHMENT,
                ),
                Some(view(descriptor.label, 1, format, sampled)),
            )
        } else {
            (view(descriptor.label, 1, format, sampled), None)
        };
        let depth = descriptor.depth.then(|| {
            view(
                descriptor.label,
                samples,
                DEPTH_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            )
        });

        Self {
            descriptor: *descriptor,
            color,
            resolve,
            depth,
        }
    }

    /// The single-sampled view later passes read.
    fn sampled(&self) -> &wgpu::TextureView {
        self.resolve.as_ref().unwrap_or(&self.color)
    }

    fn sample_count(&self) -> u32 {
        self.descriptor.samples.max(1)
    }
}

struct FrameState {
    surface: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    draws: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: u64,
    format: wgpu::TextureFormat,
    samples: u32,
}

/// Renders a [`PassPipeline`](crate::PassPipeline) with wgpu and presents
/// to the window surface.
pub struct WgpuBackend {
    gpu: GpuContext,
    scene: Box<dyn SceneRenderer>,
    clear_color: wgpu::Color,
    screen_depth: bool,

    targets: HashMap<TargetHandle, GpuTarget>,
    next_handle: u64,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    modules: HashMap<u64, wgpu::ShaderModule>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    /// One uniform buffer per draw index within a frame.
    uniform_pool: Vec<wgpu::Buffer>,
    screen_depth_view: Option<((u32, u32), wgpu::TextureView)>,

    frame: Option<FrameState>,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext, scene: impl SceneRenderer + 'static) -> Self {
        let device = &gpu.device;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Pass Input Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Pass Bind Group Layout"),
            entries: &[
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Input texture
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pass Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            gpu,
            scene: Box::new(scene),
            clear_color: wgpu::Color::BLACK,
            screen_depth: true,
            targets: HashMap::new(),
            next_handle: 1,
            bind_group_layout,
            pipeline_layout,
            sampler,
            modules: HashMap::new(),
            pipelines: HashMap::new(),
            uniform_pool: Vec::new(),
            screen_depth_view: None,
            frame: None,
        }
    }

    /// Background color the scene pass clears to.
    pub fn with_clear_color(mut self, color: wgpu::Color) -> Self {
        self.clear_color = color;
        self
    }

    /// Give the scene a depth buffer when it renders straight to the screen.
    pub fn with_screen_depth(mut self, enabled: bool) -> Self {
        self.screen_depth = enabled;
        self
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Reconfigures the window surface. Pair with
    /// [`PassPipeline::resize`](crate::PassPipeline::resize).
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    fn refuse(descriptor: &TargetDescriptor, reason: String) -> ComposerError {
        ComposerError::ResourceExhausted {
            width: descriptor.width,
            height: descriptor.height,
            samples: descriptor.samples,
            reason,
        }
    }

    /// Format and sample count of an output, `None` for an unknown target.
    fn output_layout(&self, output: Output<'_>) -> Option<(wgpu::TextureFormat, u32)> {
        match output {
            Output::Screen => Some((self.gpu.config.format, 1)),
            Output::Target(target) => self
                .targets
                .get(&target.handle())
                .map(|t| (texture_format(t.descriptor.format), t.sample_count())),
        }
    }

    fn ensure_pipeline(
        &mut self,
        program: &ShaderProgram,
        format: wgpu::TextureFormat,
        samples: u32,
    ) -> PipelineKey {
        let key = PipelineKey {
            program: program.id(),
            format,
            samples,
        };
        if self.pipelines.contains_key(&key) {
            return key;
        }

        let device = &self.gpu.device;
        let module = self.modules.entry(program.id()).or_insert_with(|| {
            log::debug!("compiling program '{}'", program.label());
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program.label()),
                source: wgpu::ShaderSource::Wgsl(program.source().into()),
            })
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(program.label()),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: samples,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        });

        log::debug!(
            "built pipeline for '{}' ({:?}, {} samples)",
            program.label(),
            format,
            samples
        );
        self.pipelines.insert(key, pipeline);
        key
    }

    fn ensure_screen_depth(&mut self) {
        let size = (self.gpu.width(), self.gpu.height());
        if matches!(&self.screen_depth_view, Some((current, _)) if *current == size) {
            return;
        }
        let view = self
            .gpu
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Screen Depth"),
                size: wgpu::Extent3d {
                    width: size.0,
                    height: size.1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.screen_depth_view = Some((size, view));
    }
}

impl Backend for WgpuBackend {
    fn capabilities(&self) -> Capabilities {
        self.gpu.capabilities()
    }

    fn allocate_target(&mut self, descriptor: &TargetDescriptor) -> Result<TargetHandle> {
        let limit = self.gpu.device.limits().max_texture_dimension_2d;
        if descriptor.width > limit || descriptor.height > limit {
            return Err(Self::refuse(
                descriptor,
                format!("exceeds the device texture limit of {limit}"),
            ));
        }

        let samples = descriptor.samples.max(1);
        let supported = self.gpu.sample_counts(descriptor.format);
        if !supported.contains(&samples) {
            return Err(Self::refuse(
                descriptor,
                format!(
                    "{:?} targets support sample counts {:?}",
                    descriptor.format, supported
                ),
            ));
        }

        let target = GpuTarget::create(&self.gpu.device, descriptor);
        let handle = TargetHandle(self.next_handle);
        self.next_handle += 1;
        self.targets.insert(handle, target);

        log::debug!(
            "allocated '{}' {:?}: {}x{}, {} samples, depth {}",
            descriptor.label,
            handle,
            descriptor.width,
            descriptor.height,
            descriptor.samples,
            descriptor.depth
        );
        Ok(handle)
    }

    fn release_target(&mut self, handle: TargetHandle) {
        if self.targets.remove(&handle).is_some() {
            log::trace!("released {:?}", handle);
        }
    }

    fn begin_frame(&mut self) -> Result<()> {
        if self.frame.take().is_some() {
            misuse(format_args!("previous frame was never ended; dropping it"));
        }

        let surface = match self.gpu.surface.get_current_texture() {
            Ok(surface) => surface,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
                return Err(ComposerError::Backend(
                    "surface lost or outdated, reconfigured".to_string(),
                ));
            }
            Err(e) => return Err(ComposerError::Backend(e.to_string())),
        };
        let view = surface
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pass Pipeline Encoder"),
            });

        self.frame = Some(FrameState {
            surface,
            view,
            encoder,
            draws: 0,
        });
        Ok(())
    }

    fn render_scene(&mut self, output: Output<'_>, frame_ctx: &FrameContext) {
        if output.is_screen() && self.screen_depth {
            self.ensure_screen_depth();
        }

        let Some(frame) = self.frame.as_mut() else {
            misuse(format_args!("render_scene outside of a frame"));
            return;
        };

        let (view, resolve, depth, target) = match output {
            Output::Screen => (
                &frame.view,
                None,
                self.screen_depth
                    .then_some(self.screen_depth_view.as_ref().map(|(_, v)| v))
                    .flatten(),
                SceneTarget {
                    format: self.gpu.config.format,
                    sample_count: 1,
                    depth_format: self.screen_depth.then_some(DEPTH_FORMAT),
                    width: self.gpu.width(),
                    height: self.gpu.height(),
                },
            ),
            Output::Target(render_target) => {
                let handle = render_target.handle();
                let Some(gpu_target) = self.targets.get(&handle) else {
                    misuse(format_args!("scene output {:?} is not allocated", handle));
                    return;
                };
                let descriptor = &gpu_target.descriptor;
                (
                    &gpu_target.color,
                    gpu_target.resolve.as_ref(),
                    gpu_target.depth.as_ref(),
                    SceneTarget {
                        format: texture_format(descriptor.format),
                        sample_count: gpu_target.sample_count(),
                        depth_format: descriptor.depth.then_some(DEPTH_FORMAT),
                        width: descriptor.width,
                        height: descriptor.height,
                    },
                )
            }
        };

        let mut render_pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: resolve,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.scene
            .render(&self.gpu, &mut render_pass, &target, frame_ctx);
    }

    fn draw_fullscreen(&mut self, draw: FullscreenDraw<'_>) {
        let Some(input) = draw.input else {
            misuse(format_args!("pass '{}' has no input to sample; skipped", draw.pass));
            return;
        };
        let Some((format, samples)) = self.output_layout(draw.output) else {
            misuse(format_args!("pass '{}' writes an unallocated target; skipped", draw.pass));
            return;
        };
        let key = self.ensure_pipeline(draw.program, format, samples);

        let Some(frame) = self.frame.as_mut() else {
            misuse(format_args!("pass '{}' drawn outside of a frame", draw.pass));
            return;
        };
        let Some(source) = self.targets.get(&input.handle()) else {
            misuse(format_args!("pass '{}' reads an unallocated target; skipped", draw.pass));
            return;
        };

        let index = frame.draws;
        frame.draws += 1;
        if self.uniform_pool.len() <= index {
            self.uniform_pool
                .push(self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Pass Uniforms"),
                    size: std::mem::size_of::<PassUniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }));
        }
        let uniform_buffer = &self.uniform_pool[index];
        self.gpu
            .queue
            .write_buffer(uniform_buffer, 0, draw.uniforms.as_bytes());

        let bind_group = self
            .gpu
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(draw.pass),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(source.sampled()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

        let (view, resolve) = match draw.output {
            Output::Screen => (&frame.view, None),
            Output::Target(target) => match self.targets.get(&target.handle()) {
                Some(t) => (&t.color, t.resolve.as_ref()),
                None => return,
            },
        };
        // Multisampled contents are only needed through the resolve target.
        let store = if resolve.is_some() {
            wgpu::StoreOp::Discard
        } else {
            wgpu::StoreOp::Store
        };

        let mut render_pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(draw.pass),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: resolve,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipelines[&key]);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }

    fn end_frame(&mut self) {
        let Some(frame) = self.frame.take() else {
            return;
        };
        self.gpu
            .queue
            .submit(std::iter::once(frame.encoder.finish()));
        frame.surface.present();
    }
}
