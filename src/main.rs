use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use passchain::{
    ColorCorrectionPass, ComposerError, FrameContext, GpuContext, ParamValue, PassPipeline,
    PipelineConfig, ResizeEvent, SceneRenderer, SceneTarget, ShaderEffectPass, WgpuBackend,
};

/// Uniforms of `shaders/scene.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniforms {
    camera_pos: [f32; 3],
    time: f32,
    camera_forward: [f32; 3],
    aspect: f32,
    camera_right: [f32; 3],
    fov: f32,
    camera_up: [f32; 3],
    _pad: f32,
    light_dir: [f32; 3],
    light_intensity: f32,
}

/// Raymarched floor, torus and sphere with a slowly orbiting camera.
struct DemoScene {
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    module: wgpu::ShaderModule,
    pipelines: Vec<(SceneTarget, wgpu::RenderPipeline)>,
}

impl DemoScene {
    fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            uniform_buffer,
            bind_group_layout,
            bind_group,
            module,
            pipelines: Vec::new(),
        }
    }

    fn pipeline_index(&mut self, gpu: &GpuContext, target: &SceneTarget) -> usize {
        // Size does not affect the pipeline.
        let matches = |t: &SceneTarget| {
            t.format == target.format
                && t.sample_count == target.sample_count
                && t.depth_format == target.depth_format
        };
        if let Some(index) = self.pipelines.iter().position(|(t, _)| matches(t)) {
            return index;
        }

        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Scene Pipeline Layout"),
                bind_group_layouts: &[&self.bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline = gpu
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Scene Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &self.module,
                    entry_point: Some("vs"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.module,
                    entry_point: Some("fs"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                // A fullscreen raymarch has no meaningful depth of its own.
                depth_stencil: target.depth_format.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: target.sample_count,
                    ..Default::default()
                },
                multiview: None,
                cache: None,
            });

        self.pipelines.push((*target, pipeline));
        self.pipelines.len() - 1
    }
}

impl SceneRenderer for DemoScene {
    fn render(
        &mut self,
        gpu: &GpuContext,
        pass: &mut wgpu::RenderPass<'_>,
        target: &SceneTarget,
        frame: &FrameContext,
    ) {
        // Orbit through (4, 1, -4) at t = 0.
        let angle = frame.time * 0.15 - std::f32::consts::FRAC_PI_4;
        let radius = 4.0 * std::f32::consts::SQRT_2;
        let camera_pos = Vec3::new(radius * angle.cos(), 1.0, radius * angle.sin());
        let forward = (Vec3::new(0.0, 0.2, 0.0) - camera_pos).normalize();
        let right = forward.cross(Vec3::Y).normalize();
        let up = right.cross(forward);

        let uniforms = SceneUniforms {
            camera_pos: camera_pos.to_array(),
            time: frame.time,
            camera_forward: forward.to_array(),
            aspect: target.width as f32 / target.height as f32,
            camera_right: right.to_array(),
            fov: 75f32.to_radians(),
            camera_up: up.to_array(),
            _pad: 0.0,
            light_dir: Vec3::new(0.25, 3.0, -2.25).normalize().to_array(),
            light_intensity: 3.0,
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let index = self.pipeline_index(gpu, target);
        pass.set_pipeline(&self.pipelines[index].1);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Toggleable passes, in key order 1-6.
const TOGGLES: [&str; 6] = [
    "dot_screen",
    "glitch",
    "rgb_shift",
    "bloom",
    "tint",
    "displacement",
];

struct DemoConfig {
    title: String,
    width: u32,
    height: u32,
    pipeline: PipelineConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "passchain: 1-6 toggle passes, G glitch wild".to_string(),
            width: 1280,
            height: 720,
            pipeline: PipelineConfig::default(),
        }
    }
}

struct App {
    config: DemoConfig,
    window: Option<Arc<Window>>,
    pipeline: Option<PassPipeline<WgpuBackend>>,
    start_time: Instant,
    frame: FrameContext,
}

impl Default for App {
    fn default() -> Self {
        Self {
            config: DemoConfig::default(),
            window: None,
            pipeline: None,
            start_time: Instant::now(),
            frame: FrameContext::default(),
        }
    }
}

impl App {
    fn create_pipeline(&self, window: &Arc<Window>) -> passchain::Result<PassPipeline<WgpuBackend>> {
        let gpu = GpuContext::new(window.clone())?;
        let config = self.config.pipeline;

        match assemble(gpu, window, config) {
            Err(ComposerError::ResourceExhausted { samples, reason, .. }) => {
                log::warn!(
                    "{samples}-sample targets refused ({reason}); retrying single sampled"
                );
                let gpu = GpuContext::new(window.clone())?;
                assemble(gpu, window, config.preferred_samples(0))
            }
            result => result,
        }
    }

    fn toggle(&mut self, index: usize) {
        let Some(pipeline) = &mut self.pipeline else {
            return;
        };
        let Some(id) = pipeline.find(TOGGLES[index]) else {
            return;
        };
        let enabled = pipeline.is_enabled(id).unwrap_or(false);
        match pipeline.set_enabled(id, !enabled) {
            Ok(()) => log::info!("{} {}", TOGGLES[index], if enabled { "off" } else { "on" }),
            Err(e) => log::warn!("cannot toggle {}: {e}", TOGGLES[index]),
        }
    }

    fn toggle_go_wild(&mut self) {
        let Some(pipeline) = &mut self.pipeline else {
            return;
        };
        let Some(id) = pipeline.find("glitch") else {
            return;
        };
        let wild = matches!(pipeline.parameter(id, "go_wild"), Ok(Some(ParamValue::Bool(true))));
        if let Err(e) = pipeline.set_parameter(id, "go_wild", ParamValue::Bool(!wild)) {
            log::warn!("{e}");
        }
    }

    fn resize(&mut self) {
        let (Some(window), Some(pipeline)) = (&self.window, &mut self.pipeline) else {
            return;
        };
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            // Minimized.
            return;
        }

        match pipeline.handle_resize(ResizeEvent::from_window(window)) {
            Ok(true) => sync_surface(pipeline),
            Ok(false) => {}
            Err(e) => log::error!("resize failed, keeping previous targets: {e}"),
        }
    }
}

/// Matches the surface to the capped target size, so the last pass writes
/// at the resolution every other pass renders at.
fn sync_surface(pipeline: &mut PassPipeline<WgpuBackend>) {
    let (width, height) = pipeline.physical_size();
    let gpu = pipeline.backend().gpu();
    if (gpu.width(), gpu.height()) != (width, height) {
        log::debug!("surface resized to {width}x{height}");
        pipeline.backend_mut().resize_surface(width, height);
    }
}

fn assemble(
    gpu: GpuContext,
    window: &Window,
    config: PipelineConfig,
) -> passchain::Result<PassPipeline<WgpuBackend>> {
    let scene = DemoScene::new(&gpu);
    let backend = WgpuBackend::new(gpu, scene);

    let mut pipeline = PassPipeline::builder(backend)
        .config(config)
        .resize_event(ResizeEvent::from_window(window))
        .disabled(ShaderEffectPass::dot_screen())
        .disabled(ShaderEffectPass::glitch())
        .disabled(ShaderEffectPass::rgb_shift())
        .disabled(ShaderEffectPass::bloom())
        .pass(ShaderEffectPass::tint())
        .pass(ShaderEffectPass::displacement())
        .pass(ColorCorrectionPass::new())
        .build()?;
    sync_surface(&mut pipeline);
    Ok(pipeline)
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(self.config.title.as_str())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match self.create_pipeline(&window) {
            Ok(pipeline) => {
                for pass in pipeline.passes() {
                    log::info!(
                        "  {} {:<16} {:?}{}",
                        pass.id,
                        pass.name,
                        pass.role,
                        if pass.enabled { "" } else { " (disabled)" }
                    );
                }
                self.pipeline = Some(pipeline);
            }
            Err(e) => {
                log::error!("failed to build pass pipeline: {e}");
                event_loop.exit();
                return;
            }
        }

        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.resize();
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Digit1) => self.toggle(0),
                    PhysicalKey::Code(KeyCode::Digit2) => self.toggle(1),
                    PhysicalKey::Code(KeyCode::Digit3) => self.toggle(2),
                    PhysicalKey::Code(KeyCode::Digit4) => self.toggle(3),
                    PhysicalKey::Code(KeyCode::Digit5) => self.toggle(4),
                    PhysicalKey::Code(KeyCode::Digit6) => self.toggle(5),
                    PhysicalKey::Code(KeyCode::KeyG) => self.toggle_go_wild(),
                    PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                    _ => (),
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(pipeline) = &mut self.pipeline {
                    self.frame = self.frame.advance(self.start_time.elapsed().as_secs_f32());
                    match pipeline.render(&self.frame) {
                        Ok(stats) => log::trace!("frame {}: {:?}", self.frame.index, stats),
                        Err(e) => log::warn!("frame {} skipped: {e}", self.frame.index),
                    }
                }

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => (),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("failed to create event loop: {e}");
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::default();
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("event loop error: {e}");
    }
}
