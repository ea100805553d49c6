//! The pass pipeline and builder for composing post-processing chains.

use std::fmt;

use crate::backend::{Backend, Output, TargetDescriptor};
use crate::config::PipelineConfig;
use crate::error::{ComposerError, Result};
use crate::frame::FrameContext;
use crate::params::ParamValue;
use crate::render_graph::{
    AntialiasPass, CapabilityDecision, CapabilityPolicy, Pass, PassContext, PassRole,
    RenderScenePass, RenderTarget,
};

const TARGET_LABELS: [&str; 2] = ["PassPipeline Target A", "PassPipeline Target B"];

/// Stable identity of a pass inside one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(u32);

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A display size change: logical size plus device pixel density.
///
/// Windowing systems usually report physical pixels. Build the event with
/// [`from_physical`](Self::from_physical) or
/// [`from_window`](Self::from_window) so the density is not applied twice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeEvent {
    /// Logical width.
    pub width: u32,
    /// Logical height.
    pub height: u32,
    /// Physical pixels per logical pixel, before the density cap.
    pub pixel_density: f32,
}

impl ResizeEvent {
    /// Converts a physical pixel size back to logical units.
    ///
    /// Both logical dimensions are at least 1.
    pub fn from_physical(width: u32, height: u32, pixel_density: f32) -> Self {
        let density = if pixel_density.is_finite() && pixel_density > 0.0 {
            pixel_density
        } else {
            1.0
        };
        let logical = |physical: u32| ((physical as f32 / density).round() as u32).max(1);
        Self {
            width: logical(width),
            height: logical(height),
            pixel_density: density,
        }
    }

    /// The current size and scale factor of a winit window.
    pub fn from_window(window: &winit::window::Window) -> Self {
        let size = window.inner_size();
        Self::from_physical(size.width, size.height, window.scale_factor() as f32)
    }
}

/// What one call to [`PassPipeline::render`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Passes executed, the scene pass included.
    pub executions: usize,
    /// Ping-pong target writes. Always `executions - 1`.
    pub offscreen_writes: usize,
    /// The scene pass wrote the screen directly (nothing else enabled).
    pub direct_to_screen: bool,
}

/// Read-only view of one pass for debug panels.
#[derive(Debug, Clone, Copy)]
pub struct PassInfo<'a> {
    pub id: PassId,
    pub name: &'a str,
    pub role: PassRole,
    pub enabled: bool,
}

struct Slot {
    id: PassId,
    pass: Box<dyn Pass>,
    enabled: bool,
}

/// Builder for constructing pass pipelines with a fluent API.
///
/// # Example
///
/// ```ignore
/// let pipeline = PassPipeline::builder(backend)
///     .resize_event(ResizeEvent::from_window(&window))
///     .disabled(ShaderEffectPass::glitch())
///     .pass(ColorCorrectionPass::new())
///     .build()?;
/// ```
///
/// # Pass Ordering
///
/// The scene pass is created by the pipeline and always comes first. Passes
/// added here follow it in insertion order. If the capability policy asks
/// for an antialias pass, it is appended last.
pub struct PassPipelineBuilder<B: Backend> {
    backend: B,
    config: PipelineConfig,
    width: u32,
    height: u32,
    pixel_density: f32,
    passes: Vec<(Box<dyn Pass>, bool)>,
}

impl<B: Backend> PassPipelineBuilder<B> {
    /// Starts at 800x600, density 1, with the default [`PipelineConfig`].
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: PipelineConfig::default(),
            width: 800,
            height: 600,
            pixel_density: 1.0,
            passes: Vec::new(),
        }
    }

    /// Replaces the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Logical output size.
    ///
    /// Targets are allocated at this size times the capped
    /// [`pixel_density`](Self::pixel_density). Do not pass a window's
    /// physical size here; see [`ResizeEvent::from_window`].
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Device pixel density (scale factor). Capped by
    /// [`PipelineConfig::density_cap`].
    pub fn pixel_density(mut self, pixel_density: f32) -> Self {
        self.pixel_density = pixel_density;
        self
    }

    /// Logical size and density in one step.
    pub fn resize_event(self, event: ResizeEvent) -> Self {
        self.size(event.width, event.height)
            .pixel_density(event.pixel_density)
    }

    /// Appends an enabled pass.
    pub fn pass<P: Pass + 'static>(mut self, pass: P) -> Self {
        self.passes.push((Box::new(pass), true));
        self
    }

    /// Appends a pass that starts disabled.
    pub fn disabled<P: Pass + 'static>(mut self, pass: P) -> Self {
        self.passes.push((Box::new(pass), false));
        self
    }

    /// Runs the capability policy, allocates the ping-pong targets and
    /// validates the pass order.
    ///
    /// A [`ComposerError::ResourceExhausted`] here usually means the backend
    /// refused the multisampled targets; rebuild with
    /// `PipelineConfig::preferred_samples(0)`.
    pub fn build(self) -> Result<PassPipeline<B>> {
        let Self {
            mut backend,
            config,
            width,
            height,
            pixel_density,
            passes,
        } = self;

        if width == 0 || height == 0 {
            return Err(ComposerError::InvalidSize { width, height });
        }

        let capabilities = backend.capabilities();
        let decision = CapabilityPolicy::new(config.preferred_samples)
            .decide(capabilities, pixel_density);
        log::info!(
            "capabilities {:?} at density {}: antialias pass {}, {} target samples",
            capabilities,
            pixel_density,
            if decision.insert_antialias_pass { "inserted" } else { "omitted" },
            decision.target_samples
        );

        let physical = config.physical_size(width, height, pixel_density);
        let targets = allocate_pair(&mut backend, &config, &decision, physical)?;

        let mut pipeline = PassPipeline {
            backend,
            slots: Vec::new(),
            targets,
            config,
            decision,
            logical: (width, height),
            pixel_density,
            physical,
            next_id: 0,
        };

        let scene_id = pipeline.next_id();
        pipeline.slots.push(Slot {
            id: scene_id,
            pass: Box::new(RenderScenePass::new()),
            enabled: true,
        });

        for (pass, enabled) in passes {
            let index = pipeline.slots.len();
            let id = pipeline.insert_boxed(index, pass)?;
            if !enabled {
                pipeline.set_enabled(id, false)?;
            }
        }

        if decision.insert_antialias_pass {
            pipeline.push_pass(AntialiasPass::new())?;
        }

        log::info!(
            "pass pipeline built: {} passes at {}x{}",
            pipeline.slots.len(),
            physical.0,
            physical.1
        );
        Ok(pipeline)
    }
}

/// An ordered chain of passes sharing a ping-pong pair of render targets.
///
/// `PassPipeline` handles:
///
/// - Ping-pong target management for pass chaining
/// - Target reallocation on size and density changes
/// - Pass enable state and composition-order rules
/// - Final output to the screen
///
/// # Target Management
///
/// Each enabled pass writes the target not holding the current source, and
/// the last enabled pass writes the screen:
///
/// ```text
/// Scene:  None     → Target A
/// Pass 1: Target A → Target B
/// Pass 2: Target B → Target A
/// Pass 3: Target A → Screen
/// ```
///
/// When only the scene pass is enabled it renders straight to the screen
/// and neither target is touched.
pub struct PassPipeline<B: Backend> {
    backend: B,
    slots: Vec<Slot>,
    targets: [RenderTarget; 2],
    config: PipelineConfig,
    decision: CapabilityDecision,
    logical: (u32, u32),
    pixel_density: f32,
    physical: (u32, u32),
    next_id: u32,
}

impl<B: Backend> PassPipeline<B> {
    /// Creates a new pipeline builder.
    pub fn builder(backend: B) -> PassPipelineBuilder<B> {
        PassPipelineBuilder::new(backend)
    }

    /// Executes every enabled pass in order and presents.
    ///
    /// # Arguments
    ///
    /// * `frame` - Time and frame index handed to every pass
    pub fn render(&mut self, frame: &FrameContext) -> Result<FrameStats> {
        let Self {
            backend,
            slots,
            targets,
            physical,
            ..
        } = self;

        backend.begin_frame()?;

        let enabled: Vec<&Slot> = slots.iter().filter(|slot| slot.enabled).collect();
        let mut stats = FrameStats {
            direct_to_screen: enabled.len() == 1,
            ..FrameStats::default()
        };

        // Index into `targets` of the last pass's output.
        let mut source: Option<usize> = None;

        for (n, slot) in enabled.iter().enumerate() {
            let is_last = n + 1 == enabled.len();
            let input = source.map(|i| &targets[i]);
            let mut ctx = PassContext {
                backend: &mut *backend,
                frame,
                width: physical.0,
                height: physical.1,
            };

            if is_last {
                slot.pass.execute(&mut ctx, input, Output::Screen);
            } else {
                let write = source.map_or(0, |i| 1 - i);
                slot.pass
                    .execute(&mut ctx, input, Output::Target(&targets[write]));
                source = Some(write);
                stats.offscreen_writes += 1;
            }
            stats.executions += 1;
        }

        backend.end_frame();
        Ok(stats)
    }

    /// Resizes the output for a new logical size and pixel density.
    ///
    /// `width` and `height` are logical. A window's physical size converts
    /// with [`ResizeEvent::from_physical`].
    ///
    /// The physical size is `round(size * min(pixel_density, density_cap))`.
    /// If it did not change this is a no-op and returns `Ok(false)`. Otherwise
    /// both targets are reallocated and every pass is resized, in order.
    ///
    /// Both new targets are allocated before either old one is released, so
    /// a refused allocation leaves the pipeline at its previous size.
    pub fn resize(&mut self, width: u32, height: u32, pixel_density: f32) -> Result<bool> {
        if width == 0 || height == 0 {
            return Err(ComposerError::InvalidSize { width, height });
        }

        let physical = self.config.physical_size(width, height, pixel_density);
        if physical == self.physical {
            self.logical = (width, height);
            self.pixel_density = pixel_density;
            return Ok(false);
        }

        let fresh = allocate_pair(&mut self.backend, &self.config, &self.decision, physical)?;
        let stale = std::mem::replace(&mut self.targets, fresh);
        for target in stale {
            target.release(&mut self.backend);
        }

        for slot in &mut self.slots {
            slot.pass.resize(physical.0, physical.1);
        }

        log::debug!(
            "pipeline resized {}x{} -> {}x{} (logical {}x{} at density {})",
            self.physical.0,
            self.physical.1,
            physical.0,
            physical.1,
            width,
            height,
            pixel_density
        );

        self.logical = (width, height);
        self.pixel_density = pixel_density;
        self.physical = physical;
        Ok(true)
    }

    /// [`resize`](Self::resize) from a [`ResizeEvent`].
    pub fn handle_resize(&mut self, event: ResizeEvent) -> Result<bool> {
        self.resize(event.width, event.height, event.pixel_density)
    }

    /// Inserts a pass at `index` (1 or later; index 0 is the scene pass).
    ///
    /// Fails with [`ComposerError::OrderingViolation`] if a color-altering
    /// pass would follow color correction, or color correction would precede
    /// a color-altering pass.
    pub fn insert_pass<P: Pass + 'static>(&mut self, index: usize, pass: P) -> Result<PassId> {
        self.insert_boxed(index, Box::new(pass))
    }

    /// Appends a pass at the end of the chain.
    pub fn push_pass<P: Pass + 'static>(&mut self, pass: P) -> Result<PassId> {
        let index = self.slots.len();
        self.insert_pass(index, pass)
    }

    /// [`insert_pass`](Self::insert_pass) for an already boxed pass.
    pub fn insert_boxed(&mut self, index: usize, mut pass: Box<dyn Pass>) -> Result<PassId> {
        self.check_insert(index, pass.as_ref())?;

        pass.resize(self.physical.0, self.physical.1);
        let id = self.next_id();
        log::debug!("inserted pass '{}' {} at index {}", pass.name(), id, index);
        self.slots.insert(
            index,
            Slot {
                id,
                pass,
                enabled: true,
            },
        );
        Ok(id)
    }

    /// Removes a pass and hands it back. The scene pass cannot be removed.
    pub fn remove_pass(&mut self, id: PassId) -> Result<Box<dyn Pass>> {
        let index = self.index_of(id)?;
        if self.slots[index].pass.role() == PassRole::Scene {
            return Err(ComposerError::OrderingViolation(
                "the scene pass cannot be removed".to_string(),
            ));
        }
        let slot = self.slots.remove(index);
        log::debug!("removed pass '{}' {}", slot.pass.name(), id);
        Ok(slot.pass)
    }

    /// Enables or disables a pass. The scene pass cannot be disabled.
    pub fn set_enabled(&mut self, id: PassId, enabled: bool) -> Result<()> {
        let index = self.index_of(id)?;
        let slot = &mut self.slots[index];
        if !enabled && slot.pass.role() == PassRole::Scene {
            return Err(ComposerError::OrderingViolation(
                "the scene pass cannot be disabled".to_string(),
            ));
        }
        slot.enabled = enabled;
        Ok(())
    }

    /// Whether the pass runs in the next [`render`](Self::render).
    pub fn is_enabled(&self, id: PassId) -> Result<bool> {
        Ok(self.slots[self.index_of(id)?].enabled)
    }

    /// Writes a parameter of one pass, validated against its schema.
    pub fn set_parameter(&mut self, id: PassId, name: &str, value: ParamValue) -> Result<()> {
        let index = self.index_of(id)?;
        self.slots[index].pass.set_parameter(name, value)
    }

    /// Current value of a pass parameter, `None` if the pass does not
    /// declare it.
    pub fn parameter(&self, id: PassId, name: &str) -> Result<Option<ParamValue>> {
        Ok(self.pass(id)?.parameter(name))
    }

    /// Borrows a pass by id.
    pub fn pass(&self, id: PassId) -> Result<&dyn Pass> {
        Ok(self.slots[self.index_of(id)?].pass.as_ref())
    }

    /// All passes in composition order.
    pub fn passes(&self) -> impl Iterator<Item = PassInfo<'_>> {
        self.slots.iter().map(|slot| PassInfo {
            id: slot.id,
            name: slot.pass.name(),
            role: slot.pass.role(),
            enabled: slot.enabled,
        })
    }

    /// First pass with the given name.
    pub fn find(&self, name: &str) -> Option<PassId> {
        self.slots
            .iter()
            .find(|slot| slot.pass.name() == name)
            .map(|slot| slot.id)
    }

    /// Id of the pinned scene pass.
    pub fn scene_pass(&self) -> PassId {
        self.slots[0].id
    }

    /// Number of passes, disabled ones and the scene pass included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: the scene pass cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The ping-pong pair, A then B.
    pub fn targets(&self) -> &[RenderTarget; 2] {
        &self.targets
    }

    /// Size of the targets and of every pass's output, in pixels.
    ///
    /// Size the presentation surface to this so the last pass writes at the
    /// same resolution as the others.
    pub fn physical_size(&self) -> (u32, u32) {
        self.physical
    }

    /// Logical size from the last successful build or resize.
    pub fn logical_size(&self) -> (u32, u32) {
        self.logical
    }

    /// Requested density, before the cap.
    pub fn pixel_density(&self) -> f32 {
        self.pixel_density
    }

    /// The antialiasing decision made at build time.
    pub fn decision(&self) -> CapabilityDecision {
        self.decision
    }

    /// Configuration the pipeline was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The backend passes draw through.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend, e.g. to reconfigure the surface.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn next_id(&mut self) -> PassId {
        let id = PassId(self.next_id);
        self.next_id += 1;
        id
    }

    fn index_of(&self, id: PassId) -> Result<usize> {
        self.slots
            .iter()
            .position(|slot| slot.id == id)
            .ok_or(ComposerError::UnknownPass(id))
    }

    fn check_insert(&self, index: usize, pass: &dyn Pass) -> Result<()> {
        if pass.role() == PassRole::Scene {
            return Err(ComposerError::OrderingViolation(
                "the pipeline owns its only scene pass".to_string(),
            ));
        }
        if index > self.slots.len() {
            return Err(ComposerError::IndexOutOfRange {
                index,
                len: self.slots.len(),
            });
        }
        if index == 0 {
            return Err(ComposerError::OrderingViolation(
                "index 0 is reserved for the scene pass".to_string(),
            ));
        }

        let (before, after) = self.slots.split_at(index);

        if pass.alters_color()
            && let Some(correction) = before
                .iter()
                .find(|slot| slot.pass.role() == PassRole::ColorCorrection)
        {
            return Err(ComposerError::OrderingViolation(format!(
                "'{}' alters color and cannot follow '{}'",
                pass.name(),
                correction.pass.name()
            )));
        }

        if pass.role() == PassRole::ColorCorrection
            && let Some(altering) = after.iter().find(|slot| slot.pass.alters_color())
        {
            return Err(ComposerError::OrderingViolation(format!(
                "'{}' must follow every color-altering pass, but '{}' comes after it",
                pass.name(),
                altering.pass.name()
            )));
        }

        Ok(())
    }
}

impl<B: Backend> Drop for PassPipeline<B> {
    fn drop(&mut self) {
        for target in &self.targets {
            self.backend.release_target(target.handle());
        }
    }
}

fn allocate_pair(
    backend: &mut dyn Backend,
    config: &PipelineConfig,
    decision: &CapabilityDecision,
    (width, height): (u32, u32),
) -> Result<[RenderTarget; 2]> {
    let descriptor = |label| TargetDescriptor {
        label,
        width,
        height,
        samples: decision.target_samples,
        format: config.color_format,
        depth: config.depth,
    };

    let a = RenderTarget::allocate(backend, descriptor(TARGET_LABELS[0]))?;
    match RenderTarget::allocate(backend, descriptor(TARGET_LABELS[1])) {
        Ok(b) => Ok([a, b]),
        Err(err) => {
            a.release(backend);
            Err(err)
        }
    }
}
