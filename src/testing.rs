//! Recording backend used by the unit tests.

use std::collections::BTreeMap;

use crate::backend::{Backend, Capabilities, FullscreenDraw, Output, TargetDescriptor, TargetHandle};
use crate::error::{ComposerError, Result};
use crate::frame::FrameContext;
use crate::uniforms::PassUniforms;

/// Where a recorded call wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dest {
    Screen,
    Target(TargetHandle),
}

impl From<Output<'_>> for Dest {
    fn from(output: Output<'_>) -> Self {
        match output {
            Output::Screen => Dest::Screen,
            Output::Target(target) => Dest::Target(target.handle()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    BeginFrame,
    Scene {
        output: Dest,
        time: f32,
    },
    Draw {
        pass: String,
        program: String,
        input: Option<TargetHandle>,
        output: Dest,
        uniforms: PassUniforms,
    },
    EndFrame,
}

/// A backend that records every call instead of rendering.
pub struct RecordingBackend {
    capabilities: Capabilities,
    max_dimension: u32,
    next_handle: u64,
    live: BTreeMap<TargetHandle, TargetDescriptor>,
    allocations: usize,
    released: Vec<TargetHandle>,
    successes_before_failure: Option<usize>,
    events: Vec<Event>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities {
                supports_native_multisample: true,
                max_sample_count: 4,
            },
            max_dimension: 8192,
            next_handle: 1,
            live: BTreeMap::new(),
            allocations: 0,
            released: Vec::new(),
            successes_before_failure: None,
            events: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_max_samples(mut self, max: u32) -> Self {
        self.capabilities.max_sample_count = max;
        self
    }

    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max;
        self
    }

    /// Lets `successes` more allocations through, then refuses the next one.
    pub fn fail_after(&mut self, successes: usize) {
        self.successes_before_failure = Some(successes);
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn released(&self) -> Vec<TargetHandle> {
        self.released.clone()
    }

    pub fn live_targets(&self) -> usize {
        self.live.len()
    }

    pub fn live_descriptor(&self, handle: TargetHandle) -> Option<TargetDescriptor> {
        self.live.get(&handle).copied()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Scene renders and fullscreen draws, in order.
    pub fn executions(&self) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Scene { .. } | Event::Draw { .. }))
            .collect()
    }

    pub fn draws(&self) -> Vec<(&str, Option<TargetHandle>, Dest, &PassUniforms)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Draw {
                    pass,
                    input,
                    output,
                    uniforms,
                    ..
                } => Some((pass.as_str(), *input, *output, uniforms)),
                _ => None,
            })
            .collect()
    }

    fn refuse(descriptor: &TargetDescriptor, reason: &str) -> ComposerError {
        ComposerError::ResourceExhausted {
            width: descriptor.width,
            height: descriptor.height,
            samples: descriptor.samples,
            reason: reason.to_string(),
        }
    }
}

impl Backend for RecordingBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn allocate_target(&mut self, descriptor: &TargetDescriptor) -> Result<TargetHandle> {
        if let Some(remaining) = self.successes_before_failure.as_mut() {
            if *remaining == 0 {
                self.successes_before_failure = None;
                return Err(Self::refuse(descriptor, "injected failure"));
            }
            *remaining -= 1;
        }
        if descriptor.samples > 1
            && (!self.capabilities.supports_native_multisample
                || descriptor.samples > self.capabilities.max_sample_count)
        {
            return Err(Self::refuse(descriptor, "unsupported sample count"));
        }
        if descriptor.width > self.max_dimension || descriptor.height > self.max_dimension {
            return Err(Self::refuse(descriptor, "exceeds max dimension"));
        }

        let handle = TargetHandle(self.next_handle);
        self.next_handle += 1;
        self.allocations += 1;
        self.live.insert(handle, *descriptor);
        Ok(handle)
    }

    fn release_target(&mut self, handle: TargetHandle) {
        if self.live.remove(&handle).is_some() {
            self.released.push(handle);
        }
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.events.push(Event::BeginFrame);
        Ok(())
    }

    fn render_scene(&mut self, output: Output<'_>, frame: &FrameContext) {
        self.events.push(Event::Scene {
            output: output.into(),
            time: frame.time,
        });
    }

    fn draw_fullscreen(&mut self, draw: FullscreenDraw<'_>) {
        self.events.push(Event::Draw {
            pass: draw.pass.to_string(),
            program: draw.program.label().to_string(),
            input: draw.input.map(|t| t.handle()),
            output: draw.output.into(),
            uniforms: *draw.uniforms,
        });
    }

    fn end_frame(&mut self) {
        self.events.push(Event::EndFrame);
    }
}
