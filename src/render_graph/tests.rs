use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::backend::{Capabilities, Output};
use crate::config::PipelineConfig;
use crate::error::{ComposerError, ParameterError};
use crate::frame::FrameContext;
use crate::params::{ParamValue, Parameters};
use crate::render_graph::*;
use crate::testing::{Dest, Event, RecordingBackend};

/// Counts `resize` calls; draws nothing.
struct CountingPass {
    resizes: Arc<AtomicUsize>,
    parameters: Parameters,
}

impl CountingPass {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let resizes = Arc::new(AtomicUsize::new(0));
        let pass = Self {
            resizes: Arc::clone(&resizes),
            parameters: Parameters::new(),
        };
        (pass, resizes)
    }
}

impl Pass for CountingPass {
    fn name(&self) -> &str {
        "counting"
    }

    fn alters_color(&self) -> bool {
        false
    }

    fn execute(&self, _ctx: &mut PassContext<'_>, _input: Option<&RenderTarget>, _output: Output<'_>) {}

    fn resize(&mut self, _width: u32, _height: u32) {
        self.resizes.fetch_add(1, Ordering::SeqCst);
    }

    fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }
}

fn msaa_backend() -> RecordingBackend {
    RecordingBackend::new()
}

fn scene_dest(backend: &RecordingBackend) -> Dest {
    backend
        .events()
        .iter()
        .find_map(|e| match e {
            Event::Scene { output, .. } => Some(*output),
            _ => None,
        })
        .unwrap()
}

#[test]
fn end_to_end_skips_disabled_effect() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .size(800, 600)
        .disabled(ShaderEffectPass::rgb_shift())
        .pass(ColorCorrectionPass::new())
        .build()
        .unwrap();

    let stats = pipeline.render(&FrameContext::at(0.0)).unwrap();

    assert_eq!(stats.executions, 2);
    assert_eq!(stats.offscreen_writes, 1);
    assert!(!stats.direct_to_screen);

    let target_a = pipeline.targets()[0].handle();
    let backend = pipeline.backend();
    assert_eq!(scene_dest(backend), Dest::Target(target_a));

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    let (name, input, output, _) = draws[0];
    assert_eq!(name, "color_correction");
    assert_eq!(input, Some(target_a));
    assert_eq!(output, Dest::Screen);
}

#[test]
fn k_enabled_passes_execute_k_times_with_k_minus_one_swaps() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .pass(ShaderEffectPass::tint())
        .disabled(ShaderEffectPass::glitch())
        .pass(ShaderEffectPass::rgb_shift())
        .pass(ShaderEffectPass::displacement())
        .pass(ColorCorrectionPass::new())
        .build()
        .unwrap();

    let stats = pipeline.render(&FrameContext::at(1.0)).unwrap();
    assert_eq!(pipeline.len(), 6);
    assert_eq!(stats.executions, 5);
    assert_eq!(stats.offscreen_writes, 4);
    assert_eq!(pipeline.backend().executions().len(), 5);
}

#[test]
fn ping_pong_alternates_targets() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .pass(ShaderEffectPass::tint())
        .pass(ShaderEffectPass::rgb_shift())
        .pass(ColorCorrectionPass::new())
        .build()
        .unwrap();
    pipeline.render(&FrameContext::default()).unwrap();

    let a = pipeline.targets()[0].handle();
    let b = pipeline.targets()[1].handle();
    let backend = pipeline.backend();
    assert_eq!(scene_dest(backend), Dest::Target(a));

    let draws = backend.draws();
    let routes: Vec<_> = draws.iter().map(|(_, input, output, _)| (*input, *output)).collect();
    assert_eq!(
        routes,
        vec![
            (Some(a), Dest::Target(b)),
            (Some(b), Dest::Target(a)),
            (Some(a), Dest::Screen),
        ]
    );
}

#[test]
fn scene_only_renders_straight_to_screen() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .disabled(ShaderEffectPass::tint())
        .disabled(ColorCorrectionPass::new())
        .build()
        .unwrap();

    let stats = pipeline.render(&FrameContext::default()).unwrap();

    assert!(stats.direct_to_screen);
    assert_eq!(stats.executions, 1);
    assert_eq!(stats.offscreen_writes, 0);
    let backend = pipeline.backend();
    assert_eq!(scene_dest(backend), Dest::Screen);
    assert!(backend.draws().is_empty());
}

#[test]
fn frame_is_bracketed_by_begin_and_end() {
    let mut pipeline = PassPipeline::builder(msaa_backend()).build().unwrap();
    pipeline.render(&FrameContext::at(3.0)).unwrap();
    assert_eq!(
        pipeline.backend().events(),
        &[
            Event::BeginFrame,
            Event::Scene {
                output: Dest::Screen,
                time: 3.0
            },
            Event::EndFrame,
        ]
    );
}

#[test]
fn effect_after_color_correction_is_an_ordering_violation() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .pass(ColorCorrectionPass::new())
        .build()
        .unwrap();

    let err = pipeline.push_pass(ShaderEffectPass::rgb_shift()).unwrap_err();
    assert!(matches!(err, ComposerError::OrderingViolation(_)));
    assert_eq!(pipeline.len(), 2);

    let id = pipeline.insert_pass(1, ShaderEffectPass::rgb_shift()).unwrap();
    let order: Vec<_> = pipeline.passes().map(|p| p.name.to_string()).collect();
    assert_eq!(order, ["render_scene", "rgb_shift", "color_correction"]);
    assert_eq!(pipeline.passes().nth(1).unwrap().id, id);
}

#[test]
fn color_correction_before_an_effect_is_an_ordering_violation() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .pass(ShaderEffectPass::tint())
        .build()
        .unwrap();

    let err = pipeline.insert_pass(1, ColorCorrectionPass::new()).unwrap_err();
    assert!(matches!(err, ComposerError::OrderingViolation(_)));
    assert!(pipeline.push_pass(ColorCorrectionPass::new()).is_ok());
    assert!(pipeline.push_pass(ColorCorrectionPass::new()).is_err());
}

#[test]
fn color_preserving_passes_may_follow_correction() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .pass(ColorCorrectionPass::new())
        .build()
        .unwrap();

    assert!(pipeline.push_pass(AntialiasPass::new()).is_ok());
    let pixelate = CustomEffectPass::new(
        "pixelate",
        "fn effect(uv: vec2f) -> vec4f { return sample_input(floor(uv * 64.0) / 64.0); }",
        [],
    )
    .unwrap()
    .preserves_color();
    assert!(pipeline.push_pass(pixelate).is_ok());
}

#[test]
fn builder_rejects_bad_order() {
    let result = PassPipeline::builder(msaa_backend())
        .pass(ColorCorrectionPass::new())
        .pass(ShaderEffectPass::bloom())
        .build();
    assert!(matches!(result, Err(ComposerError::OrderingViolation(_))));
}

#[test]
fn scene_pass_is_pinned() {
    let mut pipeline = PassPipeline::builder(msaa_backend()).build().unwrap();
    let scene = pipeline.scene_pass();

    assert!(matches!(
        pipeline.insert_pass(0, ShaderEffectPass::tint()),
        Err(ComposerError::OrderingViolation(_))
    ));
    assert!(matches!(
        pipeline.push_pass(RenderScenePass::new()),
        Err(ComposerError::OrderingViolation(_))
    ));
    assert!(matches!(
        pipeline.set_enabled(scene, false),
        Err(ComposerError::OrderingViolation(_))
    ));
    assert!(matches!(
        pipeline.remove_pass(scene),
        Err(ComposerError::OrderingViolation(_))
    ));
    assert!(pipeline.is_enabled(scene).unwrap());
}

#[test]
fn out_of_range_index_and_unknown_ids() {
    let mut pipeline = PassPipeline::builder(msaa_backend()).build().unwrap();
    assert_eq!(
        pipeline.insert_pass(5, ShaderEffectPass::tint()),
        Err(ComposerError::IndexOutOfRange { index: 5, len: 1 })
    );

    let id = pipeline.push_pass(ShaderEffectPass::tint()).unwrap();
    pipeline.remove_pass(id).unwrap();
    assert_eq!(
        pipeline.set_enabled(id, true),
        Err(ComposerError::UnknownPass(id))
    );
}

#[test]
fn set_parameter_reaches_next_execution() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .pass(ShaderEffectPass::displacement())
        .build()
        .unwrap();
    let id = pipeline.find("displacement").unwrap();

    pipeline.set_parameter(id, "strength", 0.3_f32.into()).unwrap();
    pipeline.render(&FrameContext::default()).unwrap();

    let (_, _, _, uniforms) = pipeline.backend().draws()[0];
    assert_eq!(uniforms.params[0][0], 0.3);
}

#[test]
fn bogus_parameter_leaves_state_unchanged() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .pass(ShaderEffectPass::displacement())
        .build()
        .unwrap();
    let id = pipeline.find("displacement").unwrap();
    pipeline.set_parameter(id, "strength", 0.3_f32.into()).unwrap();

    let err = pipeline.set_parameter(id, "bogus", 1.0_f32.into()).unwrap_err();

    assert!(matches!(
        err,
        ComposerError::Parameter(ParameterError::Unknown { .. })
    ));
    assert_eq!(
        pipeline.parameter(id, "strength").unwrap(),
        Some(ParamValue::Float(0.3))
    );
    assert_eq!(
        pipeline.parameter(id, "frequency").unwrap(),
        Some(ParamValue::Float(10.0))
    );
}

#[test]
fn toggling_between_frames_changes_the_chain() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .disabled(ShaderEffectPass::glitch())
        .pass(ColorCorrectionPass::new())
        .build()
        .unwrap();
    let glitch = pipeline.find("glitch").unwrap();

    assert_eq!(pipeline.render(&FrameContext::default()).unwrap().executions, 2);
    pipeline.set_enabled(glitch, true).unwrap();
    assert_eq!(pipeline.render(&FrameContext::default()).unwrap().executions, 3);
}

#[test]
fn repeated_resize_is_a_no_op() {
    let (counting, resizes) = CountingPass::new();
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .size(800, 600)
        .pass(counting)
        .build()
        .unwrap();
    // One resize on insertion.
    assert_eq!(resizes.load(Ordering::SeqCst), 1);

    assert!(pipeline.resize(1024, 768, 1.0).unwrap());
    let dims: Vec<_> = pipeline.targets().iter().map(|t| (t.width(), t.height())).collect();
    let allocations = pipeline.backend().allocations();
    assert_eq!(resizes.load(Ordering::SeqCst), 2);

    assert!(!pipeline.resize(1024, 768, 1.0).unwrap());
    let again: Vec<_> = pipeline.targets().iter().map(|t| (t.width(), t.height())).collect();
    assert_eq!(dims, again);
    assert_eq!(dims, vec![(1024, 768), (1024, 768)]);
    assert_eq!(pipeline.backend().allocations(), allocations);
    assert_eq!(resizes.load(Ordering::SeqCst), 2);
}

#[test]
fn resize_caps_density_and_reallocates_both_targets() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .size(800, 600)
        .build()
        .unwrap();
    let old: Vec<_> = pipeline.targets().iter().map(|t| t.handle()).collect();

    pipeline.resize(800, 600, 3.0).unwrap();

    assert_eq!(pipeline.physical_size(), (1600, 1200));
    assert_eq!(pipeline.logical_size(), (800, 600));
    assert_eq!(pipeline.pixel_density(), 3.0);
    let backend = pipeline.backend();
    assert_eq!(backend.released(), old);
    assert_eq!(backend.live_targets(), 2);
    for target in pipeline.targets() {
        assert_eq!((target.width(), target.height()), (1600, 1200));
        assert!(!old.contains(&target.handle()));
    }
}

#[test]
fn density_change_with_same_physical_size_is_a_no_op() {
    let config = PipelineConfig::default().density_cap(2.0);
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .config(config)
        .size(400, 300)
        .pixel_density(2.0)
        .build()
        .unwrap();

    assert!(!pipeline.resize(400, 300, 2.5).unwrap());
    assert_eq!(pipeline.physical_size(), (800, 600));
    assert_eq!(pipeline.pixel_density(), 2.5);
}

#[test]
fn failed_resize_keeps_previous_targets() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .size(800, 600)
        .build()
        .unwrap();
    let before: Vec<_> = pipeline.targets().iter().map(|t| t.handle()).collect();

    // First new target succeeds, second is refused.
    pipeline.backend_mut().fail_after(1);
    let err = pipeline.resize(1920, 1080, 1.0).unwrap_err();

    assert!(matches!(err, ComposerError::ResourceExhausted { .. }));
    let after: Vec<_> = pipeline.targets().iter().map(|t| t.handle()).collect();
    assert_eq!(before, after);
    assert_eq!(pipeline.physical_size(), (800, 600));
    // The half-built pair was released, the old pair is untouched.
    assert_eq!(pipeline.backend().live_targets(), 2);
    assert!(pipeline.render(&FrameContext::default()).is_ok());
}

#[test]
fn zero_size_resize_is_rejected() {
    let mut pipeline = PassPipeline::builder(msaa_backend()).build().unwrap();
    assert_eq!(
        pipeline.resize(0, 600, 1.0),
        Err(ComposerError::InvalidSize { width: 0, height: 600 })
    );
    assert_eq!(pipeline.physical_size(), (800, 600));
}

#[test]
fn antialias_pass_inserted_without_native_msaa_at_low_density() {
    let backend = RecordingBackend::new().with_capabilities(Capabilities::SINGLE_SAMPLE);
    let pipeline = PassPipeline::builder(backend)
        .pass(ColorCorrectionPass::new())
        .build()
        .unwrap();

    let last = pipeline.passes().last().unwrap();
    assert_eq!(last.role, PassRole::Antialias);
    assert!(pipeline.decision().insert_antialias_pass);
    assert_eq!(pipeline.targets()[0].samples(), 0);
}

#[test]
fn native_msaa_multisamples_targets_instead() {
    let pipeline = PassPipeline::builder(msaa_backend())
        .pass(ColorCorrectionPass::new())
        .build()
        .unwrap();

    assert!(pipeline.find(AntialiasPass::NAME).is_none());
    for target in pipeline.targets() {
        assert_eq!(target.samples(), 4);
    }
}

#[test]
fn high_density_gets_no_antialiasing() {
    let backend = RecordingBackend::new().with_capabilities(Capabilities::SINGLE_SAMPLE);
    let pipeline = PassPipeline::builder(backend)
        .pixel_density(2.0)
        .build()
        .unwrap();

    assert!(pipeline.find(AntialiasPass::NAME).is_none());
    assert_eq!(pipeline.targets()[0].samples(), 0);
    assert_eq!(pipeline.physical_size(), (1600, 1200));
}

#[test]
fn refused_multisampling_surfaces_at_build() {
    let backend = RecordingBackend::new().with_max_samples(2);
    let config = PipelineConfig::default().preferred_samples(4);
    // The policy clamps to the reported max, so this succeeds with 2.
    let pipeline = PassPipeline::builder(backend).config(config).build().unwrap();
    assert_eq!(pipeline.targets()[0].samples(), 2);

    let mut backend = RecordingBackend::new();
    backend.fail_after(0);
    let result = PassPipeline::builder(backend).build();
    assert!(matches!(result, Err(ComposerError::ResourceExhausted { .. })));
}

#[test]
fn capability_decision_is_not_revisited_on_resize() {
    let backend = RecordingBackend::new().with_capabilities(Capabilities::SINGLE_SAMPLE);
    let mut pipeline = PassPipeline::builder(backend).build().unwrap();
    assert!(pipeline.find(AntialiasPass::NAME).is_some());

    pipeline.resize(800, 600, 2.0).unwrap();
    assert!(pipeline.find(AntialiasPass::NAME).is_some());
    assert!(pipeline.decision().insert_antialias_pass);
}

#[test]
fn removed_pass_is_handed_back() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .pass(ShaderEffectPass::bloom())
        .pass(ColorCorrectionPass::new())
        .build()
        .unwrap();
    let bloom = pipeline.find("bloom").unwrap();
    pipeline.set_parameter(bloom, "threshold", ParamValue::Float(0.8)).unwrap();

    let pass = pipeline.remove_pass(bloom).unwrap();

    assert_eq!(pass.name(), "bloom");
    assert_eq!(pass.parameter("threshold"), Some(ParamValue::Float(0.8)));
    assert_eq!(pipeline.len(), 2);
    assert!(pipeline.find("bloom").is_none());
    // An effect may no longer go after the correction pass it used to precede.
    assert!(pipeline.push_pass(ShaderEffectPass::bloom()).is_err());
}

#[test]
fn shared_pipeline_serializes_render_and_resize() {
    let shared = SharedPipeline::new(
        PassPipeline::builder(msaa_backend())
            .pass(ShaderEffectPass::tint())
            .pass(ColorCorrectionPass::new())
            .build()
            .unwrap(),
    );

    let resizer = {
        let shared = shared.clone();
        thread::spawn(move || {
            for i in 0..50u32 {
                shared.resize(640 + i, 480 + i, 1.0).unwrap();
            }
        })
    };

    let mut frame = FrameContext::default();
    for i in 0..50 {
        frame = frame.advance(i as f32 / 60.0);
        let stats = shared.render(&frame).unwrap();
        assert_eq!(stats.executions, 3);
    }
    resizer.join().unwrap();

    shared.with(|pipeline| {
        assert_eq!(pipeline.physical_size(), (689, 529));
        assert_eq!(pipeline.backend().live_targets(), 2);
        let draws = pipeline.backend().draws();
        assert_eq!(draws.len(), 100);
    });
}

#[test]
fn targets_follow_the_configured_format_and_depth() {
    let config = PipelineConfig::default()
        .color_format(crate::backend::ColorFormat::Rgba8Unorm)
        .depth(false);
    let pipeline = PassPipeline::builder(msaa_backend())
        .config(config)
        .size(320, 240)
        .build()
        .unwrap();

    for target in pipeline.targets() {
        let descriptor = pipeline.backend().live_descriptor(target.handle()).unwrap();
        assert_eq!(descriptor.format, crate::backend::ColorFormat::Rgba8Unorm);
        assert!(!descriptor.depth);
        assert_eq!((descriptor.width, descriptor.height), (320, 240));
    }
}

#[test]
fn uniforms_carry_physical_resolution_and_frame_clock() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .size(400, 300)
        .pixel_density(1.5)
        .pass(ShaderEffectPass::glitch())
        .build()
        .unwrap();

    let first = FrameContext::at(1.0);
    pipeline.render(&first).unwrap();
    pipeline.backend_mut().clear_events();
    pipeline.render(&first.advance(1.25)).unwrap();

    let draws = pipeline.backend().draws();
    assert_eq!(draws.len(), 1);
    let (_, _, _, uniforms) = draws[0];
    assert_eq!(uniforms.resolution, [600.0, 450.0]);
    assert_eq!(uniforms.time, 1.25);
    assert_eq!(uniforms.delta, 0.25);
}

#[test]
fn physical_window_size_is_not_scaled_twice() {
    // 2560x1440 physical pixels at scale 2 is a 1280x720 logical window.
    let event = ResizeEvent::from_physical(2560, 1440, 2.0);
    assert_eq!((event.width, event.height), (1280, 720));

    let mut pipeline = PassPipeline::builder(msaa_backend())
        .resize_event(event)
        .build()
        .unwrap();
    assert_eq!(pipeline.physical_size(), (2560, 1440));

    // Denser than the cap: the targets stop at twice the logical size.
    let changed = pipeline
        .handle_resize(ResizeEvent::from_physical(3840, 2160, 3.0))
        .unwrap();
    assert!(changed);
    assert_eq!(pipeline.logical_size(), (1280, 720));
    assert_eq!(pipeline.physical_size(), (2560, 1440));

    let fallback = ResizeEvent::from_physical(0, 300, f32::NAN);
    assert_eq!((fallback.width, fallback.height), (1, 300));
    assert_eq!(fallback.pixel_density, 1.0);
}

#[test]
fn screen_pass_writes_at_the_capped_size() {
    let mut pipeline = PassPipeline::builder(msaa_backend())
        .resize_event(ResizeEvent::from_physical(1500, 900, 3.0))
        .pass(ShaderEffectPass::tint())
        .pass(ColorCorrectionPass::new())
        .build()
        .unwrap();
    assert_eq!(pipeline.physical_size(), (1000, 600));

    pipeline.render(&FrameContext::at(0.0)).unwrap();

    let draws = pipeline.backend().draws();
    let (name, _, output, uniforms) = draws[draws.len() - 1];
    assert_eq!(name, ColorCorrectionPass::NAME);
    assert_eq!(output, Dest::Screen);
    assert_eq!(uniforms.resolution, [1000.0, 600.0]);
    for (_, _, _, uniforms) in draws {
        assert_eq!(uniforms.resolution, [1000.0, 600.0]);
    }
}
