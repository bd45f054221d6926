//! Demo scenes driven end to end through the frame driver.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Standard in tests

use clatter_runtime::{
    ControlState, DriverConfig, FrameDriver, HeadlessRenderer, IssueKind, ManualClock,
    RecordingSink, Scene, SceneKind, command_channel,
};

/// Run a scene for `frames` frames at 60 fps.
fn run(kind: SceneKind, frames: u64) -> FrameDriver<RecordingSink, HeadlessRenderer> {
    let (_tx, rx) = command_channel();
    let mut driver = FrameDriver::new(
        Scene::build(kind).unwrap(),
        ControlState::shared(),
        rx,
        RecordingSink::new(),
        HeadlessRenderer::new(),
        DriverConfig::default(),
    )
    .unwrap();
    driver.run_frames(&mut ManualClock::at_fps(60.0), frames);
    driver
}

#[test]
fn drop_scene_clatters_then_rests() {
    let driver = run(SceneKind::Drop, 3600);

    let voices: Vec<_> = driver.sink().voices_for("hit1").collect();
    assert!(voices.len() >= 2, "several audible bounces, got {}", voices.len());
    assert!((voices[0].gain - 1.0).abs() < f32::EPSILON, "first impact is loud");
    assert_eq!(driver.sink().voices_for("hit2").count(), 0);

    let body = driver.world().bodies().find(|b| !b.is_static).unwrap();
    assert!((body.state.pose.position.y - 0.5).abs() < 0.02);
    assert!(body.state.twist.linear.norm() < 0.1);
    assert_eq!(driver.diagnostics().distinct(), 0);
}

#[test]
fn pair_scene_plays_both_cues() {
    let driver = run(SceneKind::Pair, 1200);

    assert!(driver.sink().voices_for("hit1").count() >= 1);
    assert!(driver.sink().voices_for("hit2").count() >= 1, "upper box lands on lower box");
    assert_eq!(driver.world().fallback_lookups(), 0);
    assert_eq!(driver.diagnostics().total(IssueKind::Configuration), 0);
}

#[test]
fn tumble_scene_never_uses_the_fallback_material() {
    let driver = run(SceneKind::Tumble { count: 10, seed: 42 }, 1000);

    assert!(driver.world().step_index() >= 998);
    assert_eq!(driver.world().fallback_lookups(), 0);
    assert_eq!(driver.world().unregistered_pairs().count(), 0);
    // Every box touches something, and each event covers at most two boxes
    assert!(driver.sink().voices().len() >= 5);
}
