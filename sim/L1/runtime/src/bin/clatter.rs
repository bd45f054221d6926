//! Headless clatter runner.
//!
//! Builds one of the demo scenes, drives it for a number of frames on a
//! simulated frame clock and prints what was heard.
//!
//! # Usage
//!
//! ```bash
//! # One box dropped onto the ground, ten seconds at 60 fps
//! clatter --scene drop --frames 600
//!
//! # Twenty tumbling boxes, louder threshold, one command at start
//! clatter --scene tumble --boxes 20 --seed 7 --threshold 2.5 --play play_half
//! ```

use clap::{Parser, ValueEnum};
use clatter_runtime::prelude::*;
use clatter_runtime::IssueKind;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Which demo scene to run.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum SceneArg {
    /// One bouncy box
    Drop,
    /// Two boxes with their own materials
    Pair,
    /// Many boxes scattered above the ground
    Tumble,
}

/// Clatter headless runner
#[derive(Parser, Debug)]
#[command(name = "clatter")]
#[command(author, version, about = "Fixed-step rigid bodies with impact audio", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Scene to build
    #[arg(short, long, value_enum, default_value = "drop")]
    scene: SceneArg,

    /// Frames to run
    #[arg(short, long, default_value = "600")]
    frames: u64,

    /// Simulated display refresh rate
    #[arg(long, default_value = "60")]
    fps: f64,

    /// Impact speed a contact must exceed to play a cue
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Number of boxes in the tumble scene
    #[arg(long, default_value = "10")]
    boxes: usize,

    /// Seed for the tumble scene
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Commands to queue before the first frame (play_half, play_normal, play_double)
    #[arg(long)]
    play: Vec<String>,

    /// Viewport width
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Viewport height
    #[arg(long, default_value = "720")]
    height: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("clatter v{}", env!("CARGO_PKG_VERSION"));

    if !(cli.fps.is_finite() && cli.fps > 0.0) {
        anyhow::bail!("--fps must be positive, got {}", cli.fps);
    }

    let kind = match cli.scene {
        SceneArg::Drop => SceneKind::Drop,
        SceneArg::Pair => SceneKind::Pair,
        SceneArg::Tumble => SceneKind::Tumble {
            count: cli.boxes,
            seed: cli.seed,
        },
    };
    let scene = Scene::build(kind)?;

    let control = ControlState::shared();
    if let Some(threshold) = cli.threshold {
        control.set(Field::VelocityThreshold, threshold);
    }

    let (commands, receiver) = command_channel();
    for name in &cli.play {
        commands.invoke(name)?;
    }

    let config = DriverConfig::default().with_viewport(cli.width, cli.height);
    let mut driver = FrameDriver::new(
        scene,
        control,
        receiver,
        RecordingSink::new(),
        HeadlessRenderer::new(),
        config,
    )?;

    let mut clock = ManualClock::at_fps(cli.fps);
    let summary = driver.run_frames(&mut clock, cli.frames);

    let world = driver.world();
    let voices = driver.sink().voices();
    info!(
        frames = summary.frames,
        steps = world.step_index(),
        simulated = world.time(),
        cues = voices.len(),
        below_threshold = summary.bus.below_threshold,
        fallback_lookups = world.fallback_lookups(),
        "run finished"
    );

    if summary.step_errors > 0 {
        warn!(frames = summary.step_errors, "frames with failed steps");
    }
    let config_issues = driver.diagnostics().total(IssueKind::Configuration);
    if config_issues > 0 {
        warn!(issues = config_issues, "scene has unregistered material pairs");
    }

    println!("{:>8}  {:<8}  {:>6}  {:>6}", "voice", "cue", "gain", "rate");
    for voice in voices {
        println!(
            "{:>8}  {:<8}  {:>6.3}  {:>6.2}",
            voice.handle.0, voice.cue, voice.gain, voice.rate
        );
    }

    for body in world.bodies().filter(|b| !b.is_static) {
        let p = body.state.pose.position;
        println!(
            "{:<8} at ({:>7.3}, {:>7.3}, {:>7.3})",
            body.name.as_deref().unwrap_or("body"),
            p.x,
            p.y,
            p.z
        );
    }

    Ok(())
}
