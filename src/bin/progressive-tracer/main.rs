//! Progressive Tracer CLI - headless renders and the interactive viewer.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use progressive_tracer::core::{CameraState, DirectionalLight, Extent, ResizePolicy};
use progressive_tracer::gpu::{save_image, GpuContext, WgpuBackend};
use progressive_tracer::util::Vec3;
use progressive_tracer::TracerSettings;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("PROGRESSIVE_TRACER_BUILD_DATE"),
    " ",
    env!("PROGRESSIVE_TRACER_BUILD_TIME"),
    ")"
);

/// Orbit target of the CLI camera
const LOOK_TARGET: Vec3 = Vec3::new(0.0, 1.0, 0.0);

#[derive(Parser, Debug)]
#[command(name = "progressive-tracer", version, long_version = LONG_VERSION, about)]
struct Cli {
    /// More logging (-v debug, -vv trace); overrides RUST_LOG
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Settings file (default: user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render offline and write an image (.exr/.hdr linear, anything else tone-mapped)
    Render(RenderArgs),
    /// Open the interactive viewer
    View(SceneArgs),
    /// Print the effective settings, optionally saving them as the user defaults
    Config(ConfigArgs),
}

/// Overrides applied on top of the loaded settings.
#[derive(Args, Debug, Clone, Default)]
struct SceneArgs {
    /// Maximum bounces (0-15)
    #[arg(short, long)]
    bounces: Option<u32>,

    /// WGSL kernel file
    #[arg(long, value_name = "FILE")]
    kernel: Option<PathBuf>,

    /// Kernel compute entry point
    #[arg(long)]
    entry_point: Option<String>,

    /// Equirectangular HDR/EXR environment
    #[arg(short, long, value_name = "FILE")]
    environment: Option<PathBuf>,

    /// Environment brightness multiplier
    #[arg(long)]
    env_intensity: Option<f32>,

    /// Enable the default directional light
    #[arg(long)]
    light: bool,

    /// Display exposure multiplier
    #[arg(long)]
    exposure: Option<f32>,

    /// Keep the sample count when the output is resized
    #[arg(long)]
    preserve_on_resize: bool,

    /// Stop accumulating after this many samples
    #[arg(long)]
    max_samples: Option<u32>,
}

impl SceneArgs {
    fn apply(&self, settings: &mut TracerSettings) {
        if let Some(bounces) = self.bounces {
            settings.bounces = bounces;
        }
        if let Some(kernel) = &self.kernel {
            settings.kernel = Some(kernel.clone());
        }
        if let Some(entry) = &self.entry_point {
            settings.kernel_entry_point = Some(entry.clone());
        }
        if let Some(env) = &self.environment {
            settings.environment = Some(env.clone());
        }
        if let Some(intensity) = self.env_intensity {
            settings.environment_intensity = intensity;
        }
        if self.light && settings.light.is_none() {
            settings.light = Some(DirectionalLight::default());
        }
        if let Some(exposure) = self.exposure {
            settings.exposure = exposure;
        }
        if self.preserve_on_resize {
            settings.resize_policy = ResizePolicy::Preserve;
        }
        if self.max_samples.is_some() {
            settings.max_samples = self.max_samples;
        }
    }
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Output image
    #[arg(short, long, default_value = "render.png")]
    output: PathBuf,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Samples per pixel
    #[arg(short = 'n', long, default_value_t = 64)]
    samples: u32,

    /// Jitter seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Camera yaw around the scene, degrees
    #[arg(long, default_value_t = 20.0, allow_negative_numbers = true)]
    yaw: f32,

    /// Camera pitch, degrees (positive looks down from above)
    #[arg(long, default_value_t = 15.0, allow_negative_numbers = true)]
    pitch: f32,

    #[arg(long, default_value_t = 8.0)]
    distance: f32,

    /// Vertical field of view, degrees
    #[arg(long, default_value_t = 45.0)]
    fov: f32,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Write the result to the user settings file
    #[arg(long)]
    save: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _trace_guard = init_tracing(env_filter(cli.verbose, cli.quiet));

    let settings = match &cli.settings {
        Some(path) => TracerSettings::load_from(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => TracerSettings::load(),
    };

    match cli.command {
        Command::Render(args) => render(&args, settings),
        Command::View(args) => view(&args, settings),
        Command::Config(args) => config(&args, settings),
    }
}

fn render(args: &RenderArgs, mut settings: TracerSettings) -> Result<()> {
    args.scene.apply(&mut settings);
    if args.seed.is_some() {
        settings.jitter_seed = args.seed;
    }
    let settings = settings.sanitized();
    let extent = Extent::new(args.width, args.height);

    let ctx = GpuContext::headless().context("GPU initialization failed")?;
    let backend = WgpuBackend::new(ctx, &settings)?;
    let environment = backend.environment_handle();
    let mut driver = settings.frame_driver(backend, environment);
    let cap = settings.max_samples.map_or(args.samples, |max| max.min(args.samples));
    driver.set_max_samples(Some(cap));

    // Orbit pitch is elevation; positive places the camera above the target
    let camera = CameraState::orbit(LOOK_TARGET, args.distance, args.yaw, args.pitch, args.fov, extent.aspect());

    let started = Instant::now();
    tracing::info!(%extent, samples = cap, bounces = settings.bounces, "rendering");
    loop {
        let report = driver.render_frame(&camera, extent)?;
        if !report.dispatched {
            break;
        }
        if (report.sample_index + 1) % 16 == 0 {
            tracing::debug!(samples = report.sample_index + 1, "progress");
        }
    }

    let target = driver.target().context("no accumulation target after rendering")?;
    let image = driver.backend().read_display(target)?;
    save_image(&image, &args.output, settings.exposure)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    tracing::info!(
        samples = driver.sample_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        output = %args.output.display(),
        "render complete"
    );
    driver.shutdown();
    Ok(())
}

#[cfg(feature = "viewer")]
fn view(args: &SceneArgs, mut settings: TracerSettings) -> Result<()> {
    args.apply(&mut settings);
    progressive_tracer::viewer::run(settings.sanitized())
}

#[cfg(not(feature = "viewer"))]
fn view(_args: &SceneArgs, _settings: TracerSettings) -> Result<()> {
    anyhow::bail!("built without the `viewer` feature; rebuild with --features viewer")
}

fn config(args: &ConfigArgs, mut settings: TracerSettings) -> Result<()> {
    args.scene.apply(&mut settings);
    let settings = settings.sanitized();
    println!("{}", serde_json::to_string_pretty(&settings)?);
    if args.save {
        settings.save().context("failed to save settings")?;
        if let Some(path) = TracerSettings::path() {
            tracing::info!(path = %path.display(), "settings saved");
        }
    }
    Ok(())
}

/// `-v`/`-q` win over RUST_LOG; otherwise RUST_LOG, then info.
fn env_filter(verbose: u8, quiet: bool) -> EnvFilter {
    let level = match (quiet, verbose) {
        (true, _) => Some("warn"),
        (false, 0) => None,
        (false, 1) => Some("debug"),
        (false, _) => Some("trace"),
    };
    match level {
        Some(level) => EnvFilter::new(format!("warn,progressive_tracer={level}")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,progressive_tracer=info")),
    }
}

/// Init tracing; with `chrome-trace` and PROGRESSIVE_TRACER_TRACE=1 also writes trace.json
#[cfg(feature = "chrome-trace")]
fn init_tracing(filter: EnvFilter) -> Option<tracing_chrome::FlushGuard> {
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));

    if std::env::var("PROGRESSIVE_TRACER_TRACE").ok().as_deref() != Some("1") {
        registry.init();
        return None;
    }

    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file("trace.json")
        .build();
    registry.with(chrome_layer).init();
    Some(guard)
}

#[cfg(not(feature = "chrome-trace"))]
fn init_tracing(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
