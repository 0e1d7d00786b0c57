//! crbot command-line entry point.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use crbot::backend::Backend;
use crbot::capture::DesktopBackend;
use crbot::clock::SystemClock;
use crbot::config::Config;
use crbot::cycle::Bot;
use crbot::dispatcher::ActionDispatcher;
use crbot::mapper::CoordinateMapper;
use crbot::snapshot::{self, FrameSink};
use crbot::tracker::WindowRegionTracker;
use crbot::{batch, build_classifier, calibrate};

#[derive(Parser)]
#[command(name = "crbot", version, about = "Recognize game screens in a window and click through them")]
struct Cli {
    /// Config file (defaults to crbot.json in the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the capture-classify-act loop.
    Run {
        /// Classify only; never click.
        #[arg(long)]
        dry_run: bool,
        /// Stop after this many cycles.
        #[arg(long)]
        cycles: Option<u64>,
        /// Save every captured frame into this directory.
        #[arg(long, value_name = "DIR")]
        save_frames: Option<PathBuf>,
    },
    /// Capture the tracked region to PNG files.
    Capture {
        /// Number of captures.
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Seconds between captures.
        #[arg(long, default_value_t = 5.0)]
        interval: f32,
        /// File name prefix.
        #[arg(long, default_value = "weapp")]
        prefix: String,
        /// Output directory.
        #[arg(long, default_value = "screenshots")]
        out: PathBuf,
    },
    /// Locate each state's button in its reference image and point its action there.
    DeriveTargets {
        /// Print the derived targets without saving the config.
        #[arg(long)]
        dry_run: bool,
    },
    /// Classify one saved screenshot.
    Classify { image: PathBuf },
    /// Classify every PNG under a directory.
    Batch { dir: PathBuf },
    /// Print the host window, tracked region and display bounds.
    Region,
    /// Express an absolute point as a percentage of the tracked region.
    Percent { x: i32, y: i32 },
    /// Draw a state's located button onto a screenshot.
    Mark {
        state: String,
        image: PathBuf,
        /// Output file (defaults to `<image>_marked.png`).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write the default configuration.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Structured logging. Use `RUST_LOG=debug` etc.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::path()?,
    };

    let load = || Config::load(&config_path);
    match cli.command {
        Command::InitConfig { force } => init_config(&config_path, force),
        Command::Run { dry_run, cycles, save_frames } => run(&load()?, dry_run, cycles, save_frames),
        Command::Capture { count, interval, prefix, out } => capture(&load()?, count, interval, &prefix, &out),
        Command::DeriveTargets { dry_run } => derive_targets(load()?, &config_path, dry_run),
        Command::Classify { image } => classify(&load()?, &image),
        Command::Batch { dir } => batch_dir(&load()?, &dir),
        Command::Region => region(&load()?),
        Command::Percent { x, y } => percent(&load()?, x, y),
        Command::Mark { state, image, out } => mark(&load()?, &state, &image, out),
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default().save(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn run(cfg: &Config, dry_run: bool, cycles: Option<u64>, save_frames: Option<PathBuf>) -> Result<()> {
    let classifier = build_classifier(cfg)?;
    let tracker = WindowRegionTracker::new(cfg.tracker_settings(), SystemClock);
    let dispatcher = ActionDispatcher::new(cfg.actions.clone(), cfg.retry, cfg.display_fallback, SystemClock)?;
    let sink = save_frames.map(|dir| FrameSink::new(dir, "cycle")).transpose()?;
    let mut bot = Bot::new(DesktopBackend::new()?, classifier, tracker, dispatcher, SystemClock)
        .dry_run(dry_run)
        .save_frames(sink);

    tracing::info!(app = %cfg.app_name, dry_run, ?cycles, "starting");
    let summary = bot.run(cfg.poll_delay(), cycles);
    tracing::info!(cycles = summary.cycles, recognized = summary.recognized, errors = summary.errors, "stopped");
    Ok(())
}

fn capture(cfg: &Config, count: u32, interval: f32, prefix: &str, out: &Path) -> Result<()> {
    if !interval.is_finite() || interval < 0.0 {
        bail!("interval must be a non-negative number of seconds, got {interval}");
    }
    let mut backend = DesktopBackend::new()?;
    let mut tracker = WindowRegionTracker::new(cfg.tracker_settings(), SystemClock);
    let mut sink = FrameSink::new(out, prefix)?;
    let saved = snapshot::capture_series(
        &mut tracker,
        &mut backend,
        &SystemClock,
        &mut sink,
        count,
        Duration::from_secs_f32(interval),
    )?;
    for path in &saved {
        println!("{}", path.display());
    }
    println!("saved {}/{count} capture(s) to {}", saved.len(), out.display());
    Ok(())
}

fn derive_targets(mut cfg: Config, config_path: &Path, dry_run: bool) -> Result<()> {
    let classifier = build_classifier(&cfg)?;
    let derived = calibrate::derive_targets(&classifier);
    for d in &derived {
        println!(
            "{}: button at ({}, {}) {}x{} score {:.4} -> {:?}",
            d.state, d.found.x, d.found.y, d.found.width, d.found.height, d.found.score, d.target
        );
    }
    let updated = calibrate::apply_targets(&mut cfg, &derived);
    if updated.is_empty() {
        println!("no action changed");
        return Ok(());
    }
    cfg.validate().context("derived targets produced an invalid config")?;
    if dry_run {
        println!("would update: {}", updated.join(", "));
    } else {
        cfg.save(config_path)?;
        println!("updated {} in {}", updated.join(", "), config_path.display());
    }
    Ok(())
}

fn classify(cfg: &Config, image: &Path) -> Result<()> {
    let classifier = build_classifier(cfg)?;
    let frame = ie::OwnedImage::open(image)?;
    let result = classifier.classify(&frame)?;
    match &result.state {
        Some(state) => println!("{state} (confidence {:.4}, {:?})", result.confidence, result.basis),
        None => println!("unknown (best score {:.4})", result.confidence),
    }
    Ok(())
}

fn batch_dir(cfg: &Config, dir: &Path) -> Result<()> {
    let classifier = build_classifier(cfg)?;
    let entries = batch::analyze_dir(&classifier, dir)?;
    let summary = batch::summarize(&entries);
    batch::print_report(dir, &entries, &summary);
    Ok(())
}

fn region(cfg: &Config) -> Result<()> {
    let mut backend = DesktopBackend::new()?;
    let mut tracker = WindowRegionTracker::new(cfg.tracker_settings(), SystemClock);
    println!("host window:    {}", tracker.resolve_host_window(&mut backend));
    println!("tracked region: {}", tracker.current_region(&mut backend, true));
    match backend.display_bounds() {
        Ok(bounds) => println!("display bounds: {bounds}"),
        Err(err) => println!("display bounds: {} (fallback; {err})", cfg.display_fallback),
    }
    Ok(())
}

fn percent(cfg: &Config, x: i32, y: i32) -> Result<()> {
    let mut backend = DesktopBackend::new()?;
    let mut tracker = WindowRegionTracker::new(cfg.tracker_settings(), SystemClock);
    let mut mapper = CoordinateMapper::new(&mut tracker, &mut backend, cfg.display_fallback);
    let p = mapper.to_percentage(x, y);
    println!("({x}, {y}) -> [{:.2}, {:.2}]", p.x, p.y);
    if let Err(err) = mapper.validate(x, y) {
        println!("warning: {err}");
    }
    Ok(())
}

fn mark(cfg: &Config, state: &str, image: &Path, out: Option<PathBuf>) -> Result<()> {
    let classifier = build_classifier(cfg)?;
    let template = classifier.state(state).with_context(|| format!("unknown state {state:?}"))?;
    let button = template
        .button()
        .with_context(|| format!("state {state:?} has no button template"))?;
    let screenshot = ie::OwnedImage::open(image)?;

    let out = out.unwrap_or_else(|| {
        let stem = image.file_stem().and_then(|s| s.to_str()).unwrap_or("screenshot");
        image.with_file_name(format!("{stem}_marked.png"))
    });
    match ie::annotate::save_annotated(&screenshot, button.as_view(), classifier.params(), &out)? {
        Some(found) => println!(
            "button at ({}, {}) {}x{} score {:.4} -> {}",
            found.x,
            found.y,
            found.width,
            found.height,
            found.score,
            out.display()
        ),
        None => println!("button template does not fit inside the screenshot"),
    }
    Ok(())
}
