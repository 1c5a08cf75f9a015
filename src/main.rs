use anyhow::{Context, Result};
use clap::Parser;
use justhands::capture::{FrameSource, StillImage, WebcamCapture};
use justhands::detection::{self, DetectorOptions};
use justhands::lyrics::{Lyric, DEMO_SONG};
use justhands::output::{OutputSink, SnapshotOutput, V4L2Output};
use justhands::pipeline::{Exit, FrameLoop};
use justhands::render::{Canvas, HandPalette};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Use a still image instead of the webcam
    #[arg(long)]
    image: Option<PathBuf>,

    /// Capture resolution width
    #[arg(long, default_value_t = 640)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 480)]
    capture_height: u32,

    /// Overlay canvas width
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Overlay canvas height
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Display refresh rate driving the frame loop
    #[arg(long, default_value_t = 60)]
    refresh_rate: u32,

    /// Directory holding hand_landmark_lite.onnx / hand_landmark_full.onnx
    /// If not provided, runs in passthrough mode without hand tracking
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Maximum number of hands to track
    #[arg(long, default_value_t = 2)]
    max_hands: usize,

    /// Model complexity: 0 = lite, 1 = full
    #[arg(long, default_value_t = 1)]
    model_complexity: u8,

    /// Minimum score for a new hand to be reported
    #[arg(long, default_value_t = 0.7)]
    min_detection_confidence: f32,

    /// Minimum score for a tracked hand to be kept
    #[arg(long, default_value_t = 0.7)]
    min_tracking_confidence: f32,

    /// TrueType font for hand labels (defaults to a common system font)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Publish the overlay to a v4l2loopback device
    #[arg(short, long, conflicts_with = "snapshot_dir")]
    output_device: Option<String>,

    /// Save overlay frames as PNG files into this directory
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Keep one snapshot out of this many rendered frames
    #[arg(long, default_value_t = 30)]
    snapshot_every: u32,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn detector_options(&self) -> DetectorOptions {
        DetectorOptions {
            max_hands: self.max_hands,
            model_complexity: self.model_complexity,
            min_detection_confidence: self.min_detection_confidence,
            min_tracking_confidence: self.min_tracking_confidence,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("justhands starting");
    tracing::info!("Canvas: {}x{}", args.width, args.height);
    tracing::info!("Refresh rate: {} Hz", args.refresh_rate);

    // One thread: frame ticks, detector results and rendering all interleave here
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let options = args.detector_options();
    options.validate().context("Invalid detector options")?;

    // Initialize capture
    let source: Box<dyn FrameSource> = match &args.image {
        Some(path) => Box::new(StillImage::open(path)?),
        None => Box::new(
            WebcamCapture::new(args.input_device, args.capture_width, args.capture_height)
                .context("Failed to initialize webcam capture")?,
        ),
    };

    // Initialize detector
    match &args.model_dir {
        Some(dir) => tracing::info!("Hand models from {}", dir.display()),
        None => tracing::info!("Running in passthrough mode (no hand tracking)"),
    }
    let provider = detection::create_default_provider(args.model_dir.clone(), options)
        .context("Failed to configure hand detector")?;

    // Initialize canvas and output
    let mut canvas = Canvas::new(args.width, args.height);
    match args.font.clone().or_else(Canvas::find_system_font) {
        Some(path) => match Canvas::load_font(&path) {
            Ok(font) => canvas = canvas.with_font(font),
            Err(e) => tracing::warn!("{:#}; hand labels disabled", e),
        },
        None => tracing::warn!("No label font found; hand labels disabled"),
    }
    if let Some(sink) = open_output(&args)? {
        canvas = canvas.with_sink(sink);
    }

    let mut frame_loop = FrameLoop::new(source, provider, canvas, args.refresh_rate);

    tokio::spawn(report_status(frame_loop.subscribe_status()));
    tokio::spawn(announce_lyrics(Instant::now()));

    tracing::info!("{}", HandPalette::legend());
    tracing::info!("Press Ctrl+C to stop");

    let shutdown = shutdown_signal(args.duration);
    tokio::pin!(shutdown);

    let outcome = frame_loop.run(&mut shutdown).await;
    match outcome {
        Ok(Exit::Stopped) => tracing::info!("Stopped with status: {}", frame_loop.status()),
        Ok(Exit::DetectorLost) => tracing::warn!("Hand detector went away; feed frozen"),
        Err(e) => {
            // the loop stays inert; keep the process up until asked to leave
            tracing::error!("Hand tracking unavailable: {:#}", e);
            shutdown.await;
        }
    }

    tracing::info!("justhands exiting");
    Ok(())
}

fn open_output(args: &Args) -> Result<Option<Box<dyn OutputSink>>> {
    if let Some(device) = &args.output_device {
        let output = V4L2Output::new(device, args.width, args.height)
            .context("Failed to initialize v4l2loopback output")?;
        return Ok(Some(Box::new(output)));
    }

    if let Some(dir) = &args.snapshot_dir {
        let output = SnapshotOutput::new(dir, args.snapshot_every, args.width, args.height)
            .context("Failed to initialize snapshot output")?;
        return Ok(Some(Box::new(output)));
    }

    Ok(None)
}

async fn shutdown_signal(duration: Option<u64>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let limit = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Ctrl+C received"),
        () = limit => tracing::info!("Run time limit reached"),
    }
}

async fn report_status(mut status: watch::Receiver<String>) {
    while status.changed().await.is_ok() {
        let text = status.borrow_and_update().clone();
        tracing::info!("Status: {}", text);
    }
}

async fn announce_lyrics(start: Instant) {
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut current: Option<&Lyric> = None;

    loop {
        ticker.tick().await;

        let cue = Lyric::active(&DEMO_SONG, start.elapsed());
        if cue != current {
            if let Some(lyric) = cue {
                tracing::info!("Lyric: {} (ASL sign: {})", lyric.text, lyric.sign);
            }
            current = cue;
        }

        if current == DEMO_SONG.last() {
            break;
        }
    }
}
