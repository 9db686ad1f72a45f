use anyhow::Result;
use cctv_filter::{CctvConfig, CctvOrchestrator};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cctv-filter")]
#[command(about = "Files security camera recordings as accepted or rejected based on object detection")]
#[command(version)]
#[command(long_about = "Watches an incoming directory for camera recordings, samples frames from each \
closed video, asks a DeepStack server whether a person appears inside the camera's region of \
interest, and moves the video to the accepted or rejected directory under a readable name. \
Accepted videos get an archived snapshot and a per-camera latest-detection image.

Video decoding needs a build with `cargo build --release --features ffmpeg`; \
without it the program exits at startup.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "cctv-filter.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable trace level logging")]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable debug level logging, including watcher events")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit without processing anything")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Process the existing backlog and exit
    #[arg(long, help = "Process videos already in the incoming directory, then exit without watching")]
    once: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting cctv-filter v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match CctvConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        if args.validate_config {
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
        return Err(e.into());
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid ({} cameras)", config.cameras.len());
        return Ok(());
    }

    // The HTTP client must be built outside the async runtime
    let mut orchestrator = tokio::task::spawn_blocking(move || CctvOrchestrator::from_config(config))
        .await?
        .map_err(|e| {
            error!("Failed to create orchestrator: {}", e);
            e
        })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize: {}", e);
        e
    })?;

    if args.once {
        let stats = orchestrator.run_once().await.map_err(|e| {
            error!("Backlog processing failed: {}", e);
            e
        })?;
        println!("{}", stats);
        return Ok(());
    }

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("cctv-filter exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "trace"
    } else if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cctv_filter={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_names(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some("compact") | None => fmt::layer()
            .compact()
            .with_target(args.debug)
            .with_thread_names(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using compact", format);
            fmt::layer().compact().boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# cctv-filter configuration file");
    println!("# Every setting can also be given as CCTV__<SECTION>__<KEY>, e.g. CCTV__PATHS__INCOMING.");
    println!("# DEEPSTACK_URL, *_DIR_PATH, LATEST_DETECTION_PATH, DRAW_ROI and CAMERA_<n>* are honoured too.");
    println!();

    let default_config = r#"[classifier]
# DeepStack server base URL
url = "http://localhost:5000"
# Request timeout
timeout_seconds = 30

[paths]
# Directory tree the cameras upload into (watched recursively)
incoming = "/data/incoming"
accepted = "/data/accepted"
rejected = "/data/rejected"
# One always-current snapshot per camera
latest_detection = "/data/latest"
# Videos that could not be processed (default: <rejected>/dead-letter)
# dead_letter = "/data/rejected/dead-letter"

[detection]
# Labels that make a video relevant
accepted_labels = ["person"]
# Run detection on every n-th frame
frame_stride = 15
# Draw detection boxes on snapshots
annotate_snapshots = true
# Draw the camera ROI on snapshots
draw_roi = false

[retry]
# Attempts per classifier call and per file move
max_attempts = 3
base_delay_ms = 500
max_delay_ms = 10000

[watcher]
# auto, native or polling
mode = "auto"
poll_interval_ms = 2000
idle_wait_ms = 1000
video_extension = "mp4"

[[cameras]]
name = "Garden"
min_confidence = 0.55

[[cameras]]
name = "Side"
min_confidence = 0.5
# Polygon of [x, y] pixel points; closed implicitly
roi = [[0, 300], [640, 300], [640, 480], [0, 480]]
"#;

    println!("{}", default_config);
}
