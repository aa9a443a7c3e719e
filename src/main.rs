//! qr-debugger: scan QR codes with a chosen engine, or compare all of them.

use clap::{Args, Parser, Subcommand};
use qr_debugger::{
    compare, decoder, CameraDevice, CameraError, CaptureStream, Engine, Executor, Format,
    InteractionQueue, ResultDelivery, ScanConfig, ScanSession, Scanner, StillImageStream,
    V4L2Device,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

const NOT_SUPPORTED_TITLE: &str = "Scanning not supported";
const NOT_SUPPORTED_MESSAGE: &str = "Your device does not support scanning a code from an item. \
                                     Please use a device with a camera.";

#[derive(Parser)]
#[command(name = "qr-debugger")]
#[command(about = "Compare QR code scanning engines on a camera feed or still images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a live camera until one code is delivered
    Scan {
        /// V4L2 device index (/dev/videoN)
        #[arg(short, long, default_value = "0")]
        device: u32,

        /// Requested capture width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Requested capture height
        #[arg(long, default_value = "720")]
        height: u32,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Scan a still image as if it were held up to the camera
    Image {
        /// Image file (PNG, JPEG, GIF, BMP)
        path: PathBuf,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Run every engine once on each image and print the results side by side
    Compare {
        /// Image files
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List the available engines
    Engines,
}

#[derive(Args)]
struct SessionArgs {
    /// Scanning engine
    #[arg(short, long, value_enum, default_value = "metadata")]
    engine: Engine,

    /// Delay between accepting a code and showing it, in milliseconds
    #[arg(long, default_value = "300")]
    settle_ms: u64,

    /// Confidence a code must exceed (defaults to the engine's own threshold)
    #[arg(long, conflicts_with = "any_confidence")]
    min_confidence: Option<f32>,

    /// Accept codes regardless of confidence
    #[arg(long)]
    any_confidence: bool,

    /// Decode every n-th frame
    #[arg(long, default_value = "1")]
    frame_stride: u32,

    /// Give up after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl SessionArgs {
    fn config(&self) -> ScanConfig {
        let mut config = ScanConfig::for_engine(self.engine)
            .with_settle_delay(Duration::from_millis(self.settle_ms))
            .with_frame_stride(self.frame_stride);
        if self.any_confidence {
            config = config.with_min_confidence(None);
        } else if let Some(threshold) = self.min_confidence {
            config = config.with_min_confidence(Some(threshold));
        }
        config
    }
}

fn main() {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=qr_debugger=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli.command) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Scan {
            device,
            width,
            height,
            session,
        } => scan_camera(device, width, height, &session),
        Commands::Image { path, session } => scan_image(&path, &session),
        Commands::Compare { paths } => compare_images(&paths),
        Commands::Engines => {
            list_engines();
            Ok(())
        }
    }
}

/// The camera could not be set up: this ends the session before it starts.
fn not_supported(err: &CameraError) -> Box<dyn Error> {
    error!(error = %err, "Camera unavailable");
    format!("{NOT_SUPPORTED_TITLE}\n{NOT_SUPPORTED_MESSAGE}\n({err})").into()
}

fn scan_camera(
    index: u32,
    width: u32,
    height: u32,
    args: &SessionArgs,
) -> Result<(), Box<dyn Error>> {
    let (mut device, format) = V4L2Device::open_for_scanning(index, width, height)
        .map_err(|err| not_supported(&err))?;

    println!("Device: {}", device.capabilities().card);
    println!("Format: {}x{} {}", format.width, format.height, format.fourcc);

    let mut stream = device.create_stream(4).map_err(|err| not_supported(&err))?;
    scan(&mut stream, &format, args)
}

fn scan_image(path: &Path, args: &SessionArgs) -> Result<(), Box<dyn Error>> {
    let mut stream = StillImageStream::open(path)?;
    let format = stream.format().clone();
    scan(&mut stream, &format, args)
}

fn scan<S>(stream: &mut S, format: &Format, args: &SessionArgs) -> Result<(), Box<dyn Error>>
where
    S: CaptureStream + ?Sized,
{
    let config = args.config();
    let stop = Arc::new(AtomicBool::new(false));

    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Release))?;
    }
    if let Some(secs) = args.timeout_secs {
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("scan-timeout".to_owned())
            .spawn(move || {
                thread::sleep(Duration::from_secs(secs));
                stop.store(true, Ordering::Release);
            })?;
    }

    let interaction: Arc<dyn Executor> = Arc::new(InteractionQueue::spawn("interaction")?);
    let (tx, rx) = mpsc::channel();
    let session = ScanSession::new(config, interaction, move |delivery| {
        // Runs on the interaction thread
        let _ = tx.send(delivery);
    })?;

    let mut scanner = Scanner::new(decoder::build(args.engine), session.config().frame_stride);
    println!("Scanning with {} ...", scanner.engine().title());
    let summary = scanner.run(stream, format, &session, &stop)?;
    debug!(?summary, "Scan finished");

    match rx.recv_timeout(Duration::from_secs(1)) {
        Ok(delivery) => print_result(args.engine, &delivery),
        Err(_) => println!("No code delivered ({} frames)", summary.frames_captured),
    }
    Ok(())
}

fn print_result(engine: Engine, delivery: &ResultDelivery) {
    println!();
    println!("== {} ==", engine.title());
    println!("{}", delivery.payload);
    println!();
    match delivery.confidence {
        Some(confidence) => println!(
            "confidence {confidence:.3}, settled {} ms",
            delivery.settle_time().as_millis()
        ),
        None => println!("settled {} ms", delivery.settle_time().as_millis()),
    }
}

fn compare_images(paths: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    for path in paths {
        let stream = StillImageStream::open(path)?;
        println!("{}", path.display());

        for report in compare(stream.plane()) {
            let verdict = if report.passes(None) { "accept" } else { "-" };
            let detail = match &report.outcome {
                Ok(Some(attempt)) => match attempt.confidence {
                    Some(confidence) => {
                        format!("{:?} (confidence {confidence:.3})", attempt.payload)
                    }
                    None => format!("{:?}", attempt.payload),
                },
                Ok(None) => "no code".to_owned(),
                Err(err) => format!("error: {err}"),
            };
            println!(
                "  {:<9} {:>6.1} ms  {:<6}  {detail}",
                report.engine.name(),
                report.elapsed.as_secs_f64() * 1000.0,
                verdict
            );
        }
    }
    Ok(())
}

fn list_engines() {
    for vendor in ["Apple", "Google"] {
        println!("{vendor}");
        for engine in Engine::ALL.iter().filter(|engine| engine.vendor() == vendor) {
            let threshold = engine
                .default_min_confidence()
                .map_or_else(|| "any".to_owned(), |value| format!("> {value}"));
            println!("  {:<9} {:<26} confidence {threshold}", engine.name(), engine.title());
        }
    }
}
