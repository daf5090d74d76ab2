//! # Image Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso del worker.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e override da CLI
//! - Ctrl-C come segnale di stop cooperativo tra un file e l'altro
//! - Avvio del batch e propagazione dell'exit code
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-optimizer --input /path/to/photos --format webp --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use image_optimizer::{
    error::EXIT_FATAL,
    events,
    progress::{EventPrinter, OutputMode},
    worker::run_worker,
    BatchOptimizer, Config, ImageProcessor,
};

#[derive(Parser)]
#[command(name = "image-optimizer")]
#[command(about = "Convert and compress the images of a folder into an `optimized` subfolder")]
struct Args {
    /// Directory containing the images to optimize
    #[arg(short, long)]
    input: PathBuf,

    /// Target format: webp, jpeg, png or original
    #[arg(short, long)]
    format: String,

    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output progress and status as JSON lines
    #[arg(long)]
    json: bool,

    /// Exit with a non-zero code when any file fails
    #[arg(long)]
    strict: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("ERROR: Failed to initialize logging: {}", e);
        return ExitCode::from(EXIT_FATAL);
    }

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    // stdout is reserved for the event stream
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(args: Args) -> Result<u8> {
    let mut config = match args.config.or_else(Config::default_path) {
        Some(path) => Config::from_file(&path).await?,
        None => Config::default(),
    };
    config.json_output |= args.json;
    config.strict |= args.strict;
    config.validate()?;

    let mode = if config.json_output {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let (sink, rx) = events::channel(config.event_buffer);
    let printer = tokio::spawn(EventPrinter::new(mode).run(rx));

    let (stop_sender, stop_receiver) = BatchOptimizer::create_cancellation_channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_sender.send(());
        }
    });

    let code = run_worker(
        args.input,
        &args.format,
        config,
        Arc::new(ImageProcessor::new()),
        sink,
        Some(stop_receiver),
    )
    .await;

    printer.await?;
    Ok(code)
}
