//! # Worker Process Module
//!
//! Contratto tra il worker che esegue il batch e il front end che lo lancia.
//!
//! ## Lato worker (`run_worker`):
//! - Valida gli argomenti, esegue il batch, calcola l'exit code
//! - Ogni errore diventa una riga di log prima dell'uscita
//! - Emette esattamente un evento `Complete` come ultimo evento
//!
//! ## Lato front end (`WorkerSupervisor`):
//! - Lancia il binario worker con `--input <dir> --format <token>`
//! - Righe stdout -> eventi info, righe stderr -> eventi error
//! - Una riga stdout che è un evento JSON (worker con `--json`) viene
//!   inoltrata com'è; il suo `Complete` è ignorato
//! - Alla chiusura del processo emette `Complete {success, exit_code}`
//! - Un worker terminato da un segnale riporta exit code -1
//!
//! Il path del worker è fissato al momento della costruzione (di default
//! l'eseguibile corrente), nessuna ricerca a runtime.

use crate::{
    config::Config,
    error::OptimizeError,
    events::{EventSink, LogLevel, OptimizeEvent},
    image_processor::Codec,
    optimizer::{BatchOptimizer, OptimizationRequest},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, error};

/// Terminal status of a worker run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerExit {
    pub success: bool,
    pub exit_code: i32,
}

/// Run one batch inside the worker and return its exit code.
///
/// `format_token` is validated here so an unknown token is reported through
/// the same channel as every other failure.
pub async fn run_worker(
    input: PathBuf,
    format_token: &str,
    config: Config,
    codec: Arc<dyn Codec>,
    sink: EventSink,
    stop_receiver: Option<broadcast::Receiver<()>>,
) -> u8 {
    let strict = config.strict;

    let outcome = match OptimizationRequest::parse(input, format_token) {
        Ok(request) => {
            let mut optimizer = BatchOptimizer::new(config, codec, sink.clone());
            if let Some(stop) = stop_receiver {
                optimizer = optimizer.with_cancellation(stop);
            }
            optimizer.run(&request).await
        }
        Err(e) => Err(e),
    };

    let exit_code = match outcome {
        Ok(summary) => summary.exit_code(strict),
        Err(e) => {
            sink.error(describe_failure(&e)).await;
            e.exit_code()
        }
    };

    sink.complete(exit_code == 0, i32::from(exit_code)).await;
    exit_code
}

fn describe_failure(err: &OptimizeError) -> String {
    use crate::error::ErrorKind;
    match err.kind() {
        ErrorKind::Validation => err.to_string(),
        ErrorKind::Fatal | ErrorKind::PerFile => format!("Fatal error: {}", err),
    }
}

/// Program used to launch the worker
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    base_args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    /// This executable, which doubles as the worker binary
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Argument placed before `--input`/`--format`
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.base_args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// Front-end side: launches the worker and relays its output as events
#[derive(Debug, Clone)]
pub struct WorkerSupervisor {
    command: WorkerCommand,
}

impl WorkerSupervisor {
    pub fn new(command: WorkerCommand) -> Self {
        Self { command }
    }

    pub async fn run(&self, input: &Path, format_token: &str, sink: EventSink) -> WorkerExit {
        debug!(
            "Launching worker {} for {} ({})",
            self.command.program.display(),
            input.display(),
            format_token
        );

        let spawned = Command::new(&self.command.program)
            .args(&self.command.base_args)
            .arg("--input")
            .arg(input)
            .arg("--format")
            .arg(format_token)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to start worker {}: {}", self.command.program.display(), e);
                sink.error(format!("Failed to start optimization process: {}", e)).await;
                let exit = WorkerExit { success: false, exit_code: -1 };
                sink.complete(exit.success, exit.exit_code).await;
                return exit;
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(
            relay_lines(stdout, LogLevel::Info, &sink),
            relay_lines(stderr, LogLevel::Error, &sink),
        );

        let exit_code = match child.wait().await {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                sink.error(format!("Failed to wait for optimization process: {}", e)).await;
                -1
            }
        };
        debug!("Worker exited with code {}", exit_code);

        let exit = WorkerExit {
            success: exit_code == 0,
            exit_code,
        };
        sink.complete(exit.success, exit.exit_code).await;
        exit
    }
}

/// Forward each non-blank line of a child stream as a log event
async fn relay_lines<R: AsyncRead + Unpin>(stream: Option<R>, level: LogLevel, sink: &EventSink) {
    let Some(stream) = stream else { return };
    let mut lines = BufReader::new(stream).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match level {
                    // The worker already tags its own error lines
                    LogLevel::Error => {
                        let message = line.strip_prefix("ERROR: ").unwrap_or(&line).to_string();
                        sink.log(level, message).await;
                    }
                    LogLevel::Info => relay_stdout_line(line, sink).await,
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading worker output: {}", e);
                break;
            }
        }
    }
}

/// A JSON event line is forwarded as that event, anything else as info text.
/// The worker's own `Complete` is dropped: the exit status is authoritative.
async fn relay_stdout_line(line: String, sink: &EventSink) {
    if line.starts_with('{') {
        if let Ok(event) = serde_json::from_str::<OptimizeEvent>(&line) {
            match event {
                OptimizeEvent::Log { level, message } => sink.log(level, message).await,
                OptimizeEvent::Progress { current, total } => sink.progress(current, total).await,
                OptimizeEvent::Complete { exit_code, .. } => {
                    debug!("Worker reported completion with code {}", exit_code)
                }
            }
            return;
        }
    }
    sink.info(line).await;
}
