//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche di ottimizzazione.
//!
//! ## Responsabilità:
//! - `FileResult`: esito di un singolo file (ok con risparmio, oppure errore)
//! - `BatchSummary`: contatori aggregati della run e exit code finale
//! - `ProgressManager`: progress bar con `indicatif` per feedback real-time
//! - `EventPrinter`: rende gli eventi come righe di testo o JSON lines
//!
//! ## Output testuale:
//! - Righe info su stdout
//! - Righe di errore su stderr con prefisso `ERROR:`
//! - Progress bar solo se stdout è un terminale
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 6/10 (60%)
//! [OK] photo.jpg -> photo.webp (2.4 MB -> 512.3 KB, 79.2% reduction)
//! ```

use crate::error::{EXIT_CANCELLED, EXIT_FILE_ERRORS, EXIT_SUCCESS};
use crate::events::{LogLevel, OptimizeEvent};
use crate::file_manager::FileManager;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Outcome of one processed file
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Ok { optimized_size: u64, savings_percent: f64 },
    Failed { reason: String },
}

/// Result for a single source file
#[derive(Debug, Clone, PartialEq)]
pub struct FileResult {
    pub source_file_name: String,
    pub output_file_name: String,
    /// Unknown when the source could not be read
    pub original_size: Option<u64>,
    pub outcome: FileOutcome,
}

impl FileResult {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, FileOutcome::Ok { .. })
    }

    pub fn savings_percent(&self) -> Option<f64> {
        match self.outcome {
            FileOutcome::Ok { savings_percent, .. } => Some(savings_percent),
            FileOutcome::Failed { .. } => None,
        }
    }

    /// Log line for this result
    pub fn log_line(&self) -> (LogLevel, String) {
        match &self.outcome {
            FileOutcome::Ok { optimized_size, savings_percent } => (
                LogLevel::Info,
                format!(
                    "[OK] {} -> {} ({} -> {}, {:.1}% reduction)",
                    self.source_file_name,
                    self.output_file_name,
                    FileManager::format_size(self.original_size.unwrap_or_default()),
                    FileManager::format_size(*optimized_size),
                    savings_percent
                ),
            ),
            FileOutcome::Failed { reason } => {
                (LogLevel::Error, format!("{}: {}", self.source_file_name, reason))
            }
        }
    }
}

/// Aggregate counters for a batch run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total_found: usize,
    pub processed_ok: usize,
    pub failed: usize,
    pub output_directory: PathBuf,
    pub total_original_bytes: u64,
    pub total_optimized_bytes: u64,
    /// Stopped between two files before the end of the listing
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn new(output_directory: PathBuf, total_found: usize) -> Self {
        Self {
            total_found,
            processed_ok: 0,
            failed: 0,
            output_directory,
            total_original_bytes: 0,
            total_optimized_bytes: 0,
            cancelled: false,
        }
    }

    pub fn record(&mut self, result: &FileResult) {
        match result.outcome {
            FileOutcome::Ok { optimized_size, .. } => {
                self.processed_ok += 1;
                self.total_original_bytes += result.original_size.unwrap_or_default();
                self.total_optimized_bytes += optimized_size;
            }
            FileOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.processed_ok + self.failed
    }

    /// Savings over the successfully processed files, rounded to one decimal
    pub fn overall_reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.total_original_bytes, self.total_optimized_bytes)
    }

    pub fn bytes_saved(&self) -> u64 {
        self.total_original_bytes.saturating_sub(self.total_optimized_bytes)
    }

    /// Process exit code for a run that reached its end
    pub fn exit_code(&self, strict: bool) -> u8 {
        if self.cancelled {
            EXIT_CANCELLED
        } else if strict && self.failed > 0 {
            EXIT_FILE_ERRORS
        } else {
            EXIT_SUCCESS
        }
    }
}

/// Manages progress reporting for a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    pub fn set_position(&self, current: u64) {
        self.bar.set_position(current);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Print a line without tearing the bar
    pub fn println(&self, line: &str) {
        self.bar.suspend(|| println!("{}", line));
    }

    /// Same as `println`, on stderr (where the bar itself is drawn)
    pub fn eprintln(&self, line: &str) {
        self.bar.suspend(|| eprintln!("{}", line));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// How events are written out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

/// Consumes the event stream and writes it to stdout/stderr
pub struct EventPrinter {
    mode: OutputMode,
    show_bar: bool,
    bar: Option<ProgressManager>,
}

impl EventPrinter {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            show_bar: mode == OutputMode::Text && std::io::stdout().is_terminal(),
            bar: None,
        }
    }

    /// Drain events until every sink is dropped
    pub async fn run(mut self, mut rx: mpsc::Receiver<OptimizeEvent>) {
        while let Some(event) = rx.recv().await {
            self.print(&event);
        }
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }

    fn print(&mut self, event: &OptimizeEvent) {
        match self.mode {
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(event) {
                    println!("{}", json);
                }
            }
            OutputMode::Text => match event {
                OptimizeEvent::Progress { current, total } if self.show_bar => {
                    let bar = self
                        .bar
                        .get_or_insert_with(|| ProgressManager::new(*total as u64));
                    bar.set_position(*current as u64);
                }
                _ => {
                    if let Some(line) = Self::render_text(event) {
                        match (&self.bar, event.is_error()) {
                            (Some(bar), true) => bar.eprintln(&line),
                            (Some(bar), false) => bar.println(&line),
                            (None, true) => eprintln!("{}", line),
                            (None, false) => println!("{}", line),
                        }
                    }
                }
            },
        }
    }

    /// Text rendering of an event, `None` for events with no text form
    pub fn render_text(event: &OptimizeEvent) -> Option<String> {
        match event {
            OptimizeEvent::Log { level: LogLevel::Info, message } => Some(message.clone()),
            OptimizeEvent::Log { level: LogLevel::Error, message } => Some(format!("ERROR: {}", message)),
            OptimizeEvent::Progress { .. } | OptimizeEvent::Complete { .. } => None,
        }
    }
}
