//! # Batch Optimizer Main Orchestrator
//!
//! Orchestratore principale che delega responsabilità ai moduli specializzati.
//!
//! ## Flusso di esecuzione:
//! 1. **Validazione**: directory esistente, formato già verificato in `OptimizationRequest::parse`
//! 2. **Output**: crea `<sorgente>/optimized` se manca (idempotente)
//! 3. **Discovery**: file immagine figli diretti, in ordine di listing
//! 4. **Processing sequenziale**: un file alla volta, nessun encode concorrente
//! 5. **Reporting**: una riga per file e un riepilogo finale
//!
//! ## Error handling:
//! - Errori di validazione e fatali interrompono la run prima del loop
//! - Errori per singoli file non bloccano l'operazione
//!
//! ## Cancellazione:
//! Il segnale di stop viene controllato solo tra un file e l'altro, mai durante un encode.

use crate::{
    config::Config,
    error::OptimizeError,
    events::EventSink,
    file_manager::FileManager,
    format_policy::TargetFormat,
    image_processor::Codec,
    optimizer::task_optimizer::TaskOptimizer,
    progress::BatchSummary,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// One invocation: which directory, which target format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationRequest {
    pub source_directory: PathBuf,
    pub target_format: TargetFormat,
}

impl OptimizationRequest {
    pub fn new(source_directory: impl Into<PathBuf>, target_format: TargetFormat) -> Self {
        Self {
            source_directory: source_directory.into(),
            target_format,
        }
    }

    /// Build a request from raw arguments, rejecting unknown format tokens
    pub fn parse(source_directory: impl Into<PathBuf>, format_token: &str) -> Result<Self, OptimizeError> {
        let target_format = format_token.parse()?;
        Ok(Self::new(source_directory, target_format))
    }

    /// Check that the source directory exists and is a directory
    pub fn validate(&self) -> Result<(), OptimizeError> {
        let path = &self.source_directory;
        if !path.exists() {
            return Err(OptimizeError::InputNotFound(path.clone()));
        }
        if !path.is_dir() {
            return Err(OptimizeError::InputNotDirectory(path.clone()));
        }
        Ok(())
    }
}

/// Orchestratore principale
pub struct BatchOptimizer {
    config: Config,
    codec: Arc<dyn Codec>,
    sink: EventSink,
    stop_receiver: Option<broadcast::Receiver<()>>,
}

impl BatchOptimizer {
    pub fn new(config: Config, codec: Arc<dyn Codec>, sink: EventSink) -> Self {
        Self {
            config,
            codec,
            sink,
            stop_receiver: None,
        }
    }

    /// Stop between files when a signal arrives on `stop_receiver`
    pub fn with_cancellation(mut self, stop_receiver: broadcast::Receiver<()>) -> Self {
        self.stop_receiver = Some(stop_receiver);
        self
    }

    pub fn create_cancellation_channel(capacity: usize) -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
        broadcast::channel(capacity)
    }

    fn should_stop(&mut self) -> bool {
        if let Some(ref mut receiver) = self.stop_receiver {
            match receiver.try_recv() {
                Ok(_) => return true,
                Err(broadcast::error::TryRecvError::Empty) => return false,
                // Signal was sent but we missed it, treat as stop
                Err(broadcast::error::TryRecvError::Lagged(_)) => return true,
                // Sender was dropped, continue processing
                Err(broadcast::error::TryRecvError::Closed) => return false,
            }
        }
        false
    }

    /// Esegue il processo di ottimizzazione
    pub async fn run(&mut self, request: &OptimizationRequest) -> Result<BatchSummary, OptimizeError> {
        request.validate()?;
        let source = &request.source_directory;

        self.sink.info("Starting image optimization...").await;
        self.sink.info(format!("Input folder: {}", source.display())).await;
        self.sink.info(format!("Target format: {}", request.target_format)).await;

        let output_dir = source.join(&self.config.output_dir_name);
        if FileManager::ensure_output_dir(&output_dir).await? {
            self.sink
                .info(format!("Created output directory: {}", output_dir.display()))
                .await;
        }

        let files = FileManager::find_image_files(source)?;
        let mut summary = BatchSummary::new(output_dir.clone(), files.len());

        if files.is_empty() {
            self.sink.info("No image files found in the selected folder").await;
            return Ok(summary);
        }

        self.sink
            .info(format!("Found {} image file(s) to process", files.len()))
            .await;

        let task = TaskOptimizer::new(
            request.target_format,
            self.config.encoder_settings(),
            output_dir,
            Arc::clone(&self.codec),
        );

        for (index, file_path) in files.iter().enumerate() {
            if self.should_stop() {
                debug!("Stop signal received before {}", file_path.display());
                summary.cancelled = true;
                self.sink
                    .info(format!(
                        "Optimization cancelled after {} of {} files",
                        index,
                        files.len()
                    ))
                    .await;
                break;
            }

            let result = task.process_single_file(file_path).await;
            summary.record(&result);

            let (level, line) = result.log_line();
            self.sink.log(level, line).await;
            self.sink.progress(index + 1, files.len()).await;
        }

        self.print_final_stats(&summary).await;
        Ok(summary)
    }

    /// Stampa statistiche finali
    async fn print_final_stats(&self, summary: &BatchSummary) {
        if summary.cancelled {
            self.sink.info("Optimization stopped").await;
        } else {
            self.sink.info("Optimization complete!").await;
        }
        self.sink
            .info(format!("Successfully processed: {} files", summary.processed_ok))
            .await;
        if summary.failed > 0 {
            self.sink.info(format!("Errors: {} files", summary.failed)).await;
        }
        if summary.processed_ok > 0 {
            self.sink
                .info(format!(
                    "Total saved: {} ({:.1}%)",
                    FileManager::format_size(summary.bytes_saved()),
                    summary.overall_reduction_percent()
                ))
                .await;
        }
        self.sink
            .info(format!("Output folder: {}", summary.output_directory.display()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{self, LogLevel, OptimizeEvent};
    use crate::format_policy::FormatPolicy;
    use crate::image_processor::ImageProcessor;
    use image::{Rgb, RgbImage};
    use std::path::Path;
    use tempfile::TempDir;

    /// Writes half of the input size, fails on names containing "corrupt"
    struct HalvingCodec;

    impl Codec for HalvingCodec {
        fn transcode(&self, input: &Path, output: &Path, _policy: &FormatPolicy) -> Result<(), OptimizeError> {
            if input.to_string_lossy().contains("corrupt") {
                return Err(OptimizeError::Encode {
                    path: input.to_path_buf(),
                    message: "corrupt data".to_string(),
                });
            }
            let len = std::fs::metadata(input)?.len() as usize;
            std::fs::write(output, vec![0u8; len / 2]).map_err(|source| OptimizeError::Write {
                path: output.to_path_buf(),
                source,
            })
        }
    }

    /// Requests a stop while the first file is being encoded
    struct StopDuringEncode {
        stop: broadcast::Sender<()>,
    }

    impl Codec for StopDuringEncode {
        fn transcode(&self, input: &Path, output: &Path, policy: &FormatPolicy) -> Result<(), OptimizeError> {
            let _ = self.stop.send(());
            HalvingCodec.transcode(input, output, policy)
        }
    }

    async fn run_collect(
        request: OptimizationRequest,
        codec: Arc<dyn Codec>,
        stop: Option<broadcast::Receiver<()>>,
    ) -> (Result<BatchSummary, OptimizeError>, Vec<OptimizeEvent>) {
        let (sink, mut rx) = events::channel(4);
        let collector = tokio::spawn(async move {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        });

        let result = {
            let mut optimizer = BatchOptimizer::new(Config::default(), codec, sink);
            if let Some(stop) = stop {
                optimizer = optimizer.with_cancellation(stop);
            }
            optimizer.run(&request).await
        };

        (result, collector.await.unwrap())
    }

    fn messages(events: &[OptimizeEvent], wanted: LogLevel) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                OptimizeEvent::Log { level, message } if *level == wanted => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn write_png(path: &Path) {
        RgbImage::from_fn(40, 30, |x, y| Rgb([x as u8 * 6, y as u8 * 8, 90])).save(path).unwrap();
    }

    #[tokio::test]
    async fn test_three_valid_one_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            write_png(&temp_dir.path().join(name));
        }
        std::fs::write(temp_dir.path().join("corrupt.jpg"), b"not really a jpeg").unwrap();

        let request = OptimizationRequest::new(temp_dir.path(), TargetFormat::Png);
        let (result, events) = run_collect(request, Arc::new(ImageProcessor::new()), None).await;
        let summary = result.unwrap();

        assert_eq!(summary.total_found, 4);
        assert_eq!(summary.processed_ok, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_found, summary.processed_ok + summary.failed);
        assert!(!summary.cancelled);

        let errors = messages(&events, LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("corrupt.jpg: "), "{}", errors[0]);

        let output = temp_dir.path().join("optimized");
        for name in ["a.png", "b.png", "c.png"] {
            assert!(output.join(name).exists());
        }
        assert!(!output.join("corrupt.png").exists());
    }

    #[tokio::test]
    async fn test_results_follow_listing_order() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["zeta.jpg", "alpha.png", "mid.webp", "corrupt.bmp", "last.tiff"] {
            std::fs::write(temp_dir.path().join(name), vec![1u8; 1000]).unwrap();
        }

        let listing: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();

        let request = OptimizationRequest::new(temp_dir.path(), TargetFormat::Webp);
        let (result, events) = run_collect(request, Arc::new(HalvingCodec), None).await;
        let summary = result.unwrap();
        assert_eq!(summary.processed_ok, 4);
        assert_eq!(summary.failed, 1);

        let per_file: Vec<String> = events
            .iter()
            .filter_map(|event| match event {
                OptimizeEvent::Log { message, .. } if message.starts_with("[OK] ") => {
                    message.trim_start_matches("[OK] ").split(' ').next().map(str::to_string)
                }
                OptimizeEvent::Log { level: LogLevel::Error, message } => {
                    message.split(':').next().map(str::to_string)
                }
                _ => None,
            })
            .collect();
        let expected: Vec<String> = listing.into_iter().filter(|name| name != "optimized").collect();
        assert_eq!(per_file, expected);

        let ok_line = messages(&events, LogLevel::Info)
            .into_iter()
            .find(|line| line.starts_with("[OK] alpha.png"))
            .unwrap();
        assert_eq!(ok_line, "[OK] alpha.png -> alpha.webp (1000 Bytes -> 500 Bytes, 50.0% reduction)");

        let progress: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|event| match event {
                OptimizeEvent::Progress { current, total } => Some((*current, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, (1..=5).map(|i| (i, 5)).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::create_dir(temp_dir.path().join("album")).unwrap();
        std::fs::write(temp_dir.path().join("album").join("inside.png"), b"x").unwrap();

        let request = OptimizationRequest::new(temp_dir.path(), TargetFormat::Jpeg);
        let (result, events) = run_collect(request, Arc::new(HalvingCodec), None).await;
        let summary = result.unwrap();

        assert_eq!((summary.total_found, summary.processed_ok, summary.failed), (0, 0, 0));
        assert!(messages(&events, LogLevel::Info)
            .iter()
            .any(|line| line == "No image files found in the selected folder"));
        assert!(messages(&events, LogLevel::Error).is_empty());
        assert_eq!(std::fs::read_dir(temp_dir.path().join("optimized")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_rerun_reuses_directory_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("pic.png");
        std::fs::write(&source, vec![7u8; 400]).unwrap();

        let request = OptimizationRequest::new(temp_dir.path(), TargetFormat::Original);
        let (first, first_events) = run_collect(request.clone(), Arc::new(HalvingCodec), None).await;
        assert_eq!(first.unwrap().processed_ok, 1);
        assert!(messages(&first_events, LogLevel::Info)
            .iter()
            .any(|line| line.starts_with("Created output directory")));

        let output = temp_dir.path().join("optimized").join("pic_optimized.png");
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 200);

        std::fs::write(&source, vec![7u8; 1000]).unwrap();
        let (second, second_events) = run_collect(request, Arc::new(HalvingCodec), None).await;
        assert_eq!(second.unwrap().processed_ok, 1);
        assert!(!messages(&second_events, LogLevel::Info)
            .iter()
            .any(|line| line.starts_with("Created output directory")));
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 500);
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_io() {
        let temp_dir = TempDir::new().unwrap();

        let missing = OptimizationRequest::new(temp_dir.path().join("missing"), TargetFormat::Webp);
        let (result, events) = run_collect(missing, Arc::new(HalvingCodec), None).await;
        assert!(matches!(result, Err(OptimizeError::InputNotFound(_))));
        assert!(events.is_empty());

        let file = temp_dir.path().join("file.png");
        std::fs::write(&file, b"x").unwrap();
        let not_dir = OptimizationRequest::new(&file, TargetFormat::Webp);
        let (result, _) = run_collect(not_dir, Arc::new(HalvingCodec), None).await;
        assert!(matches!(result, Err(OptimizeError::InputNotDirectory(_))));
        assert!(!temp_dir.path().join("optimized").exists());

        assert!(matches!(
            OptimizationRequest::parse(temp_dir.path(), "gif"),
            Err(OptimizeError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_output_directory_failure_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("optimized"), b"blocking file").unwrap();
        std::fs::write(temp_dir.path().join("a.png"), b"x").unwrap();

        let request = OptimizationRequest::new(temp_dir.path(), TargetFormat::Png);
        let (result, _) = run_collect(request, Arc::new(HalvingCodec), None).await;
        assert!(matches!(result, Err(OptimizeError::OutputDirectory { .. })));
    }

    #[tokio::test]
    async fn test_cancel_before_first_file() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a.png", "b.png"] {
            std::fs::write(temp_dir.path().join(name), vec![1u8; 10]).unwrap();
        }

        let (stop_tx, stop_rx) = BatchOptimizer::create_cancellation_channel(1);
        stop_tx.send(()).unwrap();

        let request = OptimizationRequest::new(temp_dir.path(), TargetFormat::Png);
        let (result, events) = run_collect(request, Arc::new(HalvingCodec), Some(stop_rx)).await;
        let summary = result.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.processed(), 0);
        assert!(messages(&events, LogLevel::Info)
            .iter()
            .any(|line| line == "Optimization cancelled after 0 of 2 files"));
        assert_eq!(std::fs::read_dir(temp_dir.path().join("optimized")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_between_files() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            std::fs::write(temp_dir.path().join(name), vec![1u8; 10]).unwrap();
        }

        let (stop_tx, stop_rx) = BatchOptimizer::create_cancellation_channel(1);
        let codec = Arc::new(StopDuringEncode { stop: stop_tx });

        let request = OptimizationRequest::new(temp_dir.path(), TargetFormat::Png);
        let (result, events) = run_collect(request, codec, Some(stop_rx)).await;
        let summary = result.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.total_found, 3);
        assert_eq!(summary.processed(), 1);
        assert_eq!(summary.processed_ok, 1);
        assert_eq!(summary.exit_code(false), crate::error::EXIT_CANCELLED);
        assert_eq!(summary.exit_code(true), crate::error::EXIT_CANCELLED);

        let info = messages(&events, LogLevel::Info);
        assert!(info.iter().any(|line| line == "Optimization cancelled after 1 of 3 files"));
        assert!(info.iter().any(|line| line == "Optimization stopped"));
        assert_eq!(std::fs::read_dir(temp_dir.path().join("optimized")).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_is_a_file_failure() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.png"), vec![1u8; 100]).unwrap();
        symlink(temp_dir.path().join("gone.png"), temp_dir.path().join("dead.jpg")).unwrap();
        symlink(temp_dir.path().join("gone.txt"), temp_dir.path().join("notes.txt")).unwrap();

        let request = OptimizationRequest::new(temp_dir.path(), TargetFormat::Webp);
        let (result, events) = run_collect(request, Arc::new(HalvingCodec), None).await;
        let summary = result.unwrap();

        assert_eq!((summary.total_found, summary.processed_ok, summary.failed), (2, 1, 1));
        let errors = messages(&events, LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("dead.jpg: "), "{}", errors[0]);
        assert!(temp_dir.path().join("optimized").join("a.webp").exists());
    }
}
