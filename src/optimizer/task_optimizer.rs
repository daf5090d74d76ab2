//! # Task Optimizer Module
//!
//! Worker per l'ottimizzazione di singoli file.
//! Separato dall'orchestratore per isolare gli errori per-file: qualsiasi
//! errore diventa un `FileResult` fallito e non interrompe il batch.

use crate::{
    error::OptimizeError,
    file_manager::FileManager,
    format_policy::{EncoderSettings, FormatPolicy, TargetFormat},
    image_processor::Codec,
    progress::{FileOutcome, FileResult},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Processes one file at a time into the output directory
pub struct TaskOptimizer {
    pub target_format: TargetFormat,
    pub encoder_settings: EncoderSettings,
    pub output_dir: PathBuf,
    codec: Arc<dyn Codec>,
}

impl TaskOptimizer {
    pub fn new(
        target_format: TargetFormat,
        encoder_settings: EncoderSettings,
        output_dir: PathBuf,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            target_format,
            encoder_settings,
            output_dir,
            codec,
        }
    }

    /// Policy and output path for a source file
    pub fn plan(&self, file_path: &Path) -> (FormatPolicy, PathBuf) {
        let extension = file_path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = file_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let policy = FormatPolicy::resolve_with(self.target_format, &extension, &self.encoder_settings);
        let output_path = self.output_dir.join(policy.output_file_name(&stem));
        (policy, output_path)
    }

    /// Processa un singolo file. Never fails: errors are folded into the result.
    pub async fn process_single_file(&self, file_path: &Path) -> FileResult {
        let source_file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.display().to_string());
        let (policy, output_path) = self.plan(file_path);
        let output_file_name = output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(
            "Processing {} -> {} with {:?}",
            file_path.display(),
            output_path.display(),
            policy.encoder
        );

        let mut original_size = None;
        let outcome = match self.optimize(file_path, &output_path, policy, &mut original_size).await {
            Ok((original, optimized)) => FileOutcome::Ok {
                optimized_size: optimized,
                savings_percent: FileManager::calculate_reduction(original, optimized),
            },
            Err(e) => {
                debug!("Failed to process {}: {:?}", file_path.display(), e);
                FileOutcome::Failed { reason: e.to_string() }
            }
        };

        FileResult {
            source_file_name,
            output_file_name,
            original_size,
            outcome,
        }
    }

    async fn optimize(
        &self,
        file_path: &Path,
        output_path: &Path,
        policy: FormatPolicy,
        original_size: &mut Option<u64>,
    ) -> Result<(u64, u64), OptimizeError> {
        let original = FileManager::get_file_size(file_path).await?;
        *original_size = Some(original);

        let codec = Arc::clone(&self.codec);
        let input = file_path.to_path_buf();
        let output = output_path.to_path_buf();
        tokio::task::spawn_blocking(move || codec.transcode(&input, &output, &policy))
            .await
            .map_err(|e| OptimizeError::Task(e.to_string()))??;

        let optimized = FileManager::get_file_size(output_path).await?;
        Ok((original, optimized))
    }
}
