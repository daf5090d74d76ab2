//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery delle immagini.
//!
//! ## Responsabilità:
//! - Discovery dei file immagine figli diretti della directory sorgente
//! - Determinazione formato file tramite estensione (case-insensitive)
//! - Creazione idempotente della directory di output
//! - Utilità per calcoli dimensioni e percentuali
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati riconosciuti:
//! - JPG, JPEG, PNG, WebP, BMP, TIFF
//!
//! ## Esempio:
//! ```rust,no_run
//! use image_optimizer::file_manager::FileManager;
//! use std::path::Path;
//!
//! let files = FileManager::find_image_files(Path::new("/path/to/photos")).unwrap();
//! for file in files {
//!     println!("{}", file.display());
//! }
//! ```

use crate::error::OptimizeError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Recognized image extensions (lowercase, without the dot)
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "bmp", "tiff"];

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Size of a file in bytes
    pub async fn get_file_size(path: &Path) -> Result<u64, OptimizeError> {
        let metadata = fs::metadata(path).await.map_err(|source| OptimizeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(metadata.len())
    }

    /// Find the image files directly inside `dir`, in directory-listing order.
    ///
    /// Sub-directories and files with other extensions are skipped.
    ///
    /// Only a failure to list `dir` itself is an error. A child that cannot be
    /// resolved (e.g. a dangling symlink) is kept when its name looks like an
    /// image, so it shows up as a failed file instead of aborting the batch.
    pub fn find_image_files(dir: &Path) -> Result<Vec<PathBuf>, OptimizeError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && Self::is_image(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(err) if err.depth() == 0 || err.path() == Some(dir) => return Err(err.into()),
                Err(err) => match err.path() {
                    Some(path) if Self::is_image(path) => {
                        debug!("Unreadable entry {}: {}", path.display(), err);
                        files.push(path.to_path_buf());
                    }
                    _ => debug!("Skipping unreadable entry: {}", err),
                },
            }
        }

        Ok(files)
    }

    /// Check if a file has a recognized image extension
    pub fn is_image(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext_lower.as_str())
        } else {
            false
        }
    }

    /// Create the output directory if needed. Returns `true` when it was created.
    pub async fn ensure_output_dir(path: &Path) -> Result<bool, OptimizeError> {
        let output_error = |source| OptimizeError::OutputDirectory {
            path: path.to_path_buf(),
            source,
        };

        match fs::metadata(path).await {
            Ok(metadata) if metadata.is_dir() => Ok(false),
            Ok(_) => Err(output_error(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "a file with this name already exists",
            ))),
            Err(_) => {
                fs::create_dir_all(path).await.map_err(output_error)?;
                Ok(true)
            }
        }
    }

    /// Get human-readable file size (`0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB`)
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB"];

        if size == 0 {
            return "0 Bytes".to_string();
        }

        let mut value = size as f64;
        let mut unit_index = 0;

        while value >= 1024.0 && unit_index < UNITS.len() - 1 {
            value /= 1024.0;
            unit_index += 1;
        }

        // Two decimals at most, trailing zeros dropped
        let rounded = format!("{:.2}", value);
        let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
        format!("{} {}", trimmed, UNITS[unit_index])
    }

    /// Percentage reduction rounded to one decimal
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            let percent = ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0;
            (percent * 10.0).round() / 10.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(0), "0 Bytes");
        assert_eq!(FileManager::format_size(512), "512 Bytes");
        assert_eq!(FileManager::format_size(1024), "1 KB");
        assert_eq!(FileManager::format_size(1536), "1.5 KB");
        assert_eq!(FileManager::format_size(1_000_000), "976.56 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(FileManager::format_size(3 * 1024 * 1024 * 1024), "3 GB");
        // GB is the largest unit
        assert_eq!(FileManager::format_size(2048 * 1024 * 1024 * 1024), "2048 GB");
    }

    #[test]
    fn test_calculate_reduction() {
        assert_eq!(FileManager::calculate_reduction(1_000_000, 500_000), 50.0);
        assert_eq!(FileManager::calculate_reduction(3, 2), 33.3);
        assert_eq!(FileManager::calculate_reduction(100, 150), -50.0);
        assert_eq!(FileManager::calculate_reduction(0, 10), 0.0);
    }

    #[test]
    fn test_is_image() {
        assert!(FileManager::is_image(Path::new("a.jpg")));
        assert!(FileManager::is_image(Path::new("a.JPEG")));
        assert!(FileManager::is_image(Path::new("scan.Tiff")));
        assert!(FileManager::is_image(Path::new("b.bmp")));
        assert!(!FileManager::is_image(Path::new("a.gif")));
        assert!(!FileManager::is_image(Path::new("a.tif")));
        assert!(!FileManager::is_image(Path::new("README")));
    }

    #[test]
    fn test_find_image_files_filters_direct_children() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("one.jpg"), b"x").unwrap();
        std::fs::write(root.join("two.PNG"), b"x").unwrap();
        std::fs::write(root.join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(root.join("nested")).unwrap();
        std::fs::write(root.join("nested").join("deep.png"), b"x").unwrap();
        std::fs::create_dir(root.join("folder.png")).unwrap();

        let mut names: Vec<String> = FileManager::find_image_files(root)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(names, vec!["one.jpg", "two.PNG"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_find_image_files_keeps_dangling_image_links() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("a.png"), b"x").unwrap();
        symlink(root.join("gone.png"), root.join("dead.jpg")).unwrap();
        symlink(root.join("gone.txt"), root.join("notes.txt")).unwrap();

        let mut names: Vec<String> = FileManager::find_image_files(root)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(names, vec!["a.png", "dead.jpg"]);
    }

    #[test]
    fn test_find_image_files_missing_dir_is_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(FileManager::find_image_files(&temp_dir.path().join("missing")).is_err());
    }

    #[tokio::test]
    async fn test_ensure_output_dir_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("optimized");

        assert!(FileManager::ensure_output_dir(&output).await.unwrap());
        assert!(!FileManager::ensure_output_dir(&output).await.unwrap());
        assert!(output.is_dir());
    }

    #[tokio::test]
    async fn test_ensure_output_dir_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("optimized");
        std::fs::write(&output, b"not a dir").unwrap();

        let err = FileManager::ensure_output_dir(&output).await.unwrap_err();
        assert!(matches!(err, OptimizeError::OutputDirectory { .. }));
    }

    #[tokio::test]
    async fn test_get_file_size() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.png");
        std::fs::write(&file, vec![0u8; 1536]).unwrap();

        assert_eq!(FileManager::get_file_size(&file).await.unwrap(), 1536);
        assert!(matches!(
            FileManager::get_file_size(&temp_dir.path().join("missing.png")).await,
            Err(OptimizeError::Read { .. })
        ));
    }
}
