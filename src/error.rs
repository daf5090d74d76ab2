//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Classifica ogni errore in una `ErrorKind` (validazione, per-file, fatale)
//! - Mappa le categorie sugli exit code del processo worker
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - **Validation**: argomenti non validi, directory inesistente, formato non supportato
//! - **PerFile**: errori del codec o del filesystem limitati a un singolo file
//! - **Fatal**: errori fuori dal loop per-file (creazione directory output, listing)
//!
//! ## Esempio:
//! ```rust
//! use image_optimizer::error::{ErrorKind, OptimizeError};
//!
//! let err = OptimizeError::UnsupportedFormat("gif".to_string());
//! assert_eq!(err.kind(), ErrorKind::Validation);
//! ```

use std::path::PathBuf;

/// Exit code: batch completed (per-file failures included, unless strict)
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code: unexpected error outside the per-file loop
pub const EXIT_FATAL: u8 = 1;
/// Exit code: invalid arguments or input path
pub const EXIT_VALIDATION: u8 = 2;
/// Exit code: strict mode and at least one file failed
pub const EXIT_FILE_ERRORS: u8 = 3;
/// Exit code: stopped by the user between two files
pub const EXIT_CANCELLED: u8 = 130;

/// Broad classification used for propagation and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    PerFile,
    Fatal,
}

/// Custom error types for image optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("Unsupported format \"{0}\". Supported: webp, jpeg, png, original")]
    UnsupportedFormat(String),

    #[error("Input path \"{}\" does not exist", .0.display())]
    InputNotFound(PathBuf),

    #[error("Input path \"{}\" is not a directory", .0.display())]
    InputNotDirectory(PathBuf),

    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory listing error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Encoding {} failed: {message}", path.display())]
    Encode { path: PathBuf, message: String },

    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Processing task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OptimizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) | Self::InputNotFound(_) | Self::InputNotDirectory(_) => {
                ErrorKind::Validation
            }
            Self::OutputDirectory { .. } | Self::Walk(_) | Self::Io(_) => ErrorKind::Fatal,
            Self::Read { .. }
            | Self::Decode { .. }
            | Self::Encode { .. }
            | Self::Write { .. }
            | Self::Task(_) => ErrorKind::PerFile,
        }
    }

    /// Exit code the worker reports when this error ends the run
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Validation => EXIT_VALIDATION,
            ErrorKind::PerFile | ErrorKind::Fatal => EXIT_FATAL,
        }
    }
}
