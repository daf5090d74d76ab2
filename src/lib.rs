//! # Image Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom ed exit code
//! - `format_policy`: Scelta di nome output ed encoder per ogni file
//! - `file_manager`: Discovery immagini e utilità su file e dimensioni
//! - `image_processor`: Codec (decodifica e ricodifica JPEG/PNG/WebP)
//! - `optimizer`: Orchestratore del batch e worker per singolo file
//! - `events`: Stream di eventi verso il front end
//! - `progress`: Risultati, statistiche, rendering degli eventi
//! - `worker`: Contratto del processo worker e supervisor
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use image_optimizer::{events, BatchOptimizer, Config, ImageProcessor, OptimizationRequest};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), image_optimizer::OptimizeError> {
//! let (sink, _rx) = events::channel(64);
//! let request = OptimizationRequest::parse("/path/to/photos", "webp")?;
//! let mut optimizer = BatchOptimizer::new(Config::default(), Arc::new(ImageProcessor::new()), sink);
//! let summary = optimizer.run(&request).await?;
//! println!("{} ok, {} failed", summary.processed_ok, summary.failed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod file_manager;
pub mod format_policy;
pub mod image_processor;
pub mod optimizer;
pub mod progress;
pub mod worker;

pub use config::Config;
pub use error::OptimizeError;
pub use format_policy::{FormatPolicy, TargetFormat};
pub use image_processor::{Codec, ImageProcessor};
pub use optimizer::{BatchOptimizer, OptimizationRequest};
pub use progress::{BatchSummary, FileResult};
