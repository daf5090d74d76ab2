//! # Optimizer Module
//!
//! Modulo che separa le responsabilità in sottomoduli:
//! - `batch_optimizer`: Orchestratore principale (validazione, discovery, loop sequenziale)
//! - `task_optimizer`: Worker per singoli file

pub mod batch_optimizer;
pub mod task_optimizer;

pub use batch_optimizer::{BatchOptimizer, OptimizationRequest};
pub use task_optimizer::TaskOptimizer;
