//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di ottimizzazione
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `webp_quality`: Qualità WebP (1-100, default: 80)
//! - `jpeg_quality`: Qualità JPEG (1-100, default: 85)
//! - `png_compression_level`: Livello compressione PNG (0-9, default: 9)
//! - `output_dir_name`: Nome della sottodirectory di output (default: "optimized")
//! - `event_buffer`: Capacità del canale eventi (default: 64)
//! - `strict`: Exit code non-zero se almeno un file fallisce (default: false)
//! - `json_output`: Eventi in formato JSON lines (default: false)
//!
//! ## Esempio:
//! ```rust
//! use image_optimizer::Config;
//!
//! let config = Config {
//!     jpeg_quality: 90,
//!     strict: true,
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//! ```

use crate::format_policy::EncoderSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for batch image optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// WebP quality (1-100)
    pub webp_quality: u8,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// PNG compression level (0-9)
    pub png_compression_level: u8,
    /// Name of the output subdirectory created inside the source directory
    pub output_dir_name: String,
    /// Capacity of the bounded event channel
    pub event_buffer: usize,
    /// Exit non-zero when any single file fails
    pub strict: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        let encoder = EncoderSettings::default();
        Self {
            webp_quality: encoder.webp_quality,
            jpeg_quality: encoder.jpeg_quality,
            png_compression_level: encoder.png_compression_level,
            output_dir_name: "optimized".to_string(),
            event_buffer: 64,
            strict: false,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.webp_quality == 0 || self.webp_quality > 100 {
            return Err(anyhow::anyhow!("WebP quality must be between 1 and 100"));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("JPEG quality must be between 1 and 100"));
        }

        if self.png_compression_level > 9 {
            return Err(anyhow::anyhow!("PNG compression level must be between 0 and 9"));
        }

        if self.event_buffer == 0 {
            return Err(anyhow::anyhow!("Event buffer must be greater than 0"));
        }

        // Must stay a single directory inside the source folder
        let mut components = Path::new(&self.output_dir_name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(std::path::Component::Normal(_)), None)
        );
        if !single_normal {
            return Err(anyhow::anyhow!(
                "Output directory name must be a single path component: {:?}",
                self.output_dir_name
            ));
        }

        Ok(())
    }

    /// Quality parameters passed to the format policy resolver
    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            webp_quality: self.webp_quality,
            jpeg_quality: self.jpeg_quality,
            png_compression_level: self.png_compression_level,
        }
    }

    /// Default config file location (`<config dir>/image-optimizer/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("image-optimizer").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
