//! # Format Policy Module
//!
//! Centralizza la scelta di nome di output ed encoder per ogni file.
//!
//! ## Responsabilità:
//! - Definisce `TargetFormat` (webp, jpeg, png, original) con parsing del token CLI
//! - Definisce `EncoderKind` con i parametri di qualità/compressione
//! - `FormatPolicy::resolve()`: mapping puro (target, estensione) -> policy
//!
//! ## Tabella:
//! | Target   | Output                        | Encoder                     |
//! |----------|-------------------------------|-----------------------------|
//! | webp     | `<nome>.webp`                 | WebP q=80                   |
//! | jpeg     | `<nome>.jpg`                  | JPEG q=85                   |
//! | png      | `<nome>.png`                  | PNG livello 9               |
//! | original | `<nome>_optimized.<ext>`      | in base all'estensione      |
//!
//! In modalità `original` le estensioni senza policy (bmp, tiff) vengono
//! decodificate e salvate con l'encoder di default del container.

use crate::error::OptimizeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Suffix appended to the base name in format-preserving mode
pub const OPTIMIZED_SUFFIX: &str = "_optimized";

/// Target format selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Webp,
    Jpeg,
    Png,
    Original,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 4] = [Self::Webp, Self::Jpeg, Self::Png, Self::Original];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Original => "original",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = OptimizeError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == token)
            .ok_or_else(|| OptimizeError::UnsupportedFormat(token.to_string()))
    }
}

/// Quality/compression parameters used by the encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub webp_quality: u8,
    pub jpeg_quality: u8,
    pub png_compression_level: u8,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            webp_quality: 80,
            jpeg_quality: 85,
            png_compression_level: 9,
        }
    }
}

/// Encoder invoked for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    Webp { quality: u8 },
    Jpeg { quality: u8 },
    Png { compression_level: u8 },
    /// Re-save with the container's default encoder, no parameters
    Passthrough,
}

/// How the output file name is derived from the source name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputNaming {
    /// `<stem>.<output_extension>`
    Renamed,
    /// `<stem>_optimized.<source extension>`
    Suffixed,
}

/// Output naming and encoder for one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPolicy {
    /// Extension without the leading dot
    pub output_extension: String,
    pub encoder: EncoderKind,
    pub naming: OutputNaming,
}

impl FormatPolicy {
    /// Resolve with the default quality parameters
    pub fn resolve(target: TargetFormat, source_extension: &str) -> Self {
        Self::resolve_with(target, source_extension, &EncoderSettings::default())
    }

    /// Resolve the policy for `source_extension` (with or without the leading
    /// dot, any case)
    pub fn resolve_with(
        target: TargetFormat,
        source_extension: &str,
        settings: &EncoderSettings,
    ) -> Self {
        let source_extension = source_extension.trim_start_matches('.');
        let renamed = |extension: &str, encoder| Self {
            output_extension: extension.to_string(),
            encoder,
            naming: OutputNaming::Renamed,
        };

        match target {
            TargetFormat::Webp => renamed("webp", Self::webp(settings)),
            TargetFormat::Jpeg => renamed("jpg", Self::jpeg(settings)),
            TargetFormat::Png => renamed("png", Self::png(settings)),
            TargetFormat::Original => {
                let encoder = match source_extension.to_lowercase().as_str() {
                    "jpg" | "jpeg" => Self::jpeg(settings),
                    "png" => Self::png(settings),
                    "webp" => Self::webp(settings),
                    _ => EncoderKind::Passthrough,
                };
                Self {
                    output_extension: source_extension.to_string(),
                    encoder,
                    naming: OutputNaming::Suffixed,
                }
            }
        }
    }

    /// Output file name for a source base name (file stem)
    pub fn output_file_name(&self, stem: &str) -> String {
        match self.naming {
            OutputNaming::Renamed => format!("{}.{}", stem, self.output_extension),
            OutputNaming::Suffixed if self.output_extension.is_empty() => {
                format!("{}{}", stem, OPTIMIZED_SUFFIX)
            }
            OutputNaming::Suffixed => {
                format!("{}{}.{}", stem, OPTIMIZED_SUFFIX, self.output_extension)
            }
        }
    }

    fn webp(settings: &EncoderSettings) -> EncoderKind {
        EncoderKind::Webp { quality: settings.webp_quality }
    }

    fn jpeg(settings: &EncoderSettings) -> EncoderKind {
        EncoderKind::Jpeg { quality: settings.jpeg_quality }
    }

    fn png(settings: &EncoderSettings) -> EncoderKind {
        EncoderKind::Png { compression_level: settings.png_compression_level }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "bmp", "tiff"];

    #[test]
    fn test_forced_formats_ignore_source_extension() {
        for ext in EXTENSIONS {
            let webp = FormatPolicy::resolve(TargetFormat::Webp, ext);
            assert_eq!(webp.encoder, EncoderKind::Webp { quality: 80 });
            assert_eq!(webp.output_file_name("photo"), "photo.webp");

            let jpeg = FormatPolicy::resolve(TargetFormat::Jpeg, ext);
            assert_eq!(jpeg.encoder, EncoderKind::Jpeg { quality: 85 });
            assert_eq!(jpeg.output_file_name("photo"), "photo.jpg");

            let png = FormatPolicy::resolve(TargetFormat::Png, ext);
            assert_eq!(png.encoder, EncoderKind::Png { compression_level: 9 });
            assert_eq!(png.output_file_name("photo"), "photo.png");
        }
    }

    #[test]
    fn test_original_keeps_extension_and_picks_encoder() {
        let cases = [
            ("jpg", EncoderKind::Jpeg { quality: 85 }),
            ("jpeg", EncoderKind::Jpeg { quality: 85 }),
            ("png", EncoderKind::Png { compression_level: 9 }),
            ("webp", EncoderKind::Webp { quality: 80 }),
            ("bmp", EncoderKind::Passthrough),
            ("tiff", EncoderKind::Passthrough),
        ];
        for (ext, encoder) in cases {
            let policy = FormatPolicy::resolve(TargetFormat::Original, ext);
            assert_eq!(policy.encoder, encoder, "extension {}", ext);
            assert_eq!(policy.output_file_name("scan"), format!("scan_optimized.{}", ext));
        }
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        let policy = FormatPolicy::resolve(TargetFormat::Original, ".JPG");
        assert_eq!(policy.encoder, EncoderKind::Jpeg { quality: 85 });
        // Source spelling is preserved in the output name
        assert_eq!(policy.output_file_name("IMG_001"), "IMG_001_optimized.JPG");

        let policy = FormatPolicy::resolve(TargetFormat::Original, "Png");
        assert_eq!(policy.encoder, EncoderKind::Png { compression_level: 9 });
    }

    #[test]
    fn test_resolve_is_deterministic() {
        for target in TargetFormat::ALL {
            for ext in EXTENSIONS {
                assert_eq!(FormatPolicy::resolve(target, ext), FormatPolicy::resolve(target, ext));
            }
        }
    }

    #[test]
    fn test_custom_settings_flow_into_encoder() {
        let settings = EncoderSettings {
            webp_quality: 60,
            jpeg_quality: 70,
            png_compression_level: 3,
        };
        let policy = FormatPolicy::resolve_with(TargetFormat::Original, "webp", &settings);
        assert_eq!(policy.encoder, EncoderKind::Webp { quality: 60 });
        let policy = FormatPolicy::resolve_with(TargetFormat::Png, "jpg", &settings);
        assert_eq!(policy.encoder, EncoderKind::Png { compression_level: 3 });
    }

    #[test]
    fn test_target_format_parsing() {
        assert_eq!("webp".parse::<TargetFormat>().unwrap(), TargetFormat::Webp);
        assert_eq!("original".parse::<TargetFormat>().unwrap(), TargetFormat::Original);
        assert!(matches!(
            "gif".parse::<TargetFormat>(),
            Err(OptimizeError::UnsupportedFormat(token)) if token == "gif"
        ));
        assert!("WEBP".parse::<TargetFormat>().is_err());
    }
}
