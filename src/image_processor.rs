//! # Image Processing Module
//!
//! Questo modulo implementa il codec: decodifica un'immagine, la ricodifica
//! secondo la `FormatPolicy` e la scrive nel path di output.
//!
//! ## Formati Supportati
//!
//! | Encoder     | Libreria                      | Parametro                 |
//! |-------------|-------------------------------|---------------------------|
//! | JPEG        | `image` (JpegEncoder)         | qualità 1-100             |
//! | PNG         | `image` (PngEncoder)          | livello compressione 0-9  |
//! | WebP        | `webp` (libwebp)              | qualità 1-100 (lossy)     |
//! | Passthrough | `image` (encoder del formato) | nessuno                   |
//!
//! ## Pipeline
//!
//! 1. **Decodifica**: formato rilevato dal contenuto, non dall'estensione
//! 2. **Encoding**: su un file temporaneo nella directory di output
//! 3. **Persist**: rename atomico sul nome finale (sovrascrive output esistenti)
//!
//! Un errore in qualsiasi fase lascia intatto l'eventuale output precedente.
//!
//! ## Errori
//!
//! - `Read`: file non leggibile
//! - `Decode`: file corrotto o formato non riconosciuto
//! - `Encode`: l'encoder rifiuta l'immagine
//! - `Write`: directory di output non scrivibile

use crate::error::OptimizeError;
use crate::format_policy::{EncoderKind, FormatPolicy};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Codec capability used by the batch optimizer.
///
/// Implementations are called from the blocking thread pool, one file at a time.
pub trait Codec: Send + Sync {
    /// Load `input`, re-encode it according to `policy` and write it to `output`
    fn transcode(&self, input: &Path, output: &Path, policy: &FormatPolicy) -> Result<(), OptimizeError>;
}

/// In-process codec built on the `image` and `webp` crates
#[derive(Debug, Default, Clone)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    fn load(input: &Path) -> Result<DynamicImage, OptimizeError> {
        let read_error = |source| OptimizeError::Read {
            path: input.to_path_buf(),
            source,
        };

        image::io::Reader::open(input)
            .map_err(read_error)?
            .with_guessed_format()
            .map_err(read_error)?
            .decode()
            .map_err(|source| OptimizeError::Decode {
                path: input.to_path_buf(),
                source,
            })
    }

    fn encode<W: Write + Seek>(
        image: &DynamicImage,
        policy: &FormatPolicy,
        output: &Path,
        writer: &mut W,
    ) -> Result<(), OptimizeError> {
        let encode_error = |message: String| OptimizeError::Encode {
            path: output.to_path_buf(),
            message,
        };

        match policy.encoder {
            EncoderKind::Jpeg { quality } => {
                // JPEG has no alpha channel
                let rgb = image.to_rgb8();
                JpegEncoder::new_with_quality(writer, quality)
                    .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                    .map_err(|e| encode_error(e.to_string()))
            }
            EncoderKind::Png { compression_level } => {
                let image = match image.color() {
                    ColorType::Rgb32F | ColorType::Rgba32F => DynamicImage::ImageRgba8(image.to_rgba8()),
                    _ => image.clone(),
                };
                PngEncoder::new_with_quality(
                    writer,
                    Self::png_compression(compression_level),
                    FilterType::Adaptive,
                )
                .write_image(image.as_bytes(), image.width(), image.height(), image.color())
                .map_err(|e| encode_error(e.to_string()))
            }
            EncoderKind::Webp { quality } => {
                // libwebp only accepts 8-bit RGB/RGBA
                let prepared = if image.color().has_alpha() {
                    DynamicImage::ImageRgba8(image.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(image.to_rgb8())
                };
                let encoder = webp::Encoder::from_image(&prepared)
                    .map_err(|message| encode_error(message.to_string()))?;
                let encoded = encoder.encode(f32::from(quality));
                writer.write_all(&encoded).map_err(|source| OptimizeError::Write {
                    path: output.to_path_buf(),
                    source,
                })
            }
            EncoderKind::Passthrough => {
                // `original` keeps the source spelling, e.g. `TIFF`
                let extension = policy.output_extension.to_ascii_lowercase();
                let format = ImageFormat::from_extension(&extension).ok_or_else(|| {
                    encode_error(format!("no encoder for extension {:?}", policy.output_extension))
                })?;
                warn!(
                    "No re-encoding policy for .{}, saving {} with {:?} defaults",
                    policy.output_extension,
                    output.display(),
                    format
                );
                image
                    .write_to(writer, format)
                    .map_err(|e| encode_error(e.to_string()))
            }
        }
    }

    /// Map a 0-9 zlib-style level onto the PNG encoder presets
    fn png_compression(level: u8) -> CompressionType {
        match level {
            0..=3 => CompressionType::Fast,
            4..=6 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }
}

impl Codec for ImageProcessor {
    fn transcode(&self, input: &Path, output: &Path, policy: &FormatPolicy) -> Result<(), OptimizeError> {
        let write_error = |source| OptimizeError::Write {
            path: output.to_path_buf(),
            source,
        };

        let image = Self::load(input)?;
        debug!(
            "Decoded {} ({}x{}, {:?})",
            input.display(),
            image.width(),
            image.height(),
            image.color()
        );

        let output_dir = output.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(output_dir).map_err(write_error)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            Self::encode(&image, policy, output, &mut writer)?;
            writer.flush().map_err(write_error)?;
        }
        staged.persist(output).map_err(|e| write_error(e.error))?;

        debug!("Wrote {} using {:?}", output.display(), policy.encoder);
        Ok(())
    }
}
