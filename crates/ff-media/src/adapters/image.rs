//! Raster image adapter backed by the `image` crate.
//!
//! Decoding and encoding are CPU bound, so every call runs on tokio's
//! blocking pool. AVIF can be written but not read: an AVIF source is
//! characterized as opaque bytes and offers no conversions or operations.

use std::io::Cursor;

use ::image::codecs::avif::AvifEncoder;
use ::image::codecs::jpeg::JpegEncoder;
use ::image::imageops::FilterType;
use ::image::{DynamicImage, ImageFormat};
use async_trait::async_trait;
use ff_core::config::ConversionConfig;

use super::{
    unsupported_format, unsupported_operation, MediaAdapter, MediaInput, MediaMetadata, Operation,
    ProcessingResult,
};

const SUPPORTED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/avif",
    "image/tiff",
    "image/bmp",
];

/// Types the encoder can produce but the decoder cannot read.
const WRITE_ONLY_TYPES: &[&str] = &["image/avif"];

const CONVERSIONS: &[&str] = &["jpeg", "jpg", "png", "webp", "avif"];

const OPERATIONS: &[&str] = &["resize", "rotate", "compress"];

/// AVIF encoder speed (1 slowest .. 10 fastest).
const AVIF_SPEED: u8 = 8;

pub struct ImageAdapter {
    default_quality: u8,
}

impl ImageAdapter {
    pub fn new(conversion: &ConversionConfig) -> Self {
        Self {
            default_quality: conversion.jpeg_quality.clamp(1, 100),
        }
    }

    fn readable(&self, mime: &str) -> bool {
        self.supports(mime) && !WRITE_ONLY_TYPES.contains(&mime)
    }
}

async fn run_blocking<T, F>(operation: &'static str, f: F) -> ff_core::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> ff_core::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ff_core::Error::transform(operation, format!("worker panicked: {e}")))?
}

fn decode(bytes: &[u8], operation: &str) -> ff_core::Result<(DynamicImage, ImageFormat)> {
    let format = ::image::guess_format(bytes)
        .map_err(|e| ff_core::Error::transform(operation, format!("unrecognized image: {e}")))?;
    let img = ::image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ff_core::Error::transform(operation, format!("decode failed: {e}")))?;
    Ok((img, format))
}

fn format_name(format: ImageFormat) -> String {
    format!("{format:?}").to_lowercase()
}

/// Encode `img` into `format`. JPEG and AVIF honour `quality`; WebP is
/// always lossless.
fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    quality: u8,
    operation: &str,
) -> ff_core::Result<Vec<u8>> {
    let err = |e: ::image::ImageError| ff_core::Error::transform(operation, format!("encode failed: {e}"));
    let mut out = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
                .map_err(err)?;
        }
        ImageFormat::Avif => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(AvifEncoder::new_with_speed_quality(
                &mut out, AVIF_SPEED, quality,
            ))
            .map_err(err)?;
        }
        ImageFormat::WebP => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_to(&mut out, ImageFormat::WebP).map_err(err)?;
        }
        other => {
            img.write_to(&mut out, other).map_err(err)?;
        }
    }

    Ok(out.into_inner())
}

/// Re-encode in the source format when it is writable, else as PNG.
fn encode_like_source(
    img: &DynamicImage,
    source: ImageFormat,
    quality: u8,
    operation: &str,
) -> ff_core::Result<Vec<u8>> {
    if source.writing_enabled() {
        encode(img, source, quality, operation)
    } else {
        encode(img, ImageFormat::Png, quality, operation)
    }
}

fn target_format(format: &str) -> Option<ImageFormat> {
    match format.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        "webp" => Some(ImageFormat::WebP),
        "avif" => Some(ImageFormat::Avif),
        _ => None,
    }
}

#[async_trait]
impl MediaAdapter for ImageAdapter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn supports(&self, mime: &str) -> bool {
        SUPPORTED_TYPES.contains(&mime)
    }

    fn conversions(&self, mime: &str) -> Vec<&'static str> {
        if self.readable(mime) {
            CONVERSIONS.to_vec()
        } else {
            Vec::new()
        }
    }

    fn operations(&self, mime: &str) -> Vec<&'static str> {
        if self.readable(mime) {
            OPERATIONS.to_vec()
        } else {
            Vec::new()
        }
    }

    async fn process(&self, input: &MediaInput) -> ff_core::Result<ProcessingResult> {
        let bytes = input.bytes.clone();
        let decoded = run_blocking("process", move || {
            let (img, format) = decode(&bytes, "process")?;
            Ok(ProcessingResult {
                mime_type: format.to_mime_type().to_string(),
                size: bytes.len() as u64,
                metadata: MediaMetadata {
                    width: Some(img.width()),
                    height: Some(img.height()),
                    format: Some(format_name(format)),
                    has_alpha: Some(img.color().has_alpha()),
                    ..Default::default()
                },
            })
        })
        .await;

        match decoded {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(mime = input.mime_type(), "Image decode failed, reporting opaque result: {e}");
                Ok(ProcessingResult::opaque(input.bytes.len()))
            }
        }
    }

    async fn manipulate(&self, input: &MediaInput, op: &Operation) -> ff_core::Result<Vec<u8>> {
        let mime = input.mime_type().to_string();
        let default_quality = self.default_quality;
        let op = op.clone();

        if !self.readable(&mime) {
            return Err(unsupported_operation(self.name(), &op, &mime));
        }

        // Reject before touching the pixels.
        match &op {
            Operation::Convert { format, .. } if target_format(format).is_none() => {
                return Err(unsupported_format(format, &mime));
            }
            Operation::Rotate { angle } if ![90, 180, 270].contains(angle) => {
                return Err(ff_core::Error::Unsupported(format!(
                    "rotation by {angle} degrees; use 90, 180 or 270"
                )));
            }
            Operation::Resize {
                max_width,
                max_height,
            } if *max_width == 0 || *max_height == 0 => {
                return Err(ff_core::Error::Validation(
                    "resize bounds must be positive".into(),
                ));
            }
            Operation::Trim { .. } | Operation::ExtractAudio => {
                return Err(unsupported_operation(self.name(), &op, &mime));
            }
            _ => {}
        }

        let bytes = input.bytes.clone();
        let name = op.name();
        run_blocking(name, move || {
            let (img, source) = decode(&bytes, name)?;
            match op {
                Operation::Convert { format, quality } => {
                    let target = target_format(&format).ok_or_else(|| unsupported_format(&format, &mime))?;
                    let quality = quality.unwrap_or(default_quality).clamp(1, 100);
                    encode(&img, target, quality, name)
                }
                Operation::Resize {
                    max_width,
                    max_height,
                } => {
                    let resized = if img.width() <= max_width && img.height() <= max_height {
                        img
                    } else {
                        img.resize(max_width, max_height, FilterType::Lanczos3)
                    };
                    encode_like_source(&resized, source, default_quality, name)
                }
                Operation::Rotate { angle } => {
                    let rotated = match angle {
                        90 => img.rotate90(),
                        180 => img.rotate180(),
                        _ => img.rotate270(),
                    };
                    encode_like_source(&rotated, source, default_quality, name)
                }
                Operation::Compress { quality } => {
                    let quality = quality.unwrap_or(default_quality).clamp(1, 100);
                    encode(&img, ImageFormat::Jpeg, quality, name)
                }
                Operation::Trim { .. } | Operation::ExtractAudio => {
                    Err(ff_core::Error::Internal(format!("{name} reached the image encoder")))
                }
            }
        })
        .await
    }
}
