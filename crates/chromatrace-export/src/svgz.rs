//! SVGZ export: gzip-compressed SVG.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

use chromatrace_pipeline::VectorDocument;

use crate::svg::{SvgMetadata, to_svg};

/// Errors produced while encoding an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The gzip encoder failed.
    #[error("failed to compress SVG: {0}")]
    Compress(#[from] std::io::Error),
}

/// Gzip-compress serialized SVG text.
///
/// # Errors
///
/// Returns [`ExportError::Compress`] if the encoder fails.
pub fn compress(svg: &str) -> Result<Vec<u8>, ExportError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(svg.as_bytes())?;
    Ok(encoder.finish()?)
}

/// Serialize a vector document to gzip-compressed SVG.
///
/// Decompressing the result yields exactly [`to_svg`]'s output.
///
/// # Errors
///
/// Returns [`ExportError::Compress`] if the encoder fails.
pub fn to_svgz(
    document: &VectorDocument,
    metadata: &SvgMetadata<'_>,
) -> Result<Vec<u8>, ExportError> {
    compress(&to_svg(document, metadata))
}
