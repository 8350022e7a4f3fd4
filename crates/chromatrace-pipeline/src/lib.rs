//! chromatrace-pipeline: raster-to-vector region pipeline (sans-IO).
//!
//! Converts a decoded photo into a layered vector drawing through:
//! optional enhancement -> palette reduction -> region extraction ->
//! boundary tracing -> Douglas-Peucker simplification -> curve fitting ->
//! composition.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! pixel buffers and returns structured data. Serialization lives in
//! `chromatrace-export`, file handling in the `chromatrace` CLI.
//!
//! The pipeline emits `tracing` events and spans but never installs a
//! subscriber.

pub mod boundary;
pub mod color;
pub mod compose;
pub mod config;
pub mod curve;
pub mod diagnostics;
pub mod edge;
pub mod pipeline;
pub mod preprocess;
pub mod pyramid;
pub mod quantize;
pub mod region;
pub mod report;
pub mod simplify;
pub mod tonal;
pub mod types;
pub mod vectorize;

pub use boundary::{BoundaryTracer, BoundaryTracerKind};
pub use compose::{
    AccentGuides, Background, Highlight, MeshPatch, Stroke, VectorComposer, VectorDocument,
};
pub use config::{ColorSpace, CurveStyle, PipelineConfig, QualityPreset};
pub use curve::{CurveFitter, CurvePath, FillRule, PathCommand};
pub use pipeline::Pipeline;
pub use pyramid::Pyramid;
pub use quantize::{Palette, PaletteReducer};
pub use region::{Region, RegionExtractor};
pub use report::{ConversionReport, Degradation, DegradationKind};
pub use tonal::{TonalMap, Tone};
pub use types::{Color, Dimensions, PipelineError, PixelBuffer, Point, Polyline};

/// Convert a pixel buffer into a vector document.
///
/// # Pipeline steps
///
/// 1. Validate the configuration
/// 2. Preprocessing: optional blur and contrast stretch of a working copy,
///    plus the tonal map and edge pyramid the accent layers need
/// 3. Palette reduction (k-means over a pixel sample)
/// 4. Region extraction (one region per palette color, noise dropped)
/// 5. Per region, in parallel: boundary tracing, simplification, curve
///    fitting
/// 6. Composition of background, regions, and enabled accent layers
///
/// Degenerate regions and exhausted budgets do not fail the call; they
/// are recorded in [`VectorDocument::report`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfiguration`] if `config` fails
/// validation.
pub fn process(
    buffer: &PixelBuffer,
    config: &PipelineConfig,
) -> Result<VectorDocument, PipelineError> {
    let _span = tracing::info_span!("convert", width = buffer.width(), height = buffer.height())
        .entered();

    let document = Pipeline::new(buffer, config.clone())
        .validate()?
        .preprocess()?
        .reduce_palette()?
        .extract_regions()
        .vectorize()?
        .compose()?
        .into_document();

    tracing::debug!(
        regions = document.regions.len(),
        skipped = document.report.regions_skipped,
        degradations = document.report.degradations.len(),
        "conversion finished"
    );
    Ok(document)
}

/// Decode encoded image bytes (PNG, JPEG, BMP, WebP, ...) and convert them.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] for empty input,
/// [`PipelineError::ImageDecode`] if the bytes cannot be decoded, and
/// anything [`process`] returns.
pub fn process_bytes(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<VectorDocument, PipelineError> {
    config.validate()?;
    let buffer = PixelBuffer::decode(image_bytes)?;
    process(&buffer, config)
}
