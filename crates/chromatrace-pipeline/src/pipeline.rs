//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire conversion in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use chromatrace_pipeline::{Pipeline, PipelineConfig, PipelineError, PixelBuffer};
//! # fn run(buffer: &PixelBuffer) -> Result<(), PipelineError> {
//! let document = Pipeline::new(buffer, PipelineConfig::default())
//!     .validate()?
//!     .preprocess()?
//!     .reduce_palette()?
//!     .extract_regions()
//!     .vectorize()?
//!     .compose()?
//!     .into_document();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying every intermediate the
//! later stages need. The source pixels are borrowed, never copied.

use crate::compose::{AccentGuides, VectorComposer, VectorDocument};
use crate::config::PipelineConfig;
use crate::curve::CurvePath;
use crate::diagnostics::{StageMetrics, reduction_ratio};
use crate::preprocess::{EnhanceParams, enhance};
use crate::quantize::{Palette, PaletteAssignment, PaletteReducer, QuantizedImage};
use crate::region::{Region, RegionExtractor, RegionSet};
use crate::report::ConversionReport;
use crate::tonal::TonalMap;
use crate::types::{PipelineError, PixelBuffer};
use crate::vectorize::{RegionOutcome, record_outcomes, vectorize_regions};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`validate`](Self::validate) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .validate() to continue"]
pub struct Pending<'a> {
    buffer: &'a PixelBuffer,
    config: PipelineConfig,
}

impl<'a> Pending<'a> {
    /// The configuration that will drive the run.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Check the configuration and advance to the [`Validated`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] if any field is out
    /// of range.
    pub fn validate(self) -> Result<Validated<'a>, PipelineError> {
        self.config.validate()?;
        Ok(Validated {
            buffer: self.buffer,
            config: self.config,
        })
    }
}

// ───────────────────────── Stage 1: Validated ────────────────────────

/// Pipeline state after validation.
///
/// Call [`preprocess`](Self::preprocess) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .preprocess() to continue"]
pub struct Validated<'a> {
    buffer: &'a PixelBuffer,
    config: PipelineConfig,
}

impl<'a> Validated<'a> {
    /// The source pixels.
    #[must_use]
    pub const fn buffer(&self) -> &PixelBuffer {
        self.buffer
    }

    /// Enhance a copy of the source if enabled, build the accent guides,
    /// and advance.
    ///
    /// # Errors
    ///
    /// Propagates buffer construction errors from enhancement or the
    /// pyramid (not reachable for a valid source).
    pub fn preprocess(self) -> Result<Preprocessed<'a>, PipelineError> {
        let enhanced = if self.config.preprocess {
            let params = EnhanceParams {
                blur_sigma: self.config.preprocess_blur_sigma,
                contrast: self.config.preprocess_contrast,
            };
            Some(enhance(self.buffer, &params)?)
        } else {
            None
        };
        let guides = AccentGuides::build(self.buffer, &self.config)?;
        Ok(Preprocessed {
            buffer: self.buffer,
            config: self.config,
            enhanced,
            guides,
        })
    }
}

// ───────────────────────── Stage 2: Preprocessed ─────────────────────

/// Pipeline state after preprocessing.
///
/// Call [`reduce_palette`](Self::reduce_palette) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .reduce_palette() to continue"]
pub struct Preprocessed<'a> {
    buffer: &'a PixelBuffer,
    config: PipelineConfig,
    enhanced: Option<PixelBuffer>,
    guides: AccentGuides,
}

impl<'a> Preprocessed<'a> {
    /// The pixels palette reduction will cluster: the enhanced copy when
    /// preprocessing is on, the source otherwise.
    #[must_use]
    pub fn working_buffer(&self) -> &PixelBuffer {
        self.enhanced.as_ref().unwrap_or(self.buffer)
    }

    /// The analyses the accent layers will sample.
    #[must_use]
    pub const fn guides(&self) -> &AccentGuides {
        &self.guides
    }

    /// Reduce the working image to a small palette and advance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] if the palette
    /// settings are unusable.
    pub fn reduce_palette(self) -> Result<PaletteReduced<'a>, PipelineError> {
        let quantized = PaletteReducer::from_config(&self.config).reduce(self.working_buffer())?;
        Ok(PaletteReduced {
            buffer: self.buffer,
            config: self.config,
            quantized,
            guides: self.guides,
        })
    }
}

// ───────────────────────── Stage 3: PaletteReduced ───────────────────

/// Pipeline state after palette reduction.
///
/// Call [`extract_regions`](Self::extract_regions) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .extract_regions() to continue"]
pub struct PaletteReduced<'a> {
    buffer: &'a PixelBuffer,
    config: PipelineConfig,
    quantized: QuantizedImage,
    guides: AccentGuides,
}

impl<'a> PaletteReduced<'a> {
    /// The reduced palette.
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.quantized.palette
    }

    /// Per-pixel palette indices.
    #[must_use]
    pub const fn assignment(&self) -> &PaletteAssignment {
        &self.quantized.assignment
    }

    /// Group pixels by palette color and advance.
    pub fn extract_regions(self) -> RegionsExtracted<'a> {
        let regions = RegionExtractor::new(self.config.min_region_pixels).extract(&self.quantized);
        RegionsExtracted {
            buffer: self.buffer,
            config: self.config,
            palette: self.quantized.palette,
            regions,
            guides: self.guides,
        }
    }
}

// ───────────────────────── Stage 4: RegionsExtracted ─────────────────

/// Pipeline state after region extraction.
///
/// Call [`vectorize`](Self::vectorize) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .vectorize() to continue"]
pub struct RegionsExtracted<'a> {
    buffer: &'a PixelBuffer,
    config: PipelineConfig,
    palette: Palette,
    regions: RegionSet,
    guides: AccentGuides,
}

impl<'a> RegionsExtracted<'a> {
    /// The kept regions, largest first.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions.regions
    }

    /// The full extraction result, including noise counts.
    #[must_use]
    pub const fn region_set(&self) -> &RegionSet {
        &self.regions
    }

    /// Trace, simplify, and fit every region in parallel, then advance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] if the
    /// simplification tolerance is negative.
    pub fn vectorize(self) -> Result<Vectorized<'a>, PipelineError> {
        let outcomes = vectorize_regions(&self.regions.regions, &self.config)?;
        Ok(Vectorized {
            buffer: self.buffer,
            config: self.config,
            palette: self.palette,
            discarded_groups: self.regions.discarded_groups,
            discarded_pixels: self.regions.discarded_pixels,
            outcomes,
            guides: self.guides,
        })
    }
}

// ───────────────────────── Stage 5: Vectorized ───────────────────────

/// Pipeline state after per-region vectorization.
///
/// Call [`compose`](Self::compose) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .compose() to continue"]
pub struct Vectorized<'a> {
    buffer: &'a PixelBuffer,
    config: PipelineConfig,
    palette: Palette,
    discarded_groups: usize,
    discarded_pixels: usize,
    outcomes: Vec<RegionOutcome>,
    guides: AccentGuides,
}

impl Vectorized<'_> {
    /// Per-region results in region order.
    #[must_use]
    pub fn outcomes(&self) -> &[RegionOutcome] {
        &self.outcomes
    }

    /// The conversion report as it stands after vectorization.
    #[must_use]
    pub fn report(&self) -> ConversionReport {
        let mut report = ConversionReport {
            palette_converged: true,
            noise_groups_discarded: self.discarded_groups,
            noise_pixels_discarded: self.discarded_pixels,
            ..ConversionReport::default()
        };
        if !self.palette.converged() {
            report.record_palette_not_converged();
        }
        record_outcomes(&mut report, &self.outcomes);
        report
    }

    /// Assemble the final document and advance.
    ///
    /// # Errors
    ///
    /// Propagates errors from edge-overlay detection.
    pub fn compose(self) -> Result<Composed, PipelineError> {
        let report = self.report();
        let paths = self.outcomes.into_iter().filter_map(|o| o.path).collect();
        let document = VectorComposer::from_config(&self.config).compose(
            self.buffer,
            &self.palette,
            paths,
            &self.guides,
            report,
        )?;
        Ok(Composed {
            palette_colors: self.palette.len(),
            document,
        })
    }
}

// ───────────────────────── Stage 6: Composed ─────────────────────────

/// Pipeline state after composition — the final stage.
#[must_use = "call .into_document() to extract the VectorDocument"]
pub struct Composed {
    palette_colors: usize,
    document: VectorDocument,
}

impl Composed {
    /// The finished document.
    #[must_use]
    pub const fn document(&self) -> &VectorDocument {
        &self.document
    }

    /// Number of colors in the palette the document was drawn from.
    #[must_use]
    pub const fn palette_colors(&self) -> usize {
        self.palette_colors
    }

    /// Consume the pipeline and return the document.
    #[must_use]
    pub fn into_document(self) -> VectorDocument {
        self.document
    }
}

// ───────────────────────── PipelineStage trait ───────────────────────

/// Identity and metrics shared by every pipeline stage.
pub trait PipelineStage {
    /// Short name of this stage (e.g. `"validate"`).
    const NAME: &'static str;

    /// Zero-based position of this stage in the pipeline.
    const INDEX: usize;

    /// Stage-specific metrics for diagnostics.
    fn metrics(&self) -> StageMetrics;
}

impl PipelineStage for Pending<'_> {
    const NAME: &'static str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> StageMetrics {
        validate_metrics(self.buffer, &self.config)
    }
}

impl PipelineStage for Validated<'_> {
    const NAME: &'static str = "validate";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        validate_metrics(self.buffer, &self.config)
    }
}

impl PipelineStage for Preprocessed<'_> {
    const NAME: &'static str = "preprocess";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Preprocess {
            enhanced: self.enhanced.is_some(),
            pyramid_depth: self.guides.pyramid.depth(),
            tones: self.guides.tonal.as_ref().map(TonalMap::counts),
        }
    }
}

impl PipelineStage for PaletteReduced<'_> {
    const NAME: &'static str = "palette";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        let palette = &self.quantized.palette;
        StageMetrics::Palette {
            requested: self.config.palette_size,
            colors: palette.len(),
            color_space: format!("{:?}", self.config.color_space),
            iterations: palette.iterations(),
            converged: palette.converged(),
        }
    }
}

impl PipelineStage for RegionsExtracted<'_> {
    const NAME: &'static str = "regions";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Regions {
            region_count: self.regions.regions.len(),
            largest_region_pixels: self
                .regions
                .regions
                .first()
                .map_or(0, Region::pixel_count),
            discarded_groups: self.regions.discarded_groups,
            discarded_pixels: self.regions.discarded_pixels,
        }
    }
}

impl PipelineStage for Vectorized<'_> {
    const NAME: &'static str = "vectorize";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        let report = self.report();
        let points_before = self.outcomes.iter().map(|o| o.traced_points).sum();
        let points_after = self.outcomes.iter().map(|o| o.simplified_points).sum();
        StageMetrics::Vectorize {
            tracer: self.config.boundary_tracer.to_string(),
            ring_count: self.outcomes.iter().map(|o| o.ring_count).sum(),
            points_before,
            points_after,
            reduction_ratio: reduction_ratio(points_before, points_after),
            paths: report.regions_drawn,
            skipped: report.regions_skipped,
            truncated: report.regions_truncated,
            piecewise: report.regions_piecewise,
        }
    }
}

impl PipelineStage for Composed {
    const NAME: &'static str = "compose";
    const INDEX: usize = 6;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Compose {
            region_paths: self.document.regions.len(),
            region_subpaths: self
                .document
                .regions
                .iter()
                .map(CurvePath::subpath_count)
                .sum(),
            mesh_patches: self.document.mesh.len(),
            edge_strokes: self.document.edges.len(),
            highlights: self.document.highlights.len(),
        }
    }
}

fn validate_metrics(buffer: &PixelBuffer, config: &PipelineConfig) -> StageMetrics {
    let dimensions = buffer.dimensions();
    StageMetrics::Validate {
        width: dimensions.width,
        height: dimensions.height,
        pixel_count: dimensions.pixel_count(),
        preset: config.preset.to_string(),
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental raster-to-vector pipeline.
///
/// Created via [`Pipeline::new`], which stores a borrow of the source
/// pixels and the config without doing any processing.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline over `buffer`.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(buffer: &PixelBuffer, config: PipelineConfig) -> Pending<'_> {
        Pending { buffer, config }
    }
}
