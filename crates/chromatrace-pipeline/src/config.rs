//! Pipeline configuration and named quality presets.
//!
//! A [`QualityPreset`] is only a shorthand: it expands into one explicit
//! [`PipelineConfig`] which is the single source of truth threaded through
//! every stage. Callers may start from a preset and override any field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::boundary::BoundaryTracerKind;
use crate::types::PipelineError;

/// Color space used to measure distances while clustering the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    /// Plain Euclidean distance on 8-bit RGB channels.
    Rgb,
    /// Weighted Euclidean distance in CIE L*a*b* (D65). Lightness is
    /// weighted below chroma so hue shifts separate clusters more readily
    /// than shading.
    #[default]
    Lab,
}

/// How simplified boundaries are turned into drawing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveStyle {
    /// Corner-cutting quadratic Béziers through relaxed vertices.
    #[default]
    Quadratic,
    /// Closed uniform cubic B-spline, emitted as exact cubic Béziers.
    /// Rings too short to carry a spline fall back to quadratics.
    BSpline,
}

/// Named quality presets.
///
/// Each preset trades speed for fidelity; see [`QualityPreset::config`]
/// for the exact parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// Few colors, aggressive simplification, no accents.
    Fast,
    /// The default trade-off, with an edge overlay.
    #[default]
    Balanced,
    /// Border-following tracer, B-spline curves, mesh and gradient
    /// background.
    High,
    /// Largest palette, finest tolerance, every accent layer.
    Ultra,
}

impl QualityPreset {
    /// All presets, from fastest to most detailed.
    pub const ALL: [Self; 4] = [Self::Fast, Self::Balanced, Self::High, Self::Ultra];

    /// Lowercase name of the preset.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }

    /// Expand the preset into a complete configuration.
    #[must_use]
    pub fn config(self) -> PipelineConfig {
        let base = PipelineConfig {
            preset: self,
            ..PipelineConfig::base()
        };
        match self {
            Self::Fast => PipelineConfig {
                palette_size: 16,
                preprocess_blur_sigma: 1.0,
                pyramid_levels: 3,
                smoothing_iterations: 1,
                simplify_tolerance: 5.0,
                min_region_pixels: 100,
                curve_smoothing: 0.3,
                ..base
            },
            Self::Balanced => PipelineConfig {
                palette_size: 32,
                preprocess_blur_sigma: 1.5,
                pyramid_levels: 4,
                smoothing_iterations: 2,
                simplify_tolerance: 3.0,
                min_region_pixels: 50,
                curve_smoothing: 0.5,
                edge_overlay: true,
                ..base
            },
            Self::High => PipelineConfig {
                palette_size: 64,
                preprocess_blur_sigma: 2.0,
                pyramid_levels: 4,
                smoothing_iterations: 3,
                simplify_tolerance: 2.0,
                min_region_pixels: 25,
                curve_smoothing: 0.7,
                boundary_tracer: BoundaryTracerKind::BorderFollowing,
                curve_style: CurveStyle::BSpline,
                edge_overlay: true,
                gradient_mesh: true,
                background_gradient: true,
                ..base
            },
            Self::Ultra => PipelineConfig {
                palette_size: 128,
                preprocess_blur_sigma: 2.5,
                pyramid_levels: 5,
                smoothing_iterations: 4,
                simplify_tolerance: 1.0,
                min_region_pixels: 10,
                curve_smoothing: 0.9,
                boundary_tracer: BoundaryTracerKind::BorderFollowing,
                curve_style: CurveStyle::BSpline,
                edge_overlay: true,
                gradient_mesh: true,
                background_gradient: true,
                highlights: true,
                ..base
            },
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QualityPreset {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                PipelineError::InvalidConfiguration(format!(
                    "unknown quality preset {s:?} (expected fast, balanced, high, or ultra)"
                ))
            })
    }
}

/// Configuration for the raster-to-vector pipeline.
///
/// `Default` is the [`QualityPreset::Balanced`] expansion. Values are not
/// checked on construction; [`validate`](Self::validate) runs before any
/// pixel work starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct PipelineConfig {
    /// Preset this configuration was expanded from (informational).
    pub preset: QualityPreset,

    // --- preprocessing ---
    /// Blur and contrast-stretch a copy of the source before palette
    /// reduction. Off in every preset: it trades exact flat colors for
    /// calmer clusters on noisy photos.
    pub preprocess: bool,
    /// Gaussian blur sigma of the preprocessing pass.
    pub preprocess_blur_sigma: f32,
    /// Lightness contrast factor of the preprocessing pass.
    pub preprocess_contrast: f32,

    // --- palette reduction ---
    /// Maximum number of palette colors (k).
    pub palette_size: usize,
    /// Color space in which clustering distances are measured.
    pub color_space: ColorSpace,
    /// Iteration cap for k-means refinement.
    pub palette_max_iterations: u32,
    /// Seed for centroid initialisation. `None` draws a fresh seed per run.
    pub seed: Option<u64>,
    /// Maximum number of pixels sampled for clustering. Larger images are
    /// sampled with a uniform stride; every pixel is still assigned.
    pub palette_sample_limit: usize,
    /// Palette entries closer than this CIE76 ΔE are merged into the more
    /// frequent one.
    pub palette_merge_distance: f64,

    // --- region extraction ---
    /// Same-color groups smaller than this are discarded as noise.
    pub min_region_pixels: usize,

    // --- boundary tracing ---
    /// Which boundary tracing strategy to use.
    pub boundary_tracer: BoundaryTracerKind,
    /// Maximum number of points visited per boundary ring before the
    /// traversal is truncated.
    pub max_boundary_points: usize,
    /// Successive boundary points farther apart than this (pixels) mark a
    /// polyline as piecewise.
    pub adjacency_radius: f64,

    // --- simplification ---
    /// Douglas-Peucker tolerance ε in pixels.
    pub simplify_tolerance: f64,

    // --- curve fitting ---
    /// How polylines become draw commands.
    pub curve_style: CurveStyle,
    /// Curve smoothing strength in `[0, 1]`. Zero emits straight segments.
    pub curve_smoothing: f64,
    /// Number of Laplacian relaxation passes applied before fitting.
    pub smoothing_iterations: u32,

    // --- composition ---
    /// Overlay low-opacity strokes along detected image edges.
    pub edge_overlay: bool,
    /// Overlay a grid of semi-transparent area-average patches.
    pub gradient_mesh: bool,
    /// Paint the background as a radial gradient of the darkest palette
    /// colors instead of a solid fill.
    pub background_gradient: bool,
    /// Add soft highlight ellipses over very light areas.
    pub highlights: bool,
    /// Number of mesh cells along each axis.
    pub mesh_grid: u32,
    /// Gaussian blur sigma applied before edge detection.
    pub edge_blur_sigma: f32,
    /// Canny low threshold for the edge overlay.
    pub canny_low: f32,
    /// Canny high threshold for the edge overlay.
    pub canny_high: f32,
    /// Upper bound on the number of edge-overlay strokes.
    pub max_edge_strokes: usize,
    /// Gaussian pyramid depth for the edge overlay, counting the source.
    /// `1` detects edges at full resolution only.
    pub pyramid_levels: u32,
}

impl PipelineConfig {
    /// Default k-means iteration cap.
    pub const DEFAULT_PALETTE_MAX_ITERATIONS: u32 = 15;
    /// Default clustering sample size.
    pub const DEFAULT_PALETTE_SAMPLE_LIMIT: usize = 40_000;
    /// Default palette merge distance (ΔE76).
    pub const DEFAULT_PALETTE_MERGE_DISTANCE: f64 = 3.0;
    /// Default boundary traversal cap.
    pub const DEFAULT_MAX_BOUNDARY_POINTS: usize = 20_000;
    /// Default adjacency radius (covers 8-connected neighbours).
    pub const DEFAULT_ADJACENCY_RADIUS: f64 = 1.5;
    /// Default mesh grid density.
    pub const DEFAULT_MESH_GRID: u32 = 10;
    /// Default edge blur sigma.
    pub const DEFAULT_EDGE_BLUR_SIGMA: f32 = 1.4;
    /// Default Canny low threshold.
    pub const DEFAULT_CANNY_LOW: f32 = 50.0;
    /// Default Canny high threshold.
    pub const DEFAULT_CANNY_HIGH: f32 = 150.0;
    /// Default cap on edge-overlay strokes.
    pub const DEFAULT_MAX_EDGE_STROKES: usize = 400;
    /// Largest accepted palette.
    pub const MAX_PALETTE_SIZE: usize = 256;
    /// Largest accepted number of relaxation passes.
    pub const MAX_SMOOTHING_ITERATIONS: u32 = 5;
    /// Default preprocessing contrast factor.
    pub const DEFAULT_PREPROCESS_CONTRAST: f32 = 1.2;
    /// Deepest accepted edge pyramid.
    pub const MAX_PYRAMID_LEVELS: u32 = 6;

    /// Shared values that presets override.
    const fn base() -> Self {
        Self {
            preset: QualityPreset::Balanced,
            preprocess: false,
            preprocess_blur_sigma: 1.5,
            preprocess_contrast: Self::DEFAULT_PREPROCESS_CONTRAST,
            palette_size: 32,
            color_space: ColorSpace::Lab,
            palette_max_iterations: Self::DEFAULT_PALETTE_MAX_ITERATIONS,
            seed: None,
            palette_sample_limit: Self::DEFAULT_PALETTE_SAMPLE_LIMIT,
            palette_merge_distance: Self::DEFAULT_PALETTE_MERGE_DISTANCE,
            min_region_pixels: 50,
            boundary_tracer: BoundaryTracerKind::NearestNeighbor,
            max_boundary_points: Self::DEFAULT_MAX_BOUNDARY_POINTS,
            adjacency_radius: Self::DEFAULT_ADJACENCY_RADIUS,
            simplify_tolerance: 3.0,
            curve_style: CurveStyle::Quadratic,
            curve_smoothing: 0.5,
            smoothing_iterations: 2,
            edge_overlay: false,
            gradient_mesh: false,
            background_gradient: false,
            highlights: false,
            mesh_grid: Self::DEFAULT_MESH_GRID,
            edge_blur_sigma: Self::DEFAULT_EDGE_BLUR_SIGMA,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            max_edge_strokes: Self::DEFAULT_MAX_EDGE_STROKES,
            pyramid_levels: 1,
        }
    }

    /// Same configuration with a fixed seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check every field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        fn invalid(msg: String) -> Result<(), PipelineError> {
            Err(PipelineError::InvalidConfiguration(msg))
        }

        if !(self.preprocess_blur_sigma.is_finite() && self.preprocess_blur_sigma >= 0.0) {
            return invalid(format!(
                "preprocess_blur_sigma must be finite and non-negative, got {}",
                self.preprocess_blur_sigma
            ));
        }
        if !(self.preprocess_contrast.is_finite() && self.preprocess_contrast > 0.0) {
            return invalid(format!(
                "preprocess_contrast must be finite and positive, got {}",
                self.preprocess_contrast
            ));
        }
        if self.palette_size == 0 || self.palette_size > Self::MAX_PALETTE_SIZE {
            return invalid(format!(
                "palette_size must be in 1..={}, got {}",
                Self::MAX_PALETTE_SIZE,
                self.palette_size
            ));
        }
        if self.palette_max_iterations == 0 {
            return invalid("palette_max_iterations must be at least 1".into());
        }
        if self.palette_sample_limit == 0 {
            return invalid("palette_sample_limit must be at least 1".into());
        }
        if !(self.palette_merge_distance.is_finite() && self.palette_merge_distance >= 0.0) {
            return invalid(format!(
                "palette_merge_distance must be finite and non-negative, got {}",
                self.palette_merge_distance
            ));
        }
        if self.max_boundary_points < 2 {
            return invalid(format!(
                "max_boundary_points must be at least 2, got {}",
                self.max_boundary_points
            ));
        }
        if !(self.adjacency_radius.is_finite() && self.adjacency_radius > 0.0) {
            return invalid(format!(
                "adjacency_radius must be finite and positive, got {}",
                self.adjacency_radius
            ));
        }
        if !(self.simplify_tolerance.is_finite() && self.simplify_tolerance >= 0.0) {
            return invalid(format!(
                "simplify_tolerance must be finite and non-negative, got {}",
                self.simplify_tolerance
            ));
        }
        if !(0.0..=1.0).contains(&self.curve_smoothing) {
            return invalid(format!(
                "curve_smoothing must be in 0.0..=1.0, got {}",
                self.curve_smoothing
            ));
        }
        if self.smoothing_iterations > Self::MAX_SMOOTHING_ITERATIONS {
            return invalid(format!(
                "smoothing_iterations must be at most {}, got {}",
                Self::MAX_SMOOTHING_ITERATIONS,
                self.smoothing_iterations
            ));
        }
        if self.mesh_grid == 0 {
            return invalid("mesh_grid must be at least 1".into());
        }
        if !(self.edge_blur_sigma.is_finite() && self.edge_blur_sigma >= 0.0) {
            return invalid(format!(
                "edge_blur_sigma must be finite and non-negative, got {}",
                self.edge_blur_sigma
            ));
        }
        if !(self.canny_low.is_finite() && self.canny_high.is_finite()) {
            return invalid("canny thresholds must be finite".into());
        }
        if self.pyramid_levels == 0 || self.pyramid_levels > Self::MAX_PYRAMID_LEVELS {
            return invalid(format!(
                "pyramid_levels must be in 1..={}, got {}",
                Self::MAX_PYRAMID_LEVELS,
                self.pyramid_levels
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        QualityPreset::default().config()
    }
}

impl From<QualityPreset> for PipelineConfig {
    fn from(preset: QualityPreset) -> Self {
        preset.config()
    }
}
