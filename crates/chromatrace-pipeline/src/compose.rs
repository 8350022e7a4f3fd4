//! Composition: assemble fitted regions and accent layers into a document.
//!
//! Layer order is fixed: background, region fills (largest area first),
//! gradient mesh, edge overlay, highlights. The canvas always matches the
//! source dimensions.
//!
//! The accent layers read [`AccentGuides`] built once per run: a tonal map
//! for highlights and a Gaussian pyramid for multi-scale edges.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::curve::CurvePath;
use crate::edge::{EdgeParams, detect_multiscale_edge_strokes};
use crate::pyramid::Pyramid;
use crate::quantize::Palette;
use crate::report::ConversionReport;
use crate::tonal::TonalMap;
use crate::types::{Color, Dimensions, PipelineError, PixelBuffer, Point, Polyline};

/// Opacity of every gradient-mesh cell.
pub const MESH_OPACITY: f64 = 0.6;

/// Edge-overlay stroke color.
pub const EDGE_STROKE_COLOR: Color = Color::BLACK;
/// Edge-overlay stroke width in pixels.
pub const EDGE_STROKE_WIDTH: f64 = 0.5;
/// Edge-overlay stroke opacity.
pub const EDGE_STROKE_OPACITY: f64 = 0.15;

/// Spacing of the highlight sampling grid in pixels.
pub const HIGHLIGHT_STEP: usize = 20;
/// Highlight ellipse horizontal radius.
pub const HIGHLIGHT_RX: f64 = 10.0;
/// Highlight ellipse vertical radius.
pub const HIGHLIGHT_RY: f64 = 8.0;
/// Highlight ellipse opacity.
pub const HIGHLIGHT_OPACITY: f64 = 0.1;

/// How the canvas is filled beneath the regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Background {
    /// One flat color.
    Solid(Color),
    /// Radial gradient, center to edge, with evenly spaced stops.
    RadialGradient(Vec<Color>),
}

/// One gradient-mesh cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshPatch {
    /// Left edge of the cell.
    pub x: u32,
    /// Top edge of the cell.
    pub y: u32,
    /// Cell width in pixels.
    pub width: u32,
    /// Cell height in pixels.
    pub height: u32,
    /// Average color of the cell's pixels.
    pub color: Color,
    /// Fill opacity, always [`MESH_OPACITY`].
    pub opacity: f64,
}

/// An open stroke-only polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Points in source pixel coordinates.
    pub polyline: Polyline,
    /// Stroke color.
    pub color: Color,
    /// Stroke width in pixels.
    pub width: f64,
    /// Stroke opacity in `[0, 1]`.
    pub opacity: f64,
}

/// A soft elliptical highlight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    /// Ellipse center, on the sampling grid.
    pub center: Point,
    /// Horizontal radius.
    pub rx: f64,
    /// Vertical radius.
    pub ry: f64,
    /// Fill color.
    pub color: Color,
    /// Fill opacity in `[0, 1]`.
    pub opacity: f64,
}

/// The finished vector drawing. Immutable once composed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    /// Canvas size, equal to the source image size.
    pub dimensions: Dimensions,
    /// What sits beneath every other layer.
    pub background: Background,
    /// Region fills, largest area first.
    pub regions: Vec<CurvePath>,
    /// Gradient-mesh cells (empty unless enabled).
    pub mesh: Vec<MeshPatch>,
    /// Edge-overlay strokes (empty unless enabled).
    pub edges: Vec<Stroke>,
    /// Highlight accents (empty unless enabled).
    pub highlights: Vec<Highlight>,
    /// What had to be approximated or dropped along the way.
    pub report: ConversionReport,
}

impl VectorDocument {
    /// Total number of drawable elements across all layers, background
    /// included.
    #[must_use]
    pub fn element_count(&self) -> usize {
        1 + self.regions.len() + self.mesh.len() + self.edges.len() + self.highlights.len()
    }
}

/// Assembles the final [`VectorDocument`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorComposer {
    /// Radial gradient background instead of a solid fill.
    pub background_gradient: bool,
    /// Emit the gradient-mesh layer.
    pub gradient_mesh: bool,
    /// Mesh cells along each axis.
    pub mesh_grid: u32,
    /// Emit the edge-overlay layer.
    pub edge_overlay: bool,
    /// Edge detection settings for the overlay.
    pub edge_params: EdgeParams,
    /// Emit the highlight layer.
    pub highlights: bool,
}

/// Per-run analyses of the source that the accent layers sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccentGuides {
    /// Tonal ranges of the source; built when highlights are enabled.
    pub tonal: Option<TonalMap>,
    /// Downsampled source levels for the edge overlay.
    pub pyramid: Pyramid,
}

impl AccentGuides {
    /// Build whatever the enabled accent layers of `config` will read.
    ///
    /// # Errors
    ///
    /// Propagates pyramid construction errors.
    pub fn build(buffer: &PixelBuffer, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let tonal = config.highlights.then(|| TonalMap::new(buffer));
        let pyramid = if config.edge_overlay {
            Pyramid::build(buffer, config.pyramid_levels)?
        } else {
            Pyramid::single()
        };
        Ok(Self { tonal, pyramid })
    }
}

impl VectorComposer {
    /// Take the layer switches from a pipeline configuration.
    #[must_use]
    pub const fn from_config(config: &PipelineConfig) -> Self {
        Self {
            background_gradient: config.background_gradient,
            gradient_mesh: config.gradient_mesh,
            mesh_grid: config.mesh_grid,
            edge_overlay: config.edge_overlay,
            edge_params: EdgeParams {
                blur_sigma: config.edge_blur_sigma,
                canny_low: config.canny_low,
                canny_high: config.canny_high,
                max_strokes: config.max_edge_strokes,
            },
            highlights: config.highlights,
        }
    }

    /// Build the document.
    ///
    /// `regions` may arrive in any order; they are stably sorted by
    /// descending area so larger shapes sit underneath smaller ones. A
    /// missing tonal map is built on the spot when highlights are on.
    ///
    /// # Errors
    ///
    /// Propagates errors from edge detection.
    pub fn compose(
        &self,
        buffer: &PixelBuffer,
        palette: &Palette,
        mut regions: Vec<CurvePath>,
        guides: &AccentGuides,
        report: ConversionReport,
    ) -> Result<VectorDocument, PipelineError> {
        regions.sort_by(|a, b| b.area.cmp(&a.area));

        let edges = if self.edge_overlay {
            edge_strokes(buffer, &guides.pyramid, &self.edge_params)?
        } else {
            Vec::new()
        };
        let highlights = match (self.highlights, &guides.tonal) {
            (false, _) => Vec::new(),
            (true, Some(tonal)) => highlights(buffer, tonal),
            (true, None) => highlights(buffer, &TonalMap::new(buffer)),
        };

        let document = VectorDocument {
            dimensions: buffer.dimensions(),
            background: self.background(palette),
            regions,
            mesh: if self.gradient_mesh {
                mesh_patches(buffer, self.mesh_grid)
            } else {
                Vec::new()
            },
            edges,
            highlights,
            report,
        };

        tracing::debug!(
            regions = document.regions.len(),
            mesh = document.mesh.len(),
            edges = document.edges.len(),
            highlights = document.highlights.len(),
            "document composed"
        );
        Ok(document)
    }

    /// Background for the given palette.
    #[must_use]
    pub fn background(&self, palette: &Palette) -> Background {
        if self.background_gradient {
            let stops = palette.darkest(3);
            if !stops.is_empty() {
                return Background::RadialGradient(stops);
            }
        }
        Background::Solid(palette.dominant().unwrap_or(Color::WHITE))
    }
}

/// Split the image into a `grid x grid` set of cells and average each one.
///
/// Cells that would be empty (images narrower or shorter than the grid)
/// are omitted.
#[must_use]
pub fn mesh_patches(buffer: &PixelBuffer, grid: u32) -> Vec<MeshPatch> {
    let (w, h) = (buffer.width(), buffer.height());
    let grid = grid.max(1);
    let edges = |len: u32, i: u32| -> u32 {
        u32::try_from(u64::from(len) * u64::from(i) / u64::from(grid)).unwrap_or(len)
    };

    let mut patches = Vec::new();
    for gy in 0..grid {
        let (y0, y1) = (edges(h, gy), edges(h, gy + 1));
        if y1 == y0 {
            continue;
        }
        for gx in 0..grid {
            let (x0, x1) = (edges(w, gx), edges(w, gx + 1));
            if x1 == x0 {
                continue;
            }
            patches.push(MeshPatch {
                x: x0,
                y: y0,
                width: x1 - x0,
                height: y1 - y0,
                color: average_color(buffer, x0..x1, y0..y1),
                opacity: MESH_OPACITY,
            });
        }
    }
    patches
}

fn average_color(buffer: &PixelBuffer, xs: Range<u32>, ys: Range<u32>) -> Color {
    let mut sum = [0_u64; 3];
    let mut n = 0_u64;
    for y in ys {
        for x in xs.clone() {
            let c = buffer.pixel(x, y);
            sum[0] += u64::from(c.r);
            sum[1] += u64::from(c.g);
            sum[2] += u64::from(c.b);
            n += 1;
        }
    }
    if n == 0 {
        return Color::BLACK;
    }
    let channel = |s: u64| u8::try_from((s + n / 2) / n).unwrap_or(u8::MAX);
    Color::new(channel(sum[0]), channel(sum[1]), channel(sum[2]))
}

/// Highlights on a [`HIGHLIGHT_STEP`] grid wherever the sampled pixel is
/// a highlight accent according to `tonal`.
#[must_use]
pub fn highlights(buffer: &PixelBuffer, tonal: &TonalMap) -> Vec<Highlight> {
    let mut out = Vec::new();
    for y in (0..buffer.height()).step_by(HIGHLIGHT_STEP) {
        for x in (0..buffer.width()).step_by(HIGHLIGHT_STEP) {
            if tonal.is_accent(buffer, x, y) {
                out.push(Highlight {
                    center: Point::new(f64::from(x), f64::from(y)),
                    rx: HIGHLIGHT_RX,
                    ry: HIGHLIGHT_RY,
                    color: Color::WHITE,
                    opacity: HIGHLIGHT_OPACITY,
                });
            }
        }
    }
    out
}

/// Edge-overlay strokes for the source image and its pyramid levels.
///
/// # Errors
///
/// Propagates errors from edge detection.
pub fn edge_strokes(
    buffer: &PixelBuffer,
    pyramid: &Pyramid,
    params: &EdgeParams,
) -> Result<Vec<Stroke>, PipelineError> {
    Ok(detect_multiscale_edge_strokes(buffer, pyramid, params)?
        .into_iter()
        .map(|polyline| Stroke {
            polyline,
            color: EDGE_STROKE_COLOR,
            width: EDGE_STROKE_WIDTH,
            opacity: EDGE_STROKE_OPACITY,
        })
        .collect())
}
