//! Edge detection for the edge-overlay accent layer.
//!
//! grayscale -> Gaussian blur -> Canny -> border following -> RDP. The
//! resulting polylines are drawn as thin, faint strokes over the region
//! fills to restore some of the crispness lost to palette reduction. With
//! a [`Pyramid`], the same chain also runs on every downsampled level.

use image::GrayImage;

use crate::pyramid::Pyramid;
use crate::simplify::simplify;
use crate::types::{PipelineError, PixelBuffer, Point, Polyline};

/// Minimum allowed Canny threshold.
///
/// A low threshold of zero treats every pixel with any gradient as a
/// potential edge, producing an edge map dense enough to swamp the overlay.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Edge polylines shorter than this many points are dropped.
pub const EDGE_MIN_POINTS: usize = 8;

/// RDP tolerance applied to edge polylines, in pixels.
pub const EDGE_SIMPLIFY_TOLERANCE: f64 = 1.0;

/// Parameters for [`detect_edge_strokes`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeParams {
    /// Gaussian blur sigma; non-positive skips the blur.
    pub blur_sigma: f32,
    /// Canny low threshold.
    pub canny_low: f32,
    /// Canny high threshold.
    pub canny_high: f32,
    /// Maximum number of strokes returned (longest first).
    pub max_strokes: usize,
}

/// Luma conversion of the source buffer.
#[must_use = "returns the grayscale image"]
pub fn grayscale(buffer: &PixelBuffer) -> GrayImage {
    image::imageops::grayscale(buffer.as_rgb_image())
}

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Detect edges using the Canny algorithm.
///
/// Returns a binary image: 255 for edge pixels, 0 for non-edge. Both
/// thresholds are clamped to at least [`MIN_THRESHOLD`] and `low` is
/// clamped to at most `high`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Extract simplified edge polylines from the source image, longest first.
///
/// # Errors
///
/// Propagates [`PipelineError::InvalidConfiguration`] from simplification
/// (not reachable with the fixed tolerance used here).
pub fn detect_edge_strokes(
    buffer: &PixelBuffer,
    params: &EdgeParams,
) -> Result<Vec<Polyline>, PipelineError> {
    detect_multiscale_edge_strokes(buffer, &Pyramid::single(), params)
}

/// Extract edge polylines from the source and every pyramid level.
///
/// Polylines found on a downsampled level are scaled back into source
/// coordinates. All levels compete for the same `max_strokes` budget,
/// ranked by their length measured in source pixels.
///
/// # Errors
///
/// Same as [`detect_edge_strokes`].
pub fn detect_multiscale_edge_strokes(
    buffer: &PixelBuffer,
    pyramid: &Pyramid,
    params: &EdgeParams,
) -> Result<Vec<Polyline>, PipelineError> {
    let mut ranked = ranked_polylines(buffer, params, 1.0, 1.0)?;
    for level in pyramid.levels() {
        let sx = f64::from(buffer.width()) / f64::from(level.width());
        let sy = f64::from(buffer.height()) / f64::from(level.height());
        ranked.extend(ranked_polylines(level, params, sx, sy)?);
    }

    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.truncate(params.max_strokes);
    tracing::debug!(
        levels = pyramid.depth(),
        strokes = ranked.len(),
        "edge strokes detected"
    );
    Ok(ranked.into_iter().map(|(_, s)| s).collect())
}

/// Simplified contours of one image, scaled by `(sx, sy)`, each paired with
/// its scaled contour length.
#[allow(clippy::cast_precision_loss)]
fn ranked_polylines(
    image: &PixelBuffer,
    params: &EdgeParams,
    sx: f64,
    sy: f64,
) -> Result<Vec<(f64, Polyline)>, PipelineError> {
    let gray = grayscale(image);
    let blurred = gaussian_blur(&gray, params.blur_sigma);
    let edges = canny(&blurred, params.canny_low, params.canny_high);

    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(&edges);

    let mut strokes = Vec::new();
    for contour in contours {
        if contour.points.len() < EDGE_MIN_POINTS {
            continue;
        }
        let polyline: Polyline = contour
            .points
            .iter()
            .map(|p| Point::new(f64::from(p.x) * sx, f64::from(p.y) * sy))
            .collect();
        let simplified = simplify(&polyline, EDGE_SIMPLIFY_TOLERANCE * sx.max(sy))?;
        if simplified.len() >= 2 {
            strokes.push((contour.points.len() as f64 * sx.max(sy), simplified));
        }
    }
    Ok(strokes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Color;

    const PARAMS: EdgeParams = EdgeParams {
        blur_sigma: 1.4,
        canny_low: 50.0,
        canny_high: 150.0,
        max_strokes: 100,
    };

    /// 40x40 black with a white 20x20 square in the middle.
    fn square_image() -> PixelBuffer {
        PixelBuffer::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) {
                Color::WHITE
            } else {
                Color::BLACK
            }
        })
        .unwrap()
    }

    #[test]
    fn uniform_image_has_no_strokes() {
        let buf = PixelBuffer::from_fn(20, 20, |_, _| Color::new(128, 128, 128)).unwrap();
        assert!(detect_edge_strokes(&buf, &PARAMS).unwrap().is_empty());
    }

    #[test]
    fn square_produces_strokes_near_its_outline() {
        let strokes = detect_edge_strokes(&square_image(), &PARAMS).unwrap();
        assert!(!strokes.is_empty());
        for s in &strokes {
            for p in s.points() {
                let near_x = (p.x - 10.0).abs() <= 3.0 || (p.x - 29.0).abs() <= 3.0;
                let near_y = (p.y - 10.0).abs() <= 3.0 || (p.y - 29.0).abs() <= 3.0;
                assert!(near_x || near_y, "stroke point {p:?} far from the square");
            }
        }
    }

    #[test]
    fn stroke_count_is_capped() {
        let params = EdgeParams {
            max_strokes: 1,
            ..PARAMS
        };
        assert!(detect_edge_strokes(&square_image(), &params).unwrap().len() <= 1);
    }

    #[test]
    fn zero_sigma_returns_identical_image() {
        let gray = grayscale(&square_image());
        assert_eq!(gaussian_blur(&gray, 0.0), gray);
    }

    #[test]
    fn low_above_high_is_clamped() {
        let gray = grayscale(&square_image());
        assert_eq!(canny(&gray, 200.0, 100.0), canny(&gray, 100.0, 100.0));
    }

    #[test]
    fn zero_low_threshold_is_clamped_to_min() {
        let gray = grayscale(&square_image());
        assert_eq!(canny(&gray, 0.0, 150.0), canny(&gray, MIN_THRESHOLD, 150.0));
    }

    #[test]
    fn pyramid_levels_map_back_to_source_coordinates() {
        // 96x96 black with a white 48x48 square.
        let buffer = PixelBuffer::from_fn(96, 96, |x, y| {
            if (24..72).contains(&x) && (24..72).contains(&y) {
                Color::WHITE
            } else {
                Color::BLACK
            }
        })
        .unwrap();
        let single = detect_edge_strokes(&buffer, &PARAMS).unwrap();
        let pyramid = Pyramid::build(&buffer, 3).unwrap();
        assert_eq!(pyramid.depth(), 3);
        let multi = detect_multiscale_edge_strokes(&buffer, &pyramid, &PARAMS).unwrap();

        assert!(multi.len() > single.len());
        for s in &multi {
            for p in s.points() {
                let near_x = (p.x - 24.0).abs() <= 10.0 || (p.x - 71.0).abs() <= 10.0;
                let near_y = (p.y - 24.0).abs() <= 10.0 || (p.y - 71.0).abs() <= 10.0;
                assert!(near_x || near_y, "stroke point {p:?} far from the square");
            }
        }
    }

    #[test]
    fn pyramid_strokes_share_the_cap() {
        let params = EdgeParams {
            max_strokes: 2,
            ..PARAMS
        };
        let buffer = square_image();
        let pyramid = Pyramid::build(&buffer, 2).unwrap();
        assert!(
            detect_multiscale_edge_strokes(&buffer, &pyramid, &params)
                .unwrap()
                .len()
                <= 2
        );
    }
}
