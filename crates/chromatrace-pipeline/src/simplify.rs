//! Polyline simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Reduces point count by removing points that lie within a tolerance of
//! the line through their enclosing retained points. The result is always
//! a subsequence of the input that keeps both endpoints, and for a fixed
//! tolerance running it twice changes nothing.

use crate::types::{PipelineError, Point, Polyline};

/// Simplify a single polyline using the Ramer-Douglas-Peucker algorithm.
///
/// Points within `tolerance` pixels of the line between their enclosing
/// retained points are removed. A tolerance of 0.0 removes only exactly
/// collinear points. Polylines with fewer than 3 points are returned
/// unchanged.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfiguration`] if `tolerance` is
/// negative or NaN.
pub fn simplify(polyline: &Polyline, tolerance: f64) -> Result<Polyline, PipelineError> {
    if tolerance.is_nan() || tolerance < 0.0 {
        return Err(PipelineError::InvalidConfiguration(format!(
            "simplification tolerance must be non-negative, got {tolerance}"
        )));
    }

    let points = polyline.points();
    if points.len() < 3 {
        return Ok(polyline.clone());
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    Ok(points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect())
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line through them. If that distance exceeds `tolerance`, the point is
/// kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
#[must_use]
pub fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
