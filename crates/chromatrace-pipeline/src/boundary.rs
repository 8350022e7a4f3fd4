//! Boundary tracing: turn a region's pixel set into ordered outline rings.
//!
//! A *boundary pixel* is a region pixel with at least one 4-neighbour
//! outside the region; the image exterior counts as outside.
//!
//! # Strategy pattern
//!
//! [`BoundaryTracer`] is the pluggable algorithm and [`BoundaryTracerKind`]
//! selects one at runtime from the configuration:
//!
//! - [`NearestNeighbor`](BoundaryTracerKind::NearestNeighbor) orders the
//!   boundary pixels greedily, always stepping to the closest unvisited
//!   one. Cheap and robust, but a region made of several disconnected
//!   areas comes out as one polyline with long jumps between them (flagged
//!   as *piecewise*).
//! - [`BorderFollowing`](BoundaryTracerKind::BorderFollowing) runs
//!   Suzuki-Abe border following over the region mask and yields one ring
//!   per outer border plus one per hole.

use std::fmt;

use rstar::RTree;
use serde::{Deserialize, Serialize};

use crate::region::{Region, RegionMask};
use crate::types::{PixelCoord, Point, Polyline};

/// Selects which boundary tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryTracerKind {
    /// Greedy nearest-unvisited ordering of boundary pixels, backed by an
    /// R*-tree.
    #[default]
    NearestNeighbor,
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    BorderFollowing,
}

impl fmt::Display for BoundaryTracerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NearestNeighbor => f.write_str("NearestNeighbor"),
            Self::BorderFollowing => f.write_str("BorderFollowing"),
        }
    }
}

/// Limits applied while tracing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceLimits {
    /// Maximum number of points per ring; longer traversals are truncated.
    pub max_points: usize,
    /// Successive points farther apart than this make a ring piecewise.
    pub adjacency_radius: f64,
}

/// One closed outline of a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryRing {
    /// Boundary pixel centres in traversal order. The ring is implicitly
    /// closed (last point connects back to the first).
    pub polyline: Polyline,
    /// `true` for the border of a hole inside the region.
    pub is_hole: bool,
    /// Some successive pair is farther apart than the adjacency radius.
    pub piecewise: bool,
    /// The traversal cap was reached before every boundary pixel was
    /// visited.
    pub truncated: bool,
}

/// Every ring traced for one region.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TracedBoundary {
    /// Outer rings and hole rings.
    pub rings: Vec<BoundaryRing>,
}

impl TracedBoundary {
    /// Whether any ring hit the traversal cap.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.rings.iter().any(|r| r.truncated)
    }

    /// Whether any ring was ordered piecewise.
    #[must_use]
    pub fn piecewise(&self) -> bool {
        self.rings.iter().any(|r| r.piecewise)
    }

    /// Whether the boundary includes hole rings.
    #[must_use]
    pub fn has_holes(&self) -> bool {
        self.rings.iter().any(|r| r.is_hole)
    }

    /// Total number of points across all rings.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.rings.iter().map(|r| r.polyline.len()).sum()
    }
}

/// Trait for boundary tracing strategies.
pub trait BoundaryTracer {
    /// Trace the outline of `region`.
    fn trace(&self, region: &Region, limits: &TraceLimits) -> TracedBoundary;
}

impl BoundaryTracer for BoundaryTracerKind {
    fn trace(&self, region: &Region, limits: &TraceLimits) -> TracedBoundary {
        let mask = region.mask();
        match *self {
            Self::NearestNeighbor => trace_nearest_neighbor(region, &mask, limits),
            Self::BorderFollowing => trace_border_following(&mask, limits),
        }
    }
}

/// Region pixels with a 4-neighbour outside the region, in row-major order.
#[must_use]
pub fn boundary_pixels(region: &Region, mask: &RegionMask) -> Vec<PixelCoord> {
    region
        .pixels
        .iter()
        .copied()
        .filter(|p| {
            let (x, y) = (i64::from(p.x), i64::from(p.y));
            [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
                .into_iter()
                .any(|(nx, ny)| !mask.contains(nx, ny))
        })
        .collect()
}

fn trace_nearest_neighbor(
    region: &Region,
    mask: &RegionMask,
    limits: &TraceLimits,
) -> TracedBoundary {
    let pixels = boundary_pixels(region, mask);
    let Some((&start, rest)) = pixels.split_first() else {
        return TracedBoundary::default();
    };

    let to_key = |p: PixelCoord| [i64::from(p.x), i64::from(p.y)];
    let mut tree: RTree<[i64; 2]> = RTree::bulk_load(rest.iter().copied().map(to_key).collect());

    let max_gap_sq = limits.adjacency_radius * limits.adjacency_radius;
    let mut current = to_key(start);
    let mut ordered = vec![Point::from(start)];
    let mut piecewise = false;
    let mut truncated = false;

    while let Some(next) = tree.nearest_neighbor(&current).copied() {
        if ordered.len() >= limits.max_points {
            truncated = true;
            break;
        }
        tree.remove(&next);
        let step = key_point(next);
        if step.distance_squared(key_point(current)) > max_gap_sq {
            piecewise = true;
        }
        ordered.push(step);
        current = next;
    }

    if truncated {
        tracing::debug!(
            palette_index = region.palette_index,
            cap = limits.max_points,
            remaining = tree.size(),
            "boundary traversal truncated"
        );
    }

    TracedBoundary {
        rings: vec![BoundaryRing {
            polyline: Polyline::new(ordered),
            is_hole: false,
            piecewise,
            truncated,
        }],
    }
}

#[allow(clippy::cast_precision_loss)]
fn key_point(k: [i64; 2]) -> Point {
    Point::new(k[0] as f64, k[1] as f64)
}

/// Suzuki-Abe border following over the padded region mask.
///
/// Contour points come back in mask coordinates and are shifted by the
/// mask origin into image coordinates.
fn trace_border_following(mask: &RegionMask, limits: &TraceLimits) -> TracedBoundary {
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(&mask.image);

    let (ox, oy) = mask.origin;
    let rings = contours
        .into_iter()
        .filter(|c| !c.points.is_empty())
        .map(|c| {
            let truncated = c.points.len() > limits.max_points;
            #[allow(clippy::cast_precision_loss)]
            let points: Vec<Point> = c
                .points
                .iter()
                .take(limits.max_points)
                .map(|p| {
                    Point::new(
                        (i64::from(p.x) + ox) as f64,
                        (i64::from(p.y) + oy) as f64,
                    )
                })
                .collect();
            BoundaryRing {
                polyline: Polyline::new(points),
                is_hole: c.border_type == imageproc::contours::BorderType::Hole,
                piecewise: false,
                truncated,
            }
        })
        .collect();

    TracedBoundary { rings }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::region::Bounds;
    use crate::types::Color;

    const LIMITS: TraceLimits = TraceLimits {
        max_points: 20_000,
        adjacency_radius: 1.5,
    };

    fn region_from(pixels: Vec<PixelCoord>) -> Region {
        let mut bounds = Bounds::at(pixels[0]);
        for &p in &pixels {
            bounds.include(p);
        }
        Region {
            palette_index: 0,
            color: Color::new(255, 0, 0),
            pixels,
            bounds,
        }
    }

    fn rect(x0: u32, y0: u32, w: u32, h: u32) -> Region {
        let mut pixels = Vec::new();
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                pixels.push(PixelCoord::new(x, y));
            }
        }
        region_from(pixels)
    }

    fn is_perimeter(p: Point, x0: f64, y0: f64, x1: f64, y1: f64) -> bool {
        (p.x - x0).abs() < f64::EPSILON
            || (p.x - x1).abs() < f64::EPSILON
            || (p.y - y0).abs() < f64::EPSILON
            || (p.y - y1).abs() < f64::EPSILON
    }

    #[test]
    fn default_is_nearest_neighbor() {
        assert_eq!(
            BoundaryTracerKind::default(),
            BoundaryTracerKind::NearestNeighbor
        );
    }

    #[test]
    fn rectangle_boundary_is_its_perimeter() {
        let region = rect(5, 7, 10, 6);
        let mask = region.mask();
        let boundary = boundary_pixels(&region, &mask);
        assert_eq!(boundary.len(), 2 * 10 + 2 * 6 - 4);
    }

    #[test]
    fn nearest_neighbor_rectangle_forms_a_cycle() {
        let region = rect(5, 7, 10, 6);
        let traced = BoundaryTracerKind::NearestNeighbor.trace(&region, &LIMITS);
        assert_eq!(traced.rings.len(), 1);
        let ring = &traced.rings[0];
        assert!(!ring.piecewise && !ring.truncated && !ring.is_hole);

        let pts = ring.polyline.points();
        assert_eq!(pts.len(), 28);
        // Starts at the first boundary pixel in row-major order.
        assert_eq!(pts[0], Point::new(5.0, 7.0));
        // Exactly the perimeter, each pixel once.
        let mut unique: Vec<(i64, i64)> = pts
            .iter()
            .map(|p| {
                #[allow(clippy::cast_possible_truncation)]
                (p.x as i64, p.y as i64)
            })
            .collect();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 28);
        assert!(pts.iter().all(|&p| is_perimeter(p, 5.0, 7.0, 14.0, 12.0)));
        // Consecutive points (including last -> first) are 4-adjacent.
        for i in 0..pts.len() {
            let d = pts[i].distance(pts[(i + 1) % pts.len()]);
            assert!((d - 1.0).abs() < f64::EPSILON, "gap {d} at {i}");
        }
    }

    #[test]
    fn disjoint_areas_are_piecewise() {
        let mut pixels: Vec<PixelCoord> = rect(0, 0, 3, 3).pixels;
        pixels.extend(rect(20, 0, 3, 3).pixels);
        pixels.sort_by_key(|p| (p.y, p.x));
        let region = region_from(pixels);
        let traced = BoundaryTracerKind::NearestNeighbor.trace(&region, &LIMITS);
        assert!(traced.piecewise());
        assert_eq!(traced.point_count(), 16);
    }

    #[test]
    fn traversal_cap_truncates() {
        let region = rect(0, 0, 50, 50);
        let limits = TraceLimits {
            max_points: 10,
            ..LIMITS
        };
        let traced = BoundaryTracerKind::NearestNeighbor.trace(&region, &limits);
        assert!(traced.truncated());
        assert_eq!(traced.rings[0].polyline.len(), 10);
    }

    #[test]
    fn border_following_cap_truncates() {
        let region = rect(0, 0, 50, 50);
        let limits = TraceLimits {
            max_points: 10,
            ..LIMITS
        };
        let traced = BoundaryTracerKind::BorderFollowing.trace(&region, &limits);
        assert!(traced.truncated());
        assert_eq!(traced.rings.len(), 1);
        assert_eq!(traced.rings[0].polyline.len(), 10);
        assert!(
            traced.rings[0]
                .polyline
                .points()
                .iter()
                .all(|&p| is_perimeter(p, 0.0, 0.0, 49.0, 49.0))
        );
    }

    #[test]
    fn single_pixel_region_yields_single_point() {
        let region = region_from(vec![PixelCoord::new(4, 4)]);
        let traced = BoundaryTracerKind::NearestNeighbor.trace(&region, &LIMITS);
        assert_eq!(traced.point_count(), 1);
    }

    #[test]
    fn border_following_finds_outer_and_hole() {
        // A 10x10 square with a 4x4 hole in the middle.
        let mut pixels = Vec::new();
        for y in 0..10 {
            for x in 0..10 {
                if !((3..7).contains(&x) && (3..7).contains(&y)) {
                    pixels.push(PixelCoord::new(x, y));
                }
            }
        }
        let region = region_from(pixels);
        let traced = BoundaryTracerKind::BorderFollowing.trace(&region, &LIMITS);
        assert!(traced.has_holes());
        assert!(traced.rings.iter().any(|r| !r.is_hole));
        let mask = region.mask();
        for ring in &traced.rings {
            for p in ring.polyline.points() {
                #[allow(clippy::cast_possible_truncation)]
                let inside = mask.contains(p.x as i64, p.y as i64);
                assert!(inside, "{p:?} is not a region pixel");
            }
        }
    }

    #[test]
    fn border_following_rectangle_stays_on_perimeter() {
        let region = rect(2, 3, 8, 5);
        let traced = BoundaryTracerKind::BorderFollowing.trace(&region, &LIMITS);
        assert_eq!(traced.rings.len(), 1);
        assert!(!traced.has_holes());
        assert!(
            traced.rings[0]
                .polyline
                .points()
                .iter()
                .all(|&p| is_perimeter(p, 2.0, 3.0, 9.0, 7.0))
        );
    }
}
