//! Per-region vectorization: trace -> simplify -> fit.
//!
//! Regions are independent, so the three steps run as one task per
//! region on the `rayon` pool. The indexed parallel iterator collects
//! results in region order regardless of which task finishes first.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::boundary::{BoundaryTracer, TraceLimits};
use crate::config::PipelineConfig;
use crate::curve::{CurveFitter, CurvePath, SimplifiedRing};
use crate::region::Region;
use crate::report::{ConversionReport, DegradationKind};
use crate::simplify::simplify;
use crate::types::PipelineError;

/// The result of vectorizing one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionOutcome {
    /// Position of the region in extraction order.
    pub region_index: usize,
    /// Palette index of the region.
    pub palette_index: usize,
    /// The fitted path, or `None` if the geometry was degenerate.
    pub path: Option<CurvePath>,
    /// Number of traced rings.
    pub ring_count: usize,
    /// Boundary points before simplification.
    pub traced_points: usize,
    /// Boundary points after simplification.
    pub simplified_points: usize,
    /// Boundary traversal hit its cap.
    pub truncated: bool,
    /// Boundary was ordered piecewise.
    pub piecewise: bool,
}

/// Vectorize every region in parallel, returning outcomes in region order.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfiguration`] if the simplification
/// tolerance is negative.
pub fn vectorize_regions(
    regions: &[Region],
    config: &PipelineConfig,
) -> Result<Vec<RegionOutcome>, PipelineError> {
    let limits = TraceLimits {
        max_points: config.max_boundary_points,
        adjacency_radius: config.adjacency_radius,
    };
    let fitter = CurveFitter::from_config(config);
    let tracer = config.boundary_tracer;
    let tolerance = config.simplify_tolerance;

    regions
        .par_iter()
        .enumerate()
        .map(|(index, region)| {
            vectorize_region(index, region, &tracer, &limits, tolerance, &fitter)
        })
        .collect()
}

/// Trace, simplify, and fit a single region.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfiguration`] if `tolerance` is
/// negative.
pub fn vectorize_region<T: BoundaryTracer + ?Sized>(
    region_index: usize,
    region: &Region,
    tracer: &T,
    limits: &TraceLimits,
    tolerance: f64,
    fitter: &CurveFitter,
) -> Result<RegionOutcome, PipelineError> {
    let traced = tracer.trace(region, limits);
    let rings = traced
        .rings
        .iter()
        .map(|ring| {
            Ok(SimplifiedRing {
                polyline: simplify(&ring.polyline, tolerance)?,
                is_hole: ring.is_hole,
            })
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;

    let simplified_points = rings.iter().map(|r| r.polyline.len()).sum();
    let path = fitter.fit(&rings, region.color, region.pixel_count());

    Ok(RegionOutcome {
        region_index,
        palette_index: region.palette_index,
        path,
        ring_count: traced.rings.len(),
        traced_points: traced.point_count(),
        simplified_points,
        truncated: traced.truncated(),
        piecewise: traced.piecewise(),
    })
}

/// Fold per-region outcomes into the conversion report.
pub fn record_outcomes(report: &mut ConversionReport, outcomes: &[RegionOutcome]) {
    for o in outcomes {
        let mut record = |kind| report.record_region(o.region_index, o.palette_index, kind);
        if o.truncated {
            record(DegradationKind::TraversalTruncated);
        }
        if o.piecewise {
            record(DegradationKind::PiecewiseOrdering);
        }
        if o.path.is_some() {
            report.regions_drawn += 1;
        } else {
            tracing::debug!(
                region = o.region_index,
                palette_index = o.palette_index,
                "degenerate region skipped"
            );
            report.record_region(
                o.region_index,
                o.palette_index,
                DegradationKind::DegenerateGeometry,
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryTracerKind;
    use crate::region::Bounds;
    use crate::types::{Color, PixelCoord};

    fn rect(palette_index: usize, x0: u32, y0: u32, w: u32, h: u32) -> Region {
        let pixels: Vec<PixelCoord> = (y0..y0 + h)
            .flat_map(|y| (x0..x0 + w).map(move |x| PixelCoord::new(x, y)))
            .collect();
        Region {
            palette_index,
            color: Color::new(200, 30, 30),
            bounds: Bounds {
                min_x: x0,
                min_y: y0,
                max_x: x0 + w - 1,
                max_y: y0 + h - 1,
            },
            pixels,
        }
    }

    #[test]
    fn outcomes_keep_region_order() {
        let regions: Vec<Region> = (0..16)
            .map(|i| rect(i, i as u32 * 3, 0, 2 + i as u32, 20))
            .collect();
        let outcomes = vectorize_regions(&regions, &PipelineConfig::default()).unwrap();
        assert_eq!(outcomes.len(), 16);
        for (i, o) in outcomes.iter().enumerate() {
            assert_eq!(o.region_index, i);
            assert_eq!(o.palette_index, i);
        }
    }

    #[test]
    fn simplification_reduces_points() {
        let outcomes =
            vectorize_regions(&[rect(0, 0, 0, 30, 30)], &PipelineConfig::default()).unwrap();
        let o = &outcomes[0];
        assert_eq!(o.traced_points, 116);
        assert!(o.simplified_points < o.traced_points);
        assert!(o.path.is_some());
    }

    #[test]
    fn single_pixel_region_is_skipped_not_fatal() {
        let outcomes =
            vectorize_regions(&[rect(2, 5, 5, 1, 1)], &PipelineConfig::default()).unwrap();
        assert!(outcomes[0].path.is_none());

        let mut report = ConversionReport::default();
        record_outcomes(&mut report, &outcomes);
        assert_eq!(report.regions_skipped, 1);
        assert_eq!(report.regions_drawn, 0);
        assert_eq!(report.degradations[0].kind, DegradationKind::DegenerateGeometry);
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let config = PipelineConfig {
            simplify_tolerance: -1.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            vectorize_regions(&[rect(0, 0, 0, 4, 4)], &config),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn border_following_tracer_is_pluggable() {
        let limits = TraceLimits {
            max_points: 1000,
            adjacency_radius: 1.5,
        };
        let fitter = CurveFitter::from_config(&PipelineConfig::default());
        let o = vectorize_region(
            0,
            &rect(0, 2, 2, 10, 10),
            &BoundaryTracerKind::BorderFollowing,
            &limits,
            1.0,
            &fitter,
        )
        .unwrap();
        assert_eq!(o.ring_count, 1);
        assert!(!o.piecewise);
        assert!(o.path.is_some());
    }

    #[test]
    fn border_following_truncation_reaches_the_report() {
        let config = PipelineConfig {
            boundary_tracer: BoundaryTracerKind::BorderFollowing,
            max_boundary_points: 10,
            ..PipelineConfig::default()
        };
        let outcomes = vectorize_regions(&[rect(4, 0, 0, 50, 50)], &config).unwrap();
        assert!(outcomes[0].truncated);
        assert_eq!(outcomes[0].traced_points, 10);

        let mut report = ConversionReport::default();
        record_outcomes(&mut report, &outcomes);
        assert_eq!(report.regions_truncated, 1);
        assert!(report.degradations.iter().any(|d| {
            d.kind == DegradationKind::TraversalTruncated && d.palette_index == Some(4)
        }));
    }
}
