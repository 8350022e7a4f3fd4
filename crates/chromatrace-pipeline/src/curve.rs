//! Curve fitting: turn simplified boundary rings into smooth draw commands.
//!
//! Every ring is treated as closed. Before fitting, the vertex loop is
//! relaxed with a few passes of strength-weighted Laplacian smoothing.
//! Two fitting styles are available:
//!
//! - **Quadratic** corner cutting. The curve enters each vertex's corner
//!   part-way along the incoming edge, bends around it with a quadratic
//!   Bézier whose control point is the vertex itself, and leaves part-way
//!   along the outgoing edge. Nearly straight vertices emit plain lines.
//! - **B-spline**. The vertices become control points of a closed uniform
//!   cubic B-spline, emitted exactly as one cubic Bézier per span.
//!
//! Strength 0 bypasses both and draws straight segments through every
//! vertex.

use serde::{Deserialize, Serialize};

use crate::config::{CurveStyle, PipelineConfig};
use crate::types::{Color, Point, Polyline};

/// Fill opacity used for very light region colors.
pub const LIGHT_FILL_OPACITY: f64 = 0.9;

/// Relative luminance at or above which a fill counts as very light.
pub const LIGHT_LUMINANCE_THRESHOLD: f64 = 0.85;

/// Rings need more than this many points to be fitted with a B-spline.
pub const MIN_SPLINE_POINTS: usize = 4;

/// Sine of the turning angle below which a vertex is considered straight.
const STRAIGHT_SINE: f64 = 0.02;

/// One drawing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCommand {
    /// Start a new subpath.
    MoveTo(Point),
    /// Straight line to a point.
    LineTo(Point),
    /// Quadratic Bézier.
    QuadTo {
        /// Control point.
        ctrl: Point,
        /// End point.
        to: Point,
    },
    /// Cubic Bézier.
    CubicTo {
        /// First control point.
        ctrl1: Point,
        /// Second control point.
        ctrl2: Point,
        /// End point.
        to: Point,
    },
    /// Close the current subpath.
    Close,
}

/// How overlapping subpaths decide what is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FillRule {
    /// SVG `nonzero`.
    #[default]
    NonZero,
    /// SVG `evenodd`: hole rings cut through their outer ring.
    EvenOdd,
}

/// A filled, closed shape for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePath {
    /// Draw commands; every subpath starts with `MoveTo` and ends with
    /// `Close`.
    pub commands: Vec<PathCommand>,
    /// Fill color.
    pub fill: Color,
    /// Fill opacity in `[0, 1]`.
    pub opacity: f64,
    /// Fill rule.
    pub fill_rule: FillRule,
    /// Pixel area of the source region (used for layer ordering).
    pub area: usize,
}

impl CurvePath {
    /// Number of subpaths.
    #[must_use]
    pub fn subpath_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PathCommand::MoveTo(_)))
            .count()
    }
}

/// A simplified ring ready for fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifiedRing {
    /// Ring vertices (implicitly closed).
    pub polyline: Polyline,
    /// Whether the ring borders a hole.
    pub is_hole: bool,
}

/// Fits smooth closed curves through simplified rings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveFitter {
    /// Smoothing strength in `[0, 1]`.
    pub strength: f64,
    /// Laplacian relaxation passes.
    pub iterations: u32,
    /// Fitting style.
    pub style: CurveStyle,
}

impl CurveFitter {
    /// Take the curve parameters from a pipeline configuration.
    #[must_use]
    pub const fn from_config(config: &PipelineConfig) -> Self {
        Self {
            strength: config.curve_smoothing,
            iterations: config.smoothing_iterations,
            style: config.curve_style,
        }
    }

    /// Fit every usable ring of a region into one filled path.
    ///
    /// Rings with fewer than 2 points are dropped. Returns `None` when no
    /// ring survives, which the caller records as degenerate geometry.
    #[must_use]
    pub fn fit(&self, rings: &[SimplifiedRing], fill: Color, area: usize) -> Option<CurvePath> {
        let mut commands = Vec::new();
        let mut has_hole = false;
        for ring in rings {
            let points = ring.polyline.points();
            if points.len() < 2 {
                continue;
            }
            commands.extend(self.fit_ring(points));
            has_hole |= ring.is_hole;
        }
        if commands.is_empty() {
            return None;
        }

        Some(CurvePath {
            commands,
            fill,
            opacity: fill_opacity(fill),
            fill_rule: if has_hole {
                FillRule::EvenOdd
            } else {
                FillRule::NonZero
            },
            area,
        })
    }

    /// Draw commands for one closed ring of at least 2 points.
    #[must_use]
    pub fn fit_ring(&self, points: &[Point]) -> Vec<PathCommand> {
        if self.strength <= 0.0 || points.len() < 3 {
            return straight(points);
        }
        let relaxed = relax(points, self.strength, self.iterations);
        match self.style {
            CurveStyle::BSpline if relaxed.len() > MIN_SPLINE_POINTS => bspline(&relaxed),
            CurveStyle::Quadratic | CurveStyle::BSpline => corner_cut(&relaxed, self.strength),
        }
    }
}

/// Opacity for a fill color: slightly transparent when very light.
#[must_use]
pub fn fill_opacity(fill: Color) -> f64 {
    if fill.relative_luminance() >= LIGHT_LUMINANCE_THRESHOLD {
        LIGHT_FILL_OPACITY
    } else {
        1.0
    }
}

fn straight(points: &[Point]) -> Vec<PathCommand> {
    let mut commands = Vec::with_capacity(points.len() + 1);
    if let Some((&first, rest)) = points.split_first() {
        commands.push(PathCommand::MoveTo(first));
        commands.extend(rest.iter().map(|&p| PathCommand::LineTo(p)));
        commands.push(PathCommand::Close);
    }
    commands
}

/// Laplacian smoothing on a closed loop: each pass moves every point
/// `strength` of the way toward the mean of itself and its two neighbours.
#[must_use]
pub fn relax(points: &[Point], strength: f64, iterations: u32) -> Vec<Point> {
    let n = points.len();
    let mut current = points.to_vec();
    if n < 3 {
        return current;
    }
    for _ in 0..iterations {
        current = (0..n)
            .map(|i| {
                let prev = current[(i + n - 1) % n];
                let p = current[i];
                let next = current[(i + 1) % n];
                let mean = Point::new((prev.x + p.x + next.x) / 3.0, (prev.y + p.y + next.y) / 3.0);
                p.lerp(mean, strength)
            })
            .collect();
    }
    current
}

fn is_straight(prev: Point, p: Point, next: Point) -> bool {
    let (ux, uy) = (p.x - prev.x, p.y - prev.y);
    let (vx, vy) = (next.x - p.x, next.y - p.y);
    let lengths = ux.hypot(uy) * vx.hypot(vy);
    if lengths == 0.0 {
        return true;
    }
    let cross = ux.mul_add(vy, -(uy * vx));
    let dot = ux.mul_add(vx, uy * vy);
    dot > 0.0 && cross.abs() / lengths < STRAIGHT_SINE
}

/// Quadratic corner cutting around every vertex of a closed loop.
fn corner_cut(points: &[Point], strength: f64) -> Vec<PathCommand> {
    let n = points.len();
    let cut = strength / 2.0;
    let entry = |i: usize| points[i].lerp(points[(i + n - 1) % n], cut);
    let exit = |i: usize| points[i].lerp(points[(i + 1) % n], cut);

    let mut commands = Vec::with_capacity(2 * n + 2);
    let start = exit(0);
    commands.push(PathCommand::MoveTo(start));
    let mut pen = start;
    for step in 1..=n {
        let i = step % n;
        let (a, b) = (entry(i), exit(i));
        if a.distance_squared(pen) > f64::EPSILON {
            commands.push(PathCommand::LineTo(a));
        }
        let prev = points[(i + n - 1) % n];
        let next = points[(i + 1) % n];
        if is_straight(prev, points[i], next) {
            commands.push(PathCommand::LineTo(b));
        } else {
            commands.push(PathCommand::QuadTo {
                ctrl: points[i],
                to: b,
            });
        }
        pen = b;
    }
    commands.push(PathCommand::Close);
    commands
}

/// Closed uniform cubic B-spline through `points` as control points,
/// converted span by span into cubic Béziers.
fn bspline(points: &[Point]) -> Vec<PathCommand> {
    let n = points.len();
    let at = |i: usize| points[i % n];
    let knot = |i: usize| {
        let (a, b, c) = (at(i + n - 1), at(i), at(i + 1));
        Point::new(
            b.x.mul_add(4.0, a.x + c.x) / 6.0,
            b.y.mul_add(4.0, a.y + c.y) / 6.0,
        )
    };

    let mut commands = Vec::with_capacity(n + 2);
    commands.push(PathCommand::MoveTo(knot(0)));
    for i in 0..n {
        let (p, q) = (at(i), at(i + 1));
        commands.push(PathCommand::CubicTo {
            ctrl1: p.lerp(q, 1.0 / 3.0),
            ctrl2: p.lerp(q, 2.0 / 3.0),
            to: knot(i + 1),
        });
    }
    commands.push(PathCommand::Close);
    commands
}
