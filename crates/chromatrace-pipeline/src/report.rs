//! Recoverable per-conversion issues.
//!
//! Degenerate geometry and exhausted budgets never abort a conversion.
//! They are handled where they occur and recorded here so callers can see
//! what was approximated or left out.

use serde::{Deserialize, Serialize};

/// What went wrong, and how it was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradationKind {
    /// The region's boundary collapsed below two points after
    /// simplification; the region was left out of the drawing.
    DegenerateGeometry,
    /// Boundary traversal hit its point cap; the partial outline was
    /// closed and drawn.
    TraversalTruncated,
    /// The region consists of several disconnected areas and was ordered
    /// as one polyline with long jumps.
    PiecewiseOrdering,
    /// Palette clustering hit its iteration cap; the best palette so far
    /// was used.
    PaletteNotConverged,
}

/// One recorded degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    /// Position of the region in extraction order, when region-specific.
    pub region_index: Option<usize>,
    /// Palette index of the region, when region-specific.
    pub palette_index: Option<usize>,
    /// What happened.
    pub kind: DegradationKind,
}

/// Summary of everything recovered during one conversion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Regions that produced a filled path.
    pub regions_drawn: usize,
    /// Regions left out because their geometry was degenerate.
    pub regions_skipped: usize,
    /// Regions whose boundary traversal was truncated.
    pub regions_truncated: usize,
    /// Regions ordered piecewise.
    pub regions_piecewise: usize,
    /// Color groups discarded as noise before tracing.
    pub noise_groups_discarded: usize,
    /// Pixels in those groups.
    pub noise_pixels_discarded: usize,
    /// Whether palette clustering converged.
    pub palette_converged: bool,
    /// Every individual degradation, in region order.
    pub degradations: Vec<Degradation>,
}

impl ConversionReport {
    /// Record a region-specific degradation and bump its counter.
    pub fn record_region(
        &mut self,
        region_index: usize,
        palette_index: usize,
        kind: DegradationKind,
    ) {
        match kind {
            DegradationKind::DegenerateGeometry => self.regions_skipped += 1,
            DegradationKind::TraversalTruncated => self.regions_truncated += 1,
            DegradationKind::PiecewiseOrdering => self.regions_piecewise += 1,
            DegradationKind::PaletteNotConverged => {}
        }
        self.degradations.push(Degradation {
            region_index: Some(region_index),
            palette_index: Some(palette_index),
            kind,
        });
    }

    /// Record that palette clustering stopped at its iteration cap.
    pub fn record_palette_not_converged(&mut self) {
        self.palette_converged = false;
        self.degradations.push(Degradation {
            region_index: None,
            palette_index: None,
            kind: DegradationKind::PaletteNotConverged,
        });
    }

    /// `true` when nothing had to be approximated or dropped (noise
    /// discarding is expected and does not count).
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.degradations.is_empty()
    }
}
