//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for preset
//! tuning and parameter experimentation. The caller supplies the time
//! source through [`Clock`] so the core stays free of platform clocks.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compose::VectorDocument;
use crate::config::PipelineConfig;
use crate::pipeline::{Pipeline, PipelineStage};
use crate::tonal::ToneCounts;
use crate::types::{PipelineError, PixelBuffer};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Time source used to measure stage durations.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: input and configuration validation.
    pub validate: StageDiagnostics,
    /// Stage 2: enhancement and accent guides.
    pub preprocess: StageDiagnostics,
    /// Stage 3: palette reduction.
    pub palette: StageDiagnostics,
    /// Stage 4: region extraction.
    pub regions: StageDiagnostics,
    /// Stage 5: boundary tracing, simplification, and curve fitting.
    pub vectorize: StageDiagnostics,
    /// Stage 6: document composition.
    pub compose: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Validation metrics.
    Validate {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Total pixel count.
        pixel_count: u64,
        /// Preset the configuration was expanded from.
        preset: String,
    },
    /// Preprocessing metrics.
    Preprocess {
        /// Whether an enhanced copy fed palette reduction.
        enhanced: bool,
        /// Edge pyramid depth, counting the source.
        pyramid_depth: usize,
        /// Pixels per tonal range, when a tonal map was built.
        tones: Option<ToneCounts>,
    },
    /// Palette reduction metrics.
    Palette {
        /// Requested maximum palette size.
        requested: usize,
        /// Colors in the final palette.
        colors: usize,
        /// Color space used for clustering.
        color_space: String,
        /// Lloyd iterations run.
        iterations: u32,
        /// Whether clustering converged before the cap.
        converged: bool,
    },
    /// Region extraction metrics.
    Regions {
        /// Regions kept.
        region_count: usize,
        /// Pixels in the largest region.
        largest_region_pixels: usize,
        /// Color groups discarded as noise.
        discarded_groups: usize,
        /// Pixels in discarded groups.
        discarded_pixels: usize,
    },
    /// Boundary tracing, simplification, and curve fitting metrics.
    Vectorize {
        /// Which boundary tracer was used.
        tracer: String,
        /// Rings traced across all regions.
        ring_count: usize,
        /// Boundary points before simplification.
        points_before: usize,
        /// Boundary points after simplification.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
        /// Regions that produced a path.
        paths: usize,
        /// Regions skipped as degenerate.
        skipped: usize,
        /// Regions whose traversal was truncated.
        truncated: usize,
        /// Regions ordered piecewise.
        piecewise: usize,
    },
    /// Composition metrics.
    Compose {
        /// Region fills drawn.
        region_paths: usize,
        /// Subpaths across all region fills.
        region_subpaths: usize,
        /// Gradient-mesh cells.
        mesh_patches: usize,
        /// Edge-overlay strokes.
        edge_strokes: usize,
        /// Highlight accents.
        highlights: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Colors in the final palette.
    pub palette_colors: usize,
    /// Drawable elements in the output document.
    pub element_count: usize,
    /// Recorded degradations.
    pub degradation_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Palette: {} colors  |  Elements: {}  |  Degradations: {}",
            self.summary.palette_colors, self.summary.element_count, self.summary.degradation_count,
        ));

        lines.join("\n")
    }

    /// Every stage with its display name, in pipeline order.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Validate", &self.validate),
            ("Preprocess", &self.preprocess),
            ("Palette Reduction", &self.palette),
            ("Region Extraction", &self.regions),
            ("Vectorize", &self.vectorize),
            ("Compose", &self.compose),
        ]
    }
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// # Errors
///
/// Same as [`crate::process`].
pub fn process_with_diagnostics<C: Clock>(
    buffer: &PixelBuffer,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(VectorDocument, PipelineDiagnostics), PipelineError> {
    let _span = tracing::info_span!("convert", width = buffer.width(), height = buffer.height())
        .entered();
    let start = clock.now();

    let t = clock.now();
    let validated = Pipeline::new(buffer, config.clone()).validate()?;
    let validate = timed(clock, &t, &validated);

    let t = clock.now();
    let preprocessed = validated.preprocess()?;
    let preprocess = timed(clock, &t, &preprocessed);

    let t = clock.now();
    let reduced = preprocessed.reduce_palette()?;
    let palette = timed(clock, &t, &reduced);

    let t = clock.now();
    let extracted = reduced.extract_regions();
    let regions = timed(clock, &t, &extracted);

    let t = clock.now();
    let vectorized = extracted.vectorize()?;
    let vectorize = timed(clock, &t, &vectorized);

    let t = clock.now();
    let composed = vectorized.compose()?;
    let compose = timed(clock, &t, &composed);

    let total_duration = clock.elapsed(&start);
    let palette_colors = composed.palette_colors();
    let document = composed.into_document();

    let dimensions = document.dimensions;
    let summary = PipelineSummary {
        image_width: dimensions.width,
        image_height: dimensions.height,
        pixel_count: dimensions.pixel_count(),
        palette_colors,
        element_count: document.element_count(),
        degradation_count: document.report.degradations.len(),
    };

    Ok((
        document,
        PipelineDiagnostics {
            validate,
            preprocess,
            palette,
            regions,
            vectorize,
            compose,
            total_duration,
            summary,
        },
    ))
}

fn timed<C: Clock, S: PipelineStage>(
    clock: &C,
    since: &C::Instant,
    stage: &S,
) -> StageDiagnostics {
    let duration = clock.elapsed(since);
    tracing::debug!(
        stage = S::NAME,
        index = S::INDEX,
        ms = duration_ms(duration),
        "stage finished"
    );
    StageDiagnostics {
        duration,
        metrics: stage.metrics(),
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Validate {
            width,
            height,
            preset,
            ..
        } => format!("{width}x{height} preset={preset}"),
        StageMetrics::Preprocess {
            enhanced,
            pyramid_depth,
            tones,
        } => {
            let tones = tones.map_or_else(
                || "-".to_owned(),
                |t| format!("{}/{}/{}", t.shadows, t.midtones, t.highlights),
            );
            format!("enhanced={enhanced} pyramid={pyramid_depth} tones(s/m/h)={tones}")
        }
        StageMetrics::Palette {
            requested,
            colors,
            color_space,
            iterations,
            converged,
        } => {
            let state = if *converged { "converged" } else { "capped" };
            format!("{colors}/{requested} colors ({color_space}) {iterations} iters {state}")
        }
        StageMetrics::Regions {
            region_count,
            largest_region_pixels,
            discarded_groups,
            discarded_pixels,
        } => format!(
            "{region_count} regions (largest={largest_region_pixels}px) \
             noise={discarded_groups} groups/{discarded_pixels}px",
        ),
        StageMetrics::Vectorize {
            tracer,
            ring_count,
            points_before,
            points_after,
            reduction_ratio,
            paths,
            skipped,
            truncated,
            piecewise,
        } => format!(
            "{tracer} {ring_count} rings {points_before}->{points_after} pts \
             ({:.1}% reduction) paths={paths} skipped={skipped} \
             truncated={truncated} piecewise={piecewise}",
            reduction_ratio * 100.0,
        ),
        StageMetrics::Compose {
            region_paths,
            region_subpaths,
            mesh_patches,
            edge_strokes,
            highlights,
        } => format!(
            "regions={region_paths} subpaths={region_subpaths} mesh={mesh_patches} \
             edges={edge_strokes} highlights={highlights}",
        ),
    }
}

/// `1.0 - after / before`, or `0.0` when there was nothing to reduce.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn reduction_ratio(before: usize, after: usize) -> f64 {
    if before == 0 {
        0.0
    } else {
        1.0 - after as f64 / before as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::types::Color;

    /// Advances one millisecond every time it is read.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn reduction_ratio_handles_empty_input() {
        assert!((reduction_ratio(0, 0) - 0.0).abs() < f64::EPSILON);
        assert!((reduction_ratio(200, 50) - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let buffer = PixelBuffer::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) {
                Color::new(255, 0, 0)
            } else {
                Color::WHITE
            }
        })
        .unwrap();
        let clock = TickClock { ticks: Cell::new(0) };
        let config = PipelineConfig::default().with_seed(1);
        let (document, diag) = process_with_diagnostics(&buffer, &config, &clock).unwrap();

        assert_eq!(diag.summary.image_width, 40);
        assert_eq!(diag.summary.element_count, document.element_count());
        assert!(diag.stages().iter().all(|(_, s)| s.duration > Duration::ZERO));
        assert!(diag.total_duration >= diag.compose.duration);
        assert!(matches!(diag.palette.metrics, StageMetrics::Palette { colors: 2, .. }));
        assert!(matches!(
            diag.preprocess.metrics,
            StageMetrics::Preprocess { enhanced: false, pyramid_depth: 2, tones: None }
        ));

        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("enhanced=false pyramid=2 tones(s/m/h)=-"));
        assert!(report.contains("Region Extraction"));
        assert!(report.contains("NearestNeighbor"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let stage = StageDiagnostics {
            duration: Duration::from_millis(1500),
            metrics: StageMetrics::Compose {
                region_paths: 3,
                region_subpaths: 4,
                mesh_patches: 0,
                edge_strokes: 0,
                highlights: 0,
            },
        };
        let json = serde_json::to_value(&stage).unwrap();
        assert!((json["duration"].as_f64().unwrap() - 1.5).abs() < 1e-9);

        let back: StageDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = serde_json::json!({
            "duration": -1.0,
            "metrics": { "Compose": {
                "region_paths": 0, "region_subpaths": 0, "mesh_patches": 0,
                "edge_strokes": 0, "highlights": 0
            }}
        });
        assert!(serde_json::from_value::<StageDiagnostics>(json).is_err());
    }

    #[test]
    fn tone_counts_reach_the_report() {
        let buffer = PixelBuffer::from_fn(30, 4, |x, _| match x / 10 {
            0 => Color::BLACK,
            1 => Color::new(128, 128, 128),
            _ => Color::WHITE,
        })
        .unwrap();
        let clock = TickClock { ticks: Cell::new(0) };
        let config = PipelineConfig {
            highlights: true,
            ..PipelineConfig::default().with_seed(1)
        };
        let (_, diag) = process_with_diagnostics(&buffer, &config, &clock).unwrap();
        assert!(diag.report().contains("tones(s/m/h)=40/40/40"));
    }
}
