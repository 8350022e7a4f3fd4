//! chromatrace: convert a raster image into a layered SVG drawing.
//!
//! Runs the region pipeline on an image file at a named quality preset,
//! optionally overriding individual parameters, writes the result as SVG
//! (and optionally SVGZ), and prints per-stage diagnostics.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin chromatrace -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use chromatrace_export::SvgMetadata;
use chromatrace_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use chromatrace_pipeline::{
    BoundaryTracerKind, ColorSpace, CurveStyle, PipelineConfig, PixelBuffer, QualityPreset,
    VectorDocument,
};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Convert a raster image into a layered, curve-smoothed SVG drawing.
///
/// Starts from the chosen preset; any parameter flag given overrides the
/// preset's value for that field.
#[derive(Parser)]
#[command(name = "chromatrace", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Quality preset the configuration starts from.
    #[arg(long, value_enum, default_value_t = Preset::Balanced)]
    preset: Preset,

    /// Maximum number of palette colors.
    #[arg(long, value_parser = positive_usize())]
    palette_size: Option<usize>,

    /// Color space used for palette clustering.
    #[arg(long, value_enum)]
    color_space: Option<Space>,

    /// Seed for palette sampling and initialisation (reproducible output).
    #[arg(long)]
    seed: Option<u64>,

    /// Groups smaller than this many pixels are discarded as noise.
    #[arg(long)]
    min_region_pixels: Option<usize>,

    /// Boundary ordering strategy.
    #[arg(long, value_enum)]
    tracer: Option<Tracer>,

    /// Douglas-Peucker tolerance in pixels.
    #[arg(long)]
    simplify_tolerance: Option<f64>,

    /// Curve style for region outlines.
    #[arg(long, value_enum)]
    curve_style: Option<Curve>,

    /// Curve smoothing strength (0-1).
    #[arg(long)]
    curve_smoothing: Option<f64>,

    /// Number of vertex relaxation passes (0-5).
    #[arg(long)]
    smoothing_iterations: Option<u32>,

    /// Enable or disable the edge overlay layer.
    #[arg(long)]
    edge_overlay: Option<bool>,

    /// Enable or disable the gradient mesh layer.
    #[arg(long)]
    gradient_mesh: Option<bool>,

    /// Enable or disable the radial gradient background.
    #[arg(long)]
    background_gradient: Option<bool>,

    /// Enable or disable highlight accents.
    #[arg(long)]
    highlights: Option<bool>,

    /// Blur and contrast-stretch a working copy before palette reduction.
    #[arg(long)]
    preprocess: Option<bool>,

    /// Gaussian blur sigma of the preprocessing pass.
    #[arg(long)]
    preprocess_blur: Option<f32>,

    /// Edge pyramid depth for the edge overlay (1 = full resolution only).
    #[arg(long)]
    pyramid_levels: Option<u32>,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, `--preset` and all other pipeline parameter flags
    /// are ignored. Missing fields take the balanced defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// SVG output path. Defaults to the input path with an `.svg`
    /// extension.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Also write gzip-compressed SVG to this path.
    #[arg(long)]
    svgz: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = positive_usize())]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,
}

/// Quality preset selection.
#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// Few colors, aggressive simplification, no accents.
    Fast,
    /// Default trade-off with an edge overlay.
    Balanced,
    /// Border following, B-splines, mesh and gradient background.
    High,
    /// Largest palette and every accent layer.
    Ultra,
}

/// Palette clustering color space selection.
#[derive(Clone, Copy, ValueEnum)]
enum Space {
    /// Euclidean distance on RGB channels.
    Rgb,
    /// Weighted distance in CIE L*a*b*.
    Lab,
}

/// Boundary tracer selection.
#[derive(Clone, Copy, ValueEnum)]
enum Tracer {
    /// Greedy nearest-unvisited ordering.
    NearestNeighbor,
    /// Border following (closed contours with holes).
    BorderFollowing,
}

/// Curve style selection.
#[derive(Clone, Copy, ValueEnum)]
enum Curve {
    /// Corner-cutting quadratic Béziers.
    Quadratic,
    /// Closed cubic B-spline.
    BSpline,
}

/// Parser for counts that must be at least one.
fn positive_usize() -> clap::builder::RangedU64ValueParser<usize> {
    clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
}

impl From<Preset> for QualityPreset {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self::Fast,
            Preset::Balanced => Self::Balanced,
            Preset::High => Self::High,
            Preset::Ultra => Self::Ultra,
        }
    }
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise the preset is
/// expanded and each flag that was given overrides its field.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let mut config = PipelineConfig::from(QualityPreset::from(cli.preset));
    if let Some(palette_size) = cli.palette_size {
        config.palette_size = palette_size;
    }
    if let Some(space) = cli.color_space {
        config.color_space = match space {
            Space::Rgb => ColorSpace::Rgb,
            Space::Lab => ColorSpace::Lab,
        };
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(min_region_pixels) = cli.min_region_pixels {
        config.min_region_pixels = min_region_pixels;
    }
    if let Some(tracer) = cli.tracer {
        config.boundary_tracer = match tracer {
            Tracer::NearestNeighbor => BoundaryTracerKind::NearestNeighbor,
            Tracer::BorderFollowing => BoundaryTracerKind::BorderFollowing,
        };
    }
    if let Some(tolerance) = cli.simplify_tolerance {
        config.simplify_tolerance = tolerance;
    }
    if let Some(curve) = cli.curve_style {
        config.curve_style = match curve {
            Curve::Quadratic => CurveStyle::Quadratic,
            Curve::BSpline => CurveStyle::BSpline,
        };
    }
    if let Some(smoothing) = cli.curve_smoothing {
        config.curve_smoothing = smoothing;
    }
    if let Some(iterations) = cli.smoothing_iterations {
        config.smoothing_iterations = iterations;
    }
    if let Some(on) = cli.edge_overlay {
        config.edge_overlay = on;
    }
    if let Some(on) = cli.gradient_mesh {
        config.gradient_mesh = on;
    }
    if let Some(on) = cli.background_gradient {
        config.background_gradient = on;
    }
    if let Some(on) = cli.highlights {
        config.highlights = on;
    }
    if let Some(on) = cli.preprocess {
        config.preprocess = on;
    }
    if let Some(sigma) = cli.preprocess_blur {
        config.preprocess_blur_sigma = sigma;
    }
    if let Some(levels) = cli.pyramid_levels {
        config.pyramid_levels = levels;
    }
    Ok(config)
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let buffer = match PixelBuffer::decode(&image_bytes) {
        Ok(buffer) => buffer,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        image = %cli.image_path.display(),
        bytes = image_bytes.len(),
        width = buffer.width(),
        height = buffer.height(),
        preset = %config.preset,
        runs = cli.runs,
        "starting conversion"
    );
    tracing::debug!(?config, "resolved configuration");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match chromatrace_pipeline::diagnostics::process_with_diagnostics(
            &buffer, &config, &StdClock,
        ) {
            Ok((document, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write outputs on the first run only.
                if run == 0 {
                    if let Err(msg) = write_outputs(&cli, &config, &document) {
                        eprintln!("{msg}");
                        return ExitCode::FAILURE;
                    }
                    log_degradations(&document);
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Default SVG path: the input path with its extension replaced.
fn default_svg_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("svg")
}

/// Serialize the document and write the SVG (and SVGZ, if requested).
fn write_outputs(
    cli: &Cli,
    config: &PipelineConfig,
    document: &VectorDocument,
) -> Result<(), String> {
    let title = cli
        .image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("chromatrace");
    let desc = format!(
        "preset={}, palette_size={}, tracer={}",
        config.preset, config.palette_size, config.boundary_tracer,
    );
    let config_json = serde_json::to_string(config)
        .map_err(|e| format!("Error serializing config: {e}"))?;
    let metadata = SvgMetadata {
        title: Some(title),
        description: Some(&desc),
        config_json: Some(&config_json),
    };

    let svg_path = cli
        .svg
        .clone()
        .unwrap_or_else(|| default_svg_path(&cli.image_path));
    let svg = chromatrace_export::to_svg(document, &metadata);
    std::fs::write(&svg_path, &svg)
        .map_err(|e| format!("Error writing SVG to {}: {e}", svg_path.display()))?;
    tracing::info!(
        path = %svg_path.display(),
        bytes = svg.len(),
        elements = document.element_count(),
        "SVG written"
    );

    if let Some(ref svgz_path) = cli.svgz {
        let bytes = chromatrace_export::to_svgz(document, &metadata)
            .map_err(|e| format!("Error encoding SVGZ: {e}"))?;
        std::fs::write(svgz_path, &bytes)
            .map_err(|e| format!("Error writing SVGZ to {}: {e}", svgz_path.display()))?;
        tracing::info!(path = %svgz_path.display(), bytes = bytes.len(), "SVGZ written");
    }
    Ok(())
}

/// Surface the conversion report's degradations as warnings.
fn log_degradations(document: &VectorDocument) {
    let report = &document.report;
    if report.is_clean() {
        tracing::debug!(regions = report.regions_drawn, "conversion exact");
    }
    for degradation in &report.degradations {
        tracing::warn!(
            kind = ?degradation.kind,
            region = ?degradation.region_index,
            palette_index = ?degradation.palette_index,
            "conversion degraded"
        );
    }
    if report.noise_groups_discarded > 0 {
        tracing::info!(
            groups = report.noise_groups_discarded,
            pixels = report.noise_pixels_discarded,
            "discarded noise groups"
        );
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Validate", |d| d.validate.duration),
        ("Preprocess", |d| d.preprocess.duration),
        ("Palette Reduction", |d| d.palette.duration),
        ("Region Extraction", |d| d.regions.duration),
        ("Vectorize", |d| d.vectorize.duration),
        ("Compose", |d| d.compose.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("chromatrace").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn preset_flag_selects_preset_table() {
        let config = config_from_cli(&parse(&["--preset", "ultra", "in.png"])).unwrap();
        assert_eq!(config, PipelineConfig::from(QualityPreset::Ultra));
    }

    #[test]
    fn default_is_balanced() {
        let config = config_from_cli(&parse(&["in.png"])).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn flags_override_preset_fields() {
        let cli = parse(&[
            "--preset",
            "fast",
            "--palette-size",
            "7",
            "--tracer",
            "border-following",
            "--curve-style",
            "b-spline",
            "--highlights",
            "true",
            "--seed",
            "9",
            "in.png",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.preset, QualityPreset::Fast);
        assert_eq!(config.palette_size, 7);
        assert_eq!(config.boundary_tracer, BoundaryTracerKind::BorderFollowing);
        assert_eq!(config.curve_style, CurveStyle::BSpline);
        assert!(config.highlights);
        assert_eq!(config.seed, Some(9));
        let fast = PipelineConfig::from(QualityPreset::Fast);
        assert_eq!(config.simplify_tolerance, fast.simplify_tolerance);
    }

    #[test]
    fn preprocessing_flags_override_preset_fields() {
        let cli = parse(&[
            "--preprocess",
            "true",
            "--preprocess-blur",
            "3.5",
            "--pyramid-levels",
            "2",
            "in.png",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert!(config.preprocess);
        assert!((config.preprocess_blur_sigma - 3.5).abs() < f32::EPSILON);
        assert_eq!(config.pyramid_levels, 2);
        assert!(!PipelineConfig::default().preprocess);
    }

    #[test]
    fn zero_runs_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["chromatrace", "--runs", "0", "in.png"]).is_err());
    }

    #[test]
    fn config_json_takes_precedence() {
        let cli = parse(&[
            "--preset",
            "ultra",
            "--config-json",
            r#"{"palette_size": 5}"#,
            "in.png",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.palette_size, 5);
        assert_eq!(config.preset, QualityPreset::Balanced);
    }

    #[test]
    fn malformed_config_json_is_reported() {
        let cli = parse(&["--config-json", "{not json", "in.png"]);
        let err = config_from_cli(&cli).unwrap_err();
        assert!(err.starts_with("Error parsing --config-json"));
    }

    #[test]
    fn zero_palette_size_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["chromatrace", "--palette-size", "0", "in.png"]);
        assert!(result.is_err());
    }

    #[test]
    fn svg_path_defaults_next_to_input() {
        assert_eq!(
            default_svg_path(Path::new("photos/cat.jpg")),
            PathBuf::from("photos/cat.svg")
        );
    }
}
