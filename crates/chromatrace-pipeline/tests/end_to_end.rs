//! Integration tests: synthetic images through the full conversion.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chromatrace_pipeline::boundary::{BoundaryTracer, BoundaryTracerKind, TraceLimits};
use chromatrace_pipeline::quantize::PaletteReducer;
use chromatrace_pipeline::vectorize::{record_outcomes, vectorize_regions};
use chromatrace_pipeline::{
    Color, ConversionReport, DegradationKind, PipelineConfig, PixelBuffer, QualityPreset,
    RegionExtractor,
};

const RED: Color = Color::new(255, 0, 0);

/// 100x100 white with a centred 50x50 red square.
fn red_square() -> PixelBuffer {
    PixelBuffer::from_fn(100, 100, |x, y| {
        if (25..75).contains(&x) && (25..75).contains(&y) {
            RED
        } else {
            Color::WHITE
        }
    })
    .unwrap()
}

#[test]
fn red_square_fast_preset_yields_filled_red_path() {
    let config = PipelineConfig::from(QualityPreset::Fast).with_seed(11);
    let doc = chromatrace_pipeline::process(&red_square(), &config).unwrap();

    assert_eq!(doc.dimensions.width, 100);
    assert_eq!(doc.dimensions.height, 100);
    assert!(doc.regions.len() >= 2, "got {} regions", doc.regions.len());
    assert!(doc.regions.iter().any(|p| p.fill == RED));
    assert!(doc.regions.iter().any(|p| p.fill == Color::WHITE));
    // White surround (7500 px) underneath the red square (2500 px).
    assert_eq!(doc.regions[0].fill, Color::WHITE);
    assert_eq!(doc.regions[0].area, 7500);
    assert_eq!(doc.regions[1].area, 2500);
}

#[test]
fn every_preset_converts_the_red_square() {
    for preset in QualityPreset::ALL {
        let config = PipelineConfig::from(preset).with_seed(2);
        let doc = chromatrace_pipeline::process(&red_square(), &config).unwrap();
        assert_eq!(doc.regions.len(), 2, "preset {preset}");
        assert_eq!(doc.mesh.is_empty(), !config.gradient_mesh, "preset {preset}");
        assert_eq!(doc.highlights.is_empty(), !config.highlights, "preset {preset}");
        if config.edge_overlay {
            assert!(!doc.edges.is_empty(), "preset {preset}");
        }
    }
}

#[test]
fn preprocessed_ultra_run_keeps_canvas_and_accents() {
    let config = PipelineConfig {
        preprocess: true,
        ..PipelineConfig::from(QualityPreset::Ultra).with_seed(6)
    };
    let doc = chromatrace_pipeline::process(&red_square(), &config).unwrap();
    assert_eq!(doc.dimensions.width, 100);
    assert!(doc.regions.len() >= 2, "got {} regions", doc.regions.len());
    // Blurred fills stay close to the flat source colors.
    assert!(doc.regions.iter().any(|p| p.fill.r > 200 && p.fill.g < 60));
    assert!(!doc.highlights.is_empty());
    assert!(!doc.edges.is_empty());
}

#[test]
fn single_color_image_reduces_to_that_color() {
    let buffer = PixelBuffer::from_fn(50, 50, |_, _| RED).unwrap();
    for k in [1, 4, 32] {
        let config = PipelineConfig {
            palette_size: k,
            ..PipelineConfig::default().with_seed(4)
        };
        let quantized = PaletteReducer::from_config(&config).reduce(&buffer).unwrap();
        assert_eq!(quantized.palette.len(), 1, "k = {k}");
        assert_eq!(quantized.palette.color(0), Some(RED));
    }
}

#[test]
fn two_blocks_on_white_give_three_exact_regions() {
    let blue = Color::new(0, 0, 200);
    let green = Color::new(0, 160, 0);
    let buffer = PixelBuffer::from_fn(80, 40, |x, y| {
        if (5..30).contains(&x) && (5..30).contains(&y) {
            blue
        } else if (45..70).contains(&x) && (10..35).contains(&y) {
            green
        } else {
            Color::WHITE
        }
    })
    .unwrap();
    let config = PipelineConfig::default().with_seed(8);
    let quantized = PaletteReducer::from_config(&config).reduce(&buffer).unwrap();
    let set = RegionExtractor::new(100).extract(&quantized);

    assert_eq!(set.regions.len(), 3);
    assert_eq!(set.regions[0].color, Color::WHITE);
    assert_eq!(set.regions[0].pixel_count(), 80 * 40 - 2 * 625);
    assert_eq!(set.regions[1].pixel_count(), 625);
    assert_eq!(set.regions[2].pixel_count(), 625);
    let total: usize = set.regions.iter().map(|r| r.pixel_count()).sum();
    assert_eq!(total, 80 * 40);
}

#[test]
fn filled_rectangle_boundary_is_its_perimeter_cycle() {
    let buffer = PixelBuffer::from_fn(40, 30, |x, y| {
        if (10..30).contains(&x) && (5..20).contains(&y) {
            RED
        } else {
            Color::WHITE
        }
    })
    .unwrap();
    let config = PipelineConfig::default().with_seed(1);
    let quantized = PaletteReducer::from_config(&config).reduce(&buffer).unwrap();
    let set = RegionExtractor::new(1).extract(&quantized);
    let red = set.regions.iter().find(|r| r.color == RED).unwrap();

    let limits = TraceLimits {
        max_points: 10_000,
        adjacency_radius: 1.5,
    };
    let traced = BoundaryTracerKind::NearestNeighbor.trace(red, &limits);
    assert_eq!(traced.rings.len(), 1);
    let ring = traced.rings[0].polyline.points();

    // 20x15 rectangle: 2 * (20 + 15) - 4 perimeter pixels.
    assert_eq!(ring.len(), 66);
    for p in ring {
        let on_edge = p.x == 10.0 || p.x == 29.0 || p.y == 5.0 || p.y == 19.0;
        assert!(on_edge, "{p:?} is not on the perimeter");
    }
    let closed = ring.iter().zip(ring.iter().cycle().skip(1));
    for (a, b) in closed {
        assert!(a.distance(*b) <= 1.5, "{a:?} -> {b:?} breaks the cycle");
    }
    assert!(!traced.piecewise());
    assert!(!traced.truncated());
}

#[test]
fn single_pixel_region_is_counted_not_fatal() {
    let buffer = PixelBuffer::from_fn(30, 30, |x, y| {
        if x == 12 && y == 17 { RED } else { Color::WHITE }
    })
    .unwrap();
    let config = PipelineConfig {
        min_region_pixels: 1,
        ..PipelineConfig::default().with_seed(6)
    };

    let doc = chromatrace_pipeline::process(&buffer, &config).unwrap();
    assert_eq!(doc.regions.len(), 1);
    assert_eq!(doc.regions[0].fill, Color::WHITE);
    assert_eq!(doc.report.regions_drawn, 1);
    assert_eq!(doc.report.regions_skipped, 1);

    let quantized = PaletteReducer::from_config(&config).reduce(&buffer).unwrap();
    let set = RegionExtractor::new(1).extract(&quantized);
    let outcomes = vectorize_regions(&set.regions, &config).unwrap();
    let mut report = ConversionReport::default();
    record_outcomes(&mut report, &outcomes);
    let skipped: Vec<_> = report
        .degradations
        .iter()
        .filter(|d| d.kind == DegradationKind::DegenerateGeometry)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].region_index, Some(1));
}

#[test]
fn tiny_groups_are_discarded_as_noise() {
    let buffer = PixelBuffer::from_fn(30, 30, |x, y| {
        if x == 12 && y == 17 { RED } else { Color::WHITE }
    })
    .unwrap();
    let config = PipelineConfig::from(QualityPreset::Fast).with_seed(6);
    let doc = chromatrace_pipeline::process(&buffer, &config).unwrap();
    assert_eq!(doc.regions.len(), 1);
    assert_eq!(doc.report.noise_groups_discarded, 1);
    assert_eq!(doc.report.noise_pixels_discarded, 1);
}

#[test]
fn seeded_conversion_is_deterministic() {
    let buffer = PixelBuffer::from_fn(64, 48, |x, y| {
        let r = u8::try_from(x * 4).unwrap();
        let g = u8::try_from(y * 5).unwrap();
        Color::new(r, g, 128)
    })
    .unwrap();
    let config = PipelineConfig::from(QualityPreset::High).with_seed(42);
    let a = chromatrace_pipeline::process(&buffer, &config).unwrap();
    let b = chromatrace_pipeline::process(&buffer, &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn config_round_trips_through_json() {
    let config = PipelineConfig::from(QualityPreset::Ultra).with_seed(3);
    let json = serde_json::to_string(&config).unwrap();
    let back: PipelineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);

    // Missing fields fall back to the balanced defaults.
    let partial: PipelineConfig = serde_json::from_str(r#"{"palette_size": 8}"#).unwrap();
    assert_eq!(partial.palette_size, 8);
    assert_eq!(partial.simplify_tolerance, PipelineConfig::default().simplify_tolerance);
}
