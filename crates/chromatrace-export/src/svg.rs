//! SVG export serializer.
//!
//! Converts a [`VectorDocument`] into an SVG string using the [`svg`]
//! crate for document construction, XML escaping, and path data
//! formatting.
//!
//! Layers are emitted in document order, each in its own group:
//!
//! 1. background `<rect>` (solid, or filled from a `<radialGradient>`)
//! 2. `<g id="regions">`: one filled `<path>` per region
//! 3. `<g id="gradient-mesh">`: translucent cell `<rect>`s
//! 4. `<g id="edge-overlay">`: stroke-only `<path>`s
//! 5. `<g id="highlights">`: soft `<ellipse>`s
//!
//! Accent groups are omitted when their layer is empty.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements for
//! accessibility and to help file managers identify exported files.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{
    Definitions, Description, Element, Ellipse, Group, Path, RadialGradient, Rectangle, Stop,
    Title,
};
use svg::node::{Node, Text, Value};

use chromatrace_pipeline::{
    Background, FillRule, Highlight, MeshPatch, PathCommand, Polyline, Stroke, VectorDocument,
};

/// Element id of the background gradient definition.
pub const BACKGROUND_GRADIENT_ID: &str = "background-gradient";

/// Namespace URI for the embedded pipeline configuration element.
pub const METADATA_NAMESPACE: &str = "https://chromatrace.dev/ns/1";

/// Metadata to embed in the SVG document.
///
/// All fields are optional.  When present, a `<title>` and/or `<desc>`
/// element is emitted immediately after the opening `<svg>` tag.  These
/// are standard SVG accessibility elements and are surfaced by some file
/// managers and screen readers.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Structured pipeline configuration JSON, emitted inside a
    /// `<metadata>` element wrapped in a namespaced
    /// `<chromatrace:pipeline>` element so exported files carry
    /// machine-parseable settings for reproducibility.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from draw commands.
///
/// Coordinates are formatted by the [`svg`] crate using `f32` precision
/// (sufficient for pixel-derived coordinates from the pipeline).
///
/// # Examples
///
/// ```
/// use chromatrace_pipeline::{PathCommand, Point};
/// use chromatrace_export::build_path_data;
///
/// let d = build_path_data(&[
///     PathCommand::MoveTo(Point::new(10.0, 20.0)),
///     PathCommand::LineTo(Point::new(30.0, 40.0)),
///     PathCommand::Close,
/// ]);
/// assert_eq!(d, "M10,20 L30,40 z");
/// ```
#[must_use]
pub fn build_path_data(commands: &[PathCommand]) -> String {
    if commands.is_empty() {
        return String::new();
    }
    let mut data = Data::new();
    for command in commands {
        data = match *command {
            PathCommand::MoveTo(p) => data.move_to((p.x, p.y)),
            PathCommand::LineTo(p) => data.line_to((p.x, p.y)),
            PathCommand::QuadTo { ctrl, to } => {
                data.quadratic_curve_to((ctrl.x, ctrl.y, to.x, to.y))
            }
            PathCommand::CubicTo { ctrl1, ctrl2, to } => {
                data.cubic_curve_to((ctrl1.x, ctrl1.y, ctrl2.x, ctrl2.y, to.x, to.y))
            }
            PathCommand::Close => data.close(),
        };
    }
    String::from(Value::from(data))
}

/// Build an open `M ... L ...` path from a polyline.
///
/// Returns an empty string for polylines with fewer than 2 points.
#[must_use]
pub fn build_polyline_data(polyline: &Polyline) -> String {
    let points = polyline.points();
    if points.len() < 2 {
        return String::new();
    }

    let first = &points[0];
    let mut data = Data::new().move_to((first.x, first.y));
    for p in &points[1..] {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// Serialize a vector document to an SVG string.
///
/// The root carries `width`, `height`, and `viewBox="0 0 w h"` equal to
/// the source dimensions.
///
/// # Examples
///
/// ```
/// use chromatrace_pipeline::{Color, PipelineConfig, PixelBuffer};
/// use chromatrace_export::{SvgMetadata, to_svg};
///
/// let buffer = PixelBuffer::from_fn(8, 8, |_, _| Color::new(20, 40, 60)).unwrap();
/// let config = PipelineConfig { min_region_pixels: 1, ..PipelineConfig::default() };
/// let document = chromatrace_pipeline::process(&buffer, &config).unwrap();
/// let metadata = SvgMetadata {
///     title: Some("swatch"),
///     ..SvgMetadata::default()
/// };
/// let svg = to_svg(&document, &metadata);
/// assert!(svg.contains("<title>swatch</title>"));
/// assert!(svg.contains(r#"viewBox="0 0 8 8""#));
/// ```
#[must_use]
pub fn to_svg(document: &VectorDocument, metadata: &SvgMetadata<'_>) -> String {
    let w = document.dimensions.width;
    let h = document.dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    // Optional <title> element
    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    // Optional <desc> element
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    // Optional <metadata> element with structured pipeline config
    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("chromatrace:pipeline");
        pipeline_el.assign("xmlns:chromatrace", METADATA_NAMESPACE);
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    doc = add_background(doc, &document.background, w, h);

    let mut regions = Group::new().set("id", "regions");
    for path in &document.regions {
        let d = build_path_data(&path.commands);
        if d.is_empty() {
            continue;
        }
        regions = regions.add(
            Path::new()
                .set("d", d)
                .set("fill", path.fill.to_string())
                .set("fill-opacity", path.opacity)
                .set("fill-rule", fill_rule(path.fill_rule))
                .set("stroke", "none"),
        );
    }
    doc = doc.add(regions);

    if !document.mesh.is_empty() {
        doc = doc.add(mesh_group(&document.mesh));
    }
    if !document.edges.is_empty() {
        doc = doc.add(edge_group(&document.edges));
    }
    if !document.highlights.is_empty() {
        doc = doc.add(highlight_group(&document.highlights));
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

const fn fill_rule(rule: FillRule) -> &'static str {
    match rule {
        FillRule::NonZero => "nonzero",
        FillRule::EvenOdd => "evenodd",
    }
}

fn add_background(doc: Document, background: &Background, width: u32, height: u32) -> Document {
    let rect = Rectangle::new()
        .set("x", 0)
        .set("y", 0)
        .set("width", width)
        .set("height", height);
    match background {
        Background::Solid(color) => doc.add(rect.set("fill", color.to_string())),
        Background::RadialGradient(colors) => {
            let mut gradient = RadialGradient::new()
                .set("id", BACKGROUND_GRADIENT_ID)
                .set("cx", "50%")
                .set("cy", "50%")
                .set("r", "50%");
            for (offset, color) in gradient_offsets(colors.len()).into_iter().zip(colors) {
                gradient = gradient.add(
                    Stop::new()
                        .set("offset", format!("{offset}%"))
                        .set("stop-color", color.to_string()),
                );
            }
            doc.add(Definitions::new().add(gradient))
                .add(rect.set("fill", format!("url(#{BACKGROUND_GRADIENT_ID})")))
        }
    }
}

/// Evenly spaced stop offsets in percent: `[0]`, `[0, 100]`,
/// `[0, 50, 100]`, ...
#[must_use]
pub fn gradient_offsets(count: usize) -> Vec<usize> {
    match count {
        0 => Vec::new(),
        1 => vec![0],
        n => (0..n).map(|i| i * 100 / (n - 1)).collect(),
    }
}

fn mesh_group(mesh: &[MeshPatch]) -> Group {
    mesh.iter().fold(Group::new().set("id", "gradient-mesh"), |group, patch| {
        group.add(
            Rectangle::new()
                .set("x", patch.x)
                .set("y", patch.y)
                .set("width", patch.width)
                .set("height", patch.height)
                .set("fill", patch.color.to_string())
                .set("fill-opacity", patch.opacity),
        )
    })
}

fn edge_group(edges: &[Stroke]) -> Group {
    let mut group = Group::new().set("id", "edge-overlay");
    for stroke in edges {
        let d = build_polyline_data(&stroke.polyline);
        if d.is_empty() {
            continue;
        }
        group = group.add(
            Path::new()
                .set("d", d)
                .set("fill", "none")
                .set("stroke", stroke.color.to_string())
                .set("stroke-width", stroke.width)
                .set("stroke-opacity", stroke.opacity),
        );
    }
    group
}

fn highlight_group(highlights: &[Highlight]) -> Group {
    highlights
        .iter()
        .fold(Group::new().set("id", "highlights"), |group, h| {
            group.add(
                Ellipse::new()
                    .set("cx", h.center.x)
                    .set("cy", h.center.y)
                    .set("rx", h.rx)
                    .set("ry", h.ry)
                    .set("fill", h.color.to_string())
                    .set("fill-opacity", h.opacity),
            )
        })
}
