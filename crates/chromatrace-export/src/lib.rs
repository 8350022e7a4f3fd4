//! chromatrace-export: Pure format serializers (sans-IO)
//!
//! Converts vector documents into output formats: plain SVG text and
//! gzip-compressed SVGZ bytes.

pub mod svg;
pub mod svgz;

pub use svg::{SvgMetadata, build_path_data, build_polyline_data, to_svg};
pub use svgz::{ExportError, compress, to_svgz};
