//! Shared types for the chromatrace raster-to-vector pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can build pixel buffers
/// without depending on `image` directly.
pub use image::RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Linear interpolation: `self + (other - self) * t`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            (other.x - self.x).mul_add(t, self.x),
            (other.y - self.y).mul_add(t, self.y),
        )
    }
}

impl From<PixelCoord> for Point {
    fn from(p: PixelCoord) -> Self {
        Self::new(f64::from(p.x), f64::from(p.y))
    }
}

/// Integer pixel coordinate inside a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PixelCoord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl PixelCoord {
    /// Create a new pixel coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// A sequence of connected points forming a path segment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

impl FromIterator<Point> for Polyline {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels (`width * height`).
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// An opaque 8-bit sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Create a new color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Sum of the three channels, used to rank colors from dark to light.
    #[must_use]
    pub fn channel_sum(self) -> u16 {
        u16::from(self.r) + u16::from(self.g) + u16::from(self.b)
    }

    /// Relative luminance in `[0, 1]` (Rec. 709 weights on linearised
    /// channels).
    #[must_use]
    pub fn relative_luminance(self) -> f64 {
        fn linear(c: u8) -> f64 {
            let c = f64::from(c) / 255.0;
            if c <= 0.040_45 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126f64.mul_add(
            linear(self.r),
            0.7152f64.mul_add(linear(self.g), 0.0722 * linear(self.b)),
        )
    }
}

impl From<image::Rgb<u8>> for Color {
    fn from(p: image::Rgb<u8>) -> Self {
        let [r, g, b] = p.0;
        Self::new(r, g, b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

/// Number of channels in a [`PixelBuffer`] pixel.
pub const CHANNELS: usize = 3;

/// An immutable grid of 8-bit RGB pixels.
///
/// Every pipeline stage borrows the buffer; none of them copy or mutate
/// it. Construction validates that both dimensions are non-zero and that
/// the raw data length matches `width * height * 3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    image: RgbImage,
}

impl PixelBuffer {
    /// Build a buffer from raw row-major RGB bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if either dimension is zero
    /// or if `data` is not exactly `width * height * 3` bytes long (an
    /// unsupported color depth or a truncated buffer).
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        check_dimensions(width, height)?;
        let expected = usize::try_from(u64::from(width) * u64::from(height))
            .ok()
            .and_then(|n| n.checked_mul(CHANNELS))
            .ok_or_else(|| {
                PipelineError::InvalidInput(format!("image {width}x{height} is too large"))
            })?;
        if data.len() != expected {
            return Err(PipelineError::InvalidInput(format!(
                "unsupported color depth: expected {expected} bytes of 8-bit RGB for \
                 {width}x{height}, got {}",
                data.len()
            )));
        }
        RgbImage::from_raw(width, height, data)
            .map(|image| Self { image })
            .ok_or_else(|| PipelineError::InvalidInput("pixel data does not fit image".into()))
    }

    /// Wrap an already-decoded RGB image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if either dimension is zero.
    pub fn from_rgb_image(image: RgbImage) -> Result<Self, PipelineError> {
        check_dimensions(image.width(), image.height())?;
        Ok(Self { image })
    }

    /// Build a buffer by evaluating `f` at every pixel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if either dimension is zero.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> Color,
    ) -> Result<Self, PipelineError> {
        check_dimensions(width, height)?;
        let image = RgbImage::from_fn(width, height, |x, y| {
            let c = f(x, y);
            image::Rgb([c.r, c.g, c.b])
        });
        Ok(Self { image })
    }

    /// Decode encoded image bytes (PNG, JPEG, BMP, WebP) into a buffer.
    ///
    /// Any alpha channel is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if `bytes` is empty or the
    /// decoded image has a zero dimension. Returns
    /// [`PipelineError::ImageDecode`] if the format is unrecognized or the
    /// data is corrupt.
    pub fn decode(bytes: &[u8]) -> Result<Self, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::InvalidInput("input image data is empty".into()));
        }
        let decoded = image::load_from_memory(bytes)?;
        Self::from_rgb_image(decoded.to_rgb8())
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Width and height together.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Total number of pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.image.as_raw().len() / CHANNELS
    }

    /// Color at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is outside the image (as
    /// [`image::ImageBuffer::get_pixel`] does).
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        Color::from(*self.image.get_pixel(x, y))
    }

    /// All pixel colors in row-major order.
    pub fn colors(&self) -> impl ExactSizeIterator<Item = Color> + '_ {
        self.image
            .as_raw()
            .chunks_exact(CHANNELS)
            .map(|c| Color::new(c[0], c[1], c[2]))
    }

    /// Borrow the underlying `image` buffer.
    #[must_use]
    pub const fn as_rgb_image(&self) -> &RgbImage {
        &self.image
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidInput(format!(
            "image must have non-zero dimensions, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Errors that abort a conversion.
///
/// Degenerate geometry and exhausted iteration/traversal budgets are not
/// errors: they are recovered per region and recorded in the
/// [`ConversionReport`](crate::report::ConversionReport).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The pixel buffer is unusable (empty, zero-sized, wrong depth).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A configuration value is out of range.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfiguration(String),

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead. It deserializes back as
/// `InvalidInput` carrying that message, since the typed error cannot be
/// reconstructed.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    InvalidInput(String),
    InvalidConfiguration(String),
    ImageDecode(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::InvalidInput(s) => PipelineErrorProxy::InvalidInput(s.clone()),
            Self::InvalidConfiguration(s) => PipelineErrorProxy::InvalidConfiguration(s.clone()),
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::InvalidInput(s) => Self::InvalidInput(s),
            PipelineErrorProxy::InvalidConfiguration(s) => Self::InvalidConfiguration(s),
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidInput(format!("image decode error: {msg}"))
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_lerp_midpoint() {
        let m = Point::new(0.0, 10.0).lerp(Point::new(10.0, 0.0), 0.5);
        assert_eq!(m, Point::new(5.0, 5.0));
    }

    #[test]
    fn point_from_pixel_coord() {
        assert_eq!(Point::from(PixelCoord::new(3, 7)), Point::new(3.0, 7.0));
    }

    // --- Color tests ---

    #[test]
    fn color_display_is_css_rgb() {
        assert_eq!(Color::new(255, 0, 12).to_string(), "rgb(255,0,12)");
    }

    #[test]
    fn luminance_extremes() {
        assert!(Color::BLACK.relative_luminance().abs() < 1e-9);
        assert!((Color::WHITE.relative_luminance() - 1.0).abs() < 1e-9);
    }

    // --- PixelBuffer tests ---

    #[test]
    fn zero_width_is_invalid_input() {
        let err = PixelBuffer::new(0, 10, Vec::new()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn wrong_length_is_invalid_input() {
        // 2x2 RGBA data is not 8-bit RGB.
        let err = PixelBuffer::new(2, 2, vec![0; 16]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(ref m) if m.contains("color depth")));
    }

    #[test]
    fn new_reads_row_major_rgb() {
        let data = vec![1, 2, 3, 4, 5, 6];
        let buf = PixelBuffer::new(2, 1, data).unwrap();
        assert_eq!(buf.pixel(0, 0), Color::new(1, 2, 3));
        assert_eq!(buf.pixel(1, 0), Color::new(4, 5, 6));
        assert_eq!(buf.pixel_count(), 2);
    }

    #[test]
    fn decode_empty_bytes_is_invalid_input() {
        assert!(matches!(
            PixelBuffer::decode(&[]),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn decode_corrupt_bytes_is_image_decode() {
        assert!(matches!(
            PixelBuffer::decode(&[0xFF, 0xFE, 0x00, 0x01]),
            Err(PipelineError::ImageDecode(_))
        ));
    }

    #[test]
    fn decode_png_drops_alpha() {
        let img = image::RgbaImage::from_fn(2, 2, |_, _| image::Rgba([10, 20, 30, 128]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();

        let decoded = PixelBuffer::decode(&buf).unwrap();
        assert_eq!(decoded.dimensions(), Dimensions { width: 2, height: 2 });
        assert_eq!(decoded.pixel(1, 1), Color::new(10, 20, 30));
    }

    // --- PipelineError serde tests ---

    #[test]
    fn error_serde_roundtrip() {
        let err = PipelineError::InvalidConfiguration("palette_size must be >= 1".into());
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), err.to_string());
    }
}
