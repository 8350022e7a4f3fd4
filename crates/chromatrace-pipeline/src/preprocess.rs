//! Optional enhancement applied before palette reduction.
//!
//! Photos carry sensor noise and fine texture that k-means would spend
//! palette entries on. A per-channel Gaussian blur followed by a mild
//! lightness contrast stretch gives the reducer broader, cleaner color
//! fields. The source buffer is never modified: the enhanced copy only
//! feeds clustering, while composition keeps sampling the original.

use image::{GrayImage, RgbImage};
use palette::Lab;

use crate::color::{from_lab, to_lab};
use crate::types::{CHANNELS, Color, PipelineError, PixelBuffer};

/// Parameters for [`enhance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceParams {
    /// Gaussian blur sigma; non-positive skips the blur.
    pub blur_sigma: f32,
    /// Lightness contrast factor around the mean L*; `1.0` is a no-op.
    pub contrast: f32,
}

/// Apply Gaussian blur to an RGB image by blurring each channel
/// independently.
///
/// Non-positive sigma values return the image unchanged.
#[must_use = "returns the blurred RGB image"]
pub fn gaussian_blur_rgb(image: &RgbImage, sigma: f32) -> RgbImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    let (w, h) = (image.width(), image.height());

    let channels: [GrayImage; CHANNELS] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; CHANNELS] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}

/// Push every pixel's L* away from the image's mean L* by `factor`.
///
/// Chroma is left alone and the result is clamped back into the sRGB
/// gamut. A factor of exactly `1.0` returns the image unchanged.
#[must_use = "returns the adjusted image"]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn stretch_lightness(image: &RgbImage, factor: f32) -> RgbImage {
    if (factor - 1.0).abs() < f32::EPSILON {
        return image.clone();
    }

    let labs: Vec<Lab> = image.pixels().map(|p| to_lab(Color::from(*p))).collect();
    if labs.is_empty() {
        return image.clone();
    }
    let mean = (labs.iter().map(|lab| f64::from(lab.l)).sum::<f64>() / labs.len() as f64) as f32;

    let mut out = image.clone();
    for (pixel, lab) in out.pixels_mut().zip(labs) {
        let l = (lab.l - mean).mul_add(factor, mean).clamp(0.0, 100.0);
        let c = from_lab(Lab::new(l, lab.a, lab.b));
        *pixel = image::Rgb([c.r, c.g, c.b]);
    }
    out
}

/// Blur, then stretch lightness, returning a new buffer of the same size.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] only if the buffer could not be
/// rebuilt, which a non-empty source rules out.
pub fn enhance(buffer: &PixelBuffer, params: &EnhanceParams) -> Result<PixelBuffer, PipelineError> {
    let blurred = gaussian_blur_rgb(buffer.as_rgb_image(), params.blur_sigma);
    let enhanced = PixelBuffer::from_rgb_image(stretch_lightness(&blurred, params.contrast))?;
    tracing::debug!(
        blur_sigma = params.blur_sigma,
        contrast = params.contrast,
        "source enhanced for palette reduction"
    );
    Ok(enhanced)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::color::lightness;

    /// Single-pixel black/white checkerboard.
    fn checkerboard(size: u32) -> PixelBuffer {
        PixelBuffer::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 { Color::BLACK } else { Color::WHITE }
        })
        .unwrap()
    }

    #[test]
    fn zero_sigma_returns_identical_image() {
        let source = checkerboard(8);
        let img = source.as_rgb_image();
        assert_eq!(&gaussian_blur_rgb(img, 0.0), img);
        assert_eq!(&gaussian_blur_rgb(img, -1.0), img);
    }

    #[test]
    fn blur_keeps_uniform_image() {
        let buffer = PixelBuffer::from_fn(12, 12, |_, _| Color::new(40, 120, 200)).unwrap();
        let blurred = gaussian_blur_rgb(buffer.as_rgb_image(), 2.0);
        for p in blurred.pixels() {
            assert_eq!(Color::from(*p), Color::new(40, 120, 200));
        }
    }

    #[test]
    fn blur_averages_checkerboard_channels() {
        let blurred = gaussian_blur_rgb(checkerboard(24).as_rgb_image(), 2.0);
        let center = Color::from(*blurred.get_pixel(12, 12));
        for channel in [center.r, center.g, center.b] {
            assert!((110..=145).contains(&channel), "{center}");
        }
    }

    #[test]
    fn unit_contrast_is_identity() {
        let source = checkerboard(6);
        assert_eq!(&stretch_lightness(source.as_rgb_image(), 1.0), source.as_rgb_image());
    }

    #[test]
    fn contrast_pushes_lightness_apart() {
        let dark = Color::new(90, 90, 90);
        let light = Color::new(160, 160, 160);
        let buffer =
            PixelBuffer::from_fn(10, 2, |_, y| if y == 0 { dark } else { light }).unwrap();
        let out = stretch_lightness(buffer.as_rgb_image(), 1.5);
        let new_dark = Color::from(*out.get_pixel(0, 0));
        let new_light = Color::from(*out.get_pixel(0, 1));
        assert!(lightness(new_dark) < lightness(dark) - 1.0);
        assert!(lightness(new_light) > lightness(light) + 1.0);
    }

    #[test]
    fn enhance_flattens_pixel_noise() {
        let params = EnhanceParams {
            blur_sigma: 2.0,
            contrast: 1.2,
        };
        let enhanced = enhance(&checkerboard(30), &params).unwrap();
        assert_eq!(enhanced.dimensions(), checkerboard(30).dimensions());
        for c in enhanced.colors() {
            for channel in [c.r, c.g, c.b] {
                assert!((60..=200).contains(&channel), "{c}");
            }
        }
    }
}
