//! Tonal separation: every pixel classified as shadow, midtone, or
//! highlight by its CIE L* lightness.
//!
//! The highlight accent layer samples the highlight range of this map, and
//! the per-range pixel counts are surfaced through diagnostics.

use image::Pixel;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::lightness;
use crate::types::{CHANNELS, Color, Dimensions, PixelBuffer};

/// L* below which a pixel is a shadow.
pub const SHADOW_LIGHTNESS: f32 = 30.0;
/// L* above which a pixel is a highlight.
pub const HIGHLIGHT_LIGHTNESS: f32 = 70.0;
/// Luma a highlight pixel must exceed to carry a highlight accent.
pub const HIGHLIGHT_ACCENT_LUMA: u8 = 200;

/// Tonal range of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tone {
    /// L* below [`SHADOW_LIGHTNESS`].
    Shadow,
    /// Everything between the two thresholds, inclusive.
    Midtone,
    /// L* above [`HIGHLIGHT_LIGHTNESS`].
    Highlight,
}

impl Tone {
    /// Classify an L* value.
    #[must_use]
    pub fn of_lightness(l: f32) -> Self {
        if l < SHADOW_LIGHTNESS {
            Self::Shadow
        } else if l > HIGHLIGHT_LIGHTNESS {
            Self::Highlight
        } else {
            Self::Midtone
        }
    }

    /// Classify a color.
    #[must_use]
    pub fn of(color: Color) -> Self {
        Self::of_lightness(lightness(color))
    }
}

/// Pixel counts per tonal range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneCounts {
    /// Pixels below [`SHADOW_LIGHTNESS`].
    pub shadows: usize,
    /// Pixels between the thresholds.
    pub midtones: usize,
    /// Pixels above [`HIGHLIGHT_LIGHTNESS`].
    pub highlights: usize,
}

/// Per-pixel tones of a buffer, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TonalMap {
    dimensions: Dimensions,
    tones: Vec<Tone>,
}

impl TonalMap {
    /// Classify every pixel of `buffer`.
    #[must_use]
    pub fn new(buffer: &PixelBuffer) -> Self {
        let tones = buffer
            .as_rgb_image()
            .as_raw()
            .par_chunks_exact(CHANNELS)
            .map(|c| Tone::of(Color::new(c[0], c[1], c[2])))
            .collect();
        Self {
            dimensions: buffer.dimensions(),
            tones,
        }
    }

    /// Dimensions of the classified image.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Tone of the pixel at `(x, y)`, or `None` outside the image.
    #[must_use]
    pub fn tone_at(&self, x: u32, y: u32) -> Option<Tone> {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return None;
        }
        let i = y as usize * self.dimensions.width as usize + x as usize;
        self.tones.get(i).copied()
    }

    /// How many pixels fall in each range.
    #[must_use]
    pub fn counts(&self) -> ToneCounts {
        self.tones
            .iter()
            .fold(ToneCounts::default(), |mut counts, tone| {
                match tone {
                    Tone::Shadow => counts.shadows += 1,
                    Tone::Midtone => counts.midtones += 1,
                    Tone::Highlight => counts.highlights += 1,
                }
                counts
            })
    }

    /// Whether the pixel at `(x, y)` qualifies for a highlight accent: a
    /// highlight-range pixel that is also bright in luma.
    #[must_use]
    pub fn is_accent(&self, buffer: &PixelBuffer, x: u32, y: u32) -> bool {
        self.tone_at(x, y) == Some(Tone::Highlight)
            && buffer.as_rgb_image().get_pixel(x, y).to_luma().0[0] > HIGHLIGHT_ACCENT_LUMA
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_split_the_gray_ramp() {
        assert_eq!(Tone::of(Color::BLACK), Tone::Shadow);
        assert_eq!(Tone::of(Color::new(128, 128, 128)), Tone::Midtone);
        assert_eq!(Tone::of(Color::WHITE), Tone::Highlight);
        assert_eq!(Tone::of_lightness(SHADOW_LIGHTNESS), Tone::Midtone);
        assert_eq!(Tone::of_lightness(HIGHLIGHT_LIGHTNESS), Tone::Midtone);
    }

    #[test]
    fn counts_cover_every_pixel() {
        // Three vertical bands: black, mid gray, white.
        let buffer = PixelBuffer::from_fn(30, 4, |x, _| match x / 10 {
            0 => Color::BLACK,
            1 => Color::new(128, 128, 128),
            _ => Color::WHITE,
        })
        .unwrap();
        let map = TonalMap::new(&buffer);
        assert_eq!(
            map.counts(),
            ToneCounts {
                shadows: 40,
                midtones: 40,
                highlights: 40,
            }
        );
        assert_eq!(map.tone_at(25, 3), Some(Tone::Highlight));
        assert_eq!(map.tone_at(30, 0), None);
    }

    #[test]
    fn accent_needs_bright_luma_too() {
        // Both are highlights by L*, but the light cyan sits below the
        // accent luma.
        let pale = Color::new(250, 250, 210);
        let cyan = Color::new(120, 210, 200);
        let buffer = PixelBuffer::from_fn(2, 1, |x, _| if x == 0 { pale } else { cyan }).unwrap();
        let map = TonalMap::new(&buffer);
        assert_eq!(map.tone_at(1, 0), Some(Tone::Highlight));
        assert!(map.is_accent(&buffer, 0, 0));
        assert!(!map.is_accent(&buffer, 1, 0));
    }
}
