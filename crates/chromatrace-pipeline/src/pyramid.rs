//! Gaussian pyramid for multi-scale edge detection.
//!
//! Level 0 is the source itself and is never copied. Every further level
//! is the previous one blurred with [`PYRAMID_BLUR_SIGMA`] and halved with
//! a Lanczos3 filter. Edges found on coarse levels follow the large-scale
//! structure of the picture that fine texture hides at full resolution.

use image::imageops::FilterType;

use crate::preprocess::gaussian_blur_rgb;
use crate::types::{Dimensions, PipelineError, PixelBuffer};

/// Blur applied before each halving.
pub const PYRAMID_BLUR_SIGMA: f32 = 1.0;

/// Levels whose shorter side would fall below this are not built.
pub const MIN_LEVEL_SIDE: u32 = 16;

/// Downsampled copies of a source image, finest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pyramid {
    levels: Vec<PixelBuffer>,
}

impl Pyramid {
    /// A pyramid holding only the source level.
    #[must_use]
    pub const fn single() -> Self {
        Self { levels: Vec::new() }
    }

    /// Build up to `depth` levels, counting the source as the first.
    ///
    /// Stops early once halving would take the shorter side below
    /// [`MIN_LEVEL_SIDE`], so small images may get fewer levels than
    /// asked for.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] only if a level could not
    /// be wrapped, which the size check above rules out.
    pub fn build(source: &PixelBuffer, depth: u32) -> Result<Self, PipelineError> {
        let mut levels: Vec<PixelBuffer> = Vec::new();
        for _ in 1..depth {
            let previous = levels.last().unwrap_or(source).as_rgb_image();
            let (w, h) = (previous.width() / 2, previous.height() / 2);
            if w.min(h) < MIN_LEVEL_SIDE {
                break;
            }
            let blurred = gaussian_blur_rgb(previous, PYRAMID_BLUR_SIGMA);
            let halved = image::imageops::resize(&blurred, w, h, FilterType::Lanczos3);
            levels.push(PixelBuffer::from_rgb_image(halved)?);
        }
        tracing::debug!(levels = levels.len() + 1, "pyramid built");
        Ok(Self { levels })
    }

    /// The downsampled levels, excluding the source.
    #[must_use]
    pub fn levels(&self) -> &[PixelBuffer] {
        &self.levels
    }

    /// Number of levels including the source.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len() + 1
    }

    /// Dimensions of every downsampled level.
    #[must_use]
    pub fn level_dimensions(&self) -> Vec<Dimensions> {
        self.levels.iter().map(PixelBuffer::dimensions).collect()
    }
}
