//! Region extraction: group pixels by their palette color.
//!
//! A region is *every* pixel carrying one palette index, whether or not
//! those pixels are spatially connected. Groups smaller than the
//! configured minimum are dropped as noise and only counted.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::quantize::QuantizedImage;
use crate::types::{Color, PixelCoord};

/// Inclusive pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Leftmost column.
    pub min_x: u32,
    /// Topmost row.
    pub min_y: u32,
    /// Rightmost column.
    pub max_x: u32,
    /// Bottom row.
    pub max_y: u32,
}

impl Bounds {
    /// Bounds covering a single pixel.
    #[must_use]
    pub const fn at(p: PixelCoord) -> Self {
        Self {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
        }
    }

    /// Grow to include `p`.
    pub fn include(&mut self, p: PixelCoord) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// All pixels of one palette color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Index into the palette.
    pub palette_index: usize,
    /// The palette color.
    pub color: Color,
    /// Member pixels in row-major order. Never empty.
    pub pixels: Vec<PixelCoord>,
    /// Bounding box of `pixels`.
    pub bounds: Bounds,
}

/// A region rendered as a binary bitmap with a one-pixel empty margin.
///
/// Pixel `(x, y)` of the region sits at `(x - origin.0, y - origin.1)` in
/// `image`; members are 255, everything else 0. The margin guarantees
/// that image-exterior neighbours read as "outside".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMask {
    /// Image coordinate of the mask's `(0, 0)` pixel (may be -1).
    pub origin: (i64, i64),
    /// The bitmap.
    pub image: GrayImage,
}

impl RegionMask {
    /// Whether the image-space pixel `(x, y)` belongs to the region.
    #[must_use]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        let (lx, ly) = (x - self.origin.0, y - self.origin.1);
        match (u32::try_from(lx), u32::try_from(ly)) {
            (Ok(lx), Ok(ly)) if lx < self.image.width() && ly < self.image.height() => {
                self.image.get_pixel(lx, ly).0[0] > 0
            }
            _ => false,
        }
    }
}

impl Region {
    /// Number of member pixels.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Rasterise the region into a padded binary mask.
    #[must_use]
    pub fn mask(&self) -> RegionMask {
        let origin = (
            i64::from(self.bounds.min_x) - 1,
            i64::from(self.bounds.min_y) - 1,
        );
        let mut image = GrayImage::new(self.bounds.width() + 2, self.bounds.height() + 2);
        for p in &self.pixels {
            image.put_pixel(
                p.x - self.bounds.min_x + 1,
                p.y - self.bounds.min_y + 1,
                image::Luma([255]),
            );
        }
        RegionMask { origin, image }
    }
}

/// Output of region extraction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionSet {
    /// Kept regions, largest first (ties broken by palette index).
    pub regions: Vec<Region>,
    /// Number of color groups discarded as noise.
    pub discarded_groups: usize,
    /// Total pixels in discarded groups.
    pub discarded_pixels: usize,
}

/// Partitions a quantized image into same-color regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionExtractor {
    /// Groups with fewer pixels than this are discarded.
    pub min_region_pixels: usize,
}

impl RegionExtractor {
    /// Create an extractor with the given noise threshold.
    #[must_use]
    pub const fn new(min_region_pixels: usize) -> Self {
        Self { min_region_pixels }
    }

    /// Group every pixel by palette index.
    #[must_use = "returns the extracted regions"]
    pub fn extract(&self, quantized: &QuantizedImage) -> RegionSet {
        let dims = quantized.assignment.dimensions();
        let mut groups: Vec<Option<Region>> = vec![None; quantized.palette.len()];

        let mut indices = quantized.assignment.indices().iter();
        for y in 0..dims.height {
            for x in 0..dims.width {
                let Some(&index) = indices.next() else {
                    break;
                };
                let index = usize::from(index);
                let Some(slot) = groups.get_mut(index) else {
                    continue;
                };
                let p = PixelCoord::new(x, y);
                match slot {
                    Some(region) => {
                        region.pixels.push(p);
                        region.bounds.include(p);
                    }
                    None => {
                        *slot = Some(Region {
                            palette_index: index,
                            color: quantized.palette.color(index).unwrap_or(Color::BLACK),
                            pixels: vec![p],
                            bounds: Bounds::at(p),
                        });
                    }
                }
            }
        }

        let mut set = RegionSet::default();
        for region in groups.into_iter().flatten() {
            if region.pixel_count() < self.min_region_pixels {
                set.discarded_groups += 1;
                set.discarded_pixels += region.pixel_count();
            } else {
                set.regions.push(region);
            }
        }
        set.regions.sort_by(|a, b| {
            b.pixel_count()
                .cmp(&a.pixel_count())
                .then(a.palette_index.cmp(&b.palette_index))
        });

        tracing::debug!(
            regions = set.regions.len(),
            discarded = set.discarded_groups,
            discarded_pixels = set.discarded_pixels,
            "regions extracted"
        );
        set
    }
}
