//! Palette reduction: cluster pixel colors into a small palette.
//!
//! k-means++ seeding followed by Lloyd iterations over a uniform sample of
//! the image, in either RGB or CIE L*a*b*. The final palette colors are the
//! exact RGB means of the pixels assigned to each cluster, so a flat color
//! area reproduces its source color without drift. Entries that end up
//! perceptually indistinguishable are merged into the more frequent one,
//! and every pixel is finally assigned to its nearest surviving entry.
//!
//! The assignment step is data-parallel (`rayon`). Initialisation draws
//! from a keyed SipHash stream, so a fixed seed gives identical output.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::color;
use crate::config::{ColorSpace, PipelineConfig};
use crate::types::{Color, Dimensions, PipelineError, PixelBuffer};

/// Largest centroid movement (in feature units) still treated as converged.
pub const CONVERGENCE_EPSILON: f32 = 0.25;

/// Weight of the squared L* difference in the Lab metric. Chroma (a*, b*)
/// differences carry weight 1.
pub const LAB_LIGHTNESS_WEIGHT: f32 = 0.5;

/// One palette color and how many pixels it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    /// The representative color.
    pub color: Color,
    /// Number of pixels assigned to this entry.
    pub pixel_count: usize,
}

/// An ordered set of distinct colors, most frequent first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
    converged: bool,
    iterations: u32,
}

impl Palette {
    /// Entries ordered by descending pixel count.
    #[must_use]
    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// Number of colors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the palette has no colors.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Color of entry `index`, if it exists.
    #[must_use]
    pub fn color(&self, index: usize) -> Option<Color> {
        self.entries.get(index).map(|e| e.color)
    }

    /// The most frequent color.
    #[must_use]
    pub fn dominant(&self) -> Option<Color> {
        self.color(0)
    }

    /// Up to `n` colors ordered from darkest to lightest by channel sum.
    #[must_use]
    pub fn darkest(&self, n: usize) -> Vec<Color> {
        let mut colors: Vec<Color> = self.entries.iter().map(|e| e.color).collect();
        colors.sort_by_key(|c| c.channel_sum());
        colors.truncate(n);
        colors
    }

    /// Whether k-means refinement converged before its iteration cap.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.converged
    }

    /// Number of Lloyd iterations run.
    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }
}

/// Per-pixel palette indices in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteAssignment {
    dimensions: Dimensions,
    indices: Vec<u16>,
}

impl PaletteAssignment {
    /// Image dimensions the assignment covers.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Raw row-major indices.
    #[must_use]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    #[cfg(test)]
    fn index_at(&self, x: u32, y: u32) -> usize {
        let i = y as usize * self.dimensions.width as usize + x as usize;
        usize::from(self.indices[i])
    }
}

/// Output of palette reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedImage {
    /// The reduced palette.
    pub palette: Palette,
    /// Which palette entry each pixel maps to.
    pub assignment: PaletteAssignment,
}

/// Clusters pixel colors into a bounded palette.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteReducer {
    /// Maximum number of colors (k).
    pub max_colors: usize,
    /// Space in which distances are measured.
    pub color_space: ColorSpace,
    /// Lloyd iteration cap.
    pub max_iterations: u32,
    /// Initialisation seed; `None` draws a fresh one.
    pub seed: Option<u64>,
    /// Maximum number of sampled pixels used for clustering.
    pub sample_limit: usize,
    /// ΔE76 below which two entries are merged.
    pub merge_distance: f64,
}

impl PaletteReducer {
    /// Take the palette parameters from a pipeline configuration.
    #[must_use]
    pub const fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_colors: config.palette_size,
            color_space: config.color_space,
            max_iterations: config.palette_max_iterations,
            seed: config.seed,
            sample_limit: config.palette_sample_limit,
            merge_distance: config.palette_merge_distance,
        }
    }

    /// Reduce the colors of `buffer` to at most `max_colors` entries.
    ///
    /// Hitting the iteration cap is not an error: the best palette so far
    /// is returned with [`Palette::converged`] set to `false`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] if `max_colors` is
    /// zero or exceeds [`PipelineConfig::MAX_PALETTE_SIZE`].
    /// Returns [`PipelineError::InvalidInput`] if the image has no pixels.
    pub fn reduce(&self, buffer: &PixelBuffer) -> Result<QuantizedImage, PipelineError> {
        if self.max_colors == 0 || self.max_colors > PipelineConfig::MAX_PALETTE_SIZE {
            return Err(PipelineError::InvalidConfiguration(format!(
                "palette size must be in 1..={}, got {}",
                PipelineConfig::MAX_PALETTE_SIZE,
                self.max_colors
            )));
        }
        let pixels: Vec<Color> = buffer.colors().collect();
        if pixels.is_empty() {
            return Err(PipelineError::InvalidInput("image has no pixels".into()));
        }

        let space = self.color_space;
        let features: Vec<[f32; 3]> = pixels.par_iter().map(|&c| feature(space, c)).collect();

        let samples = stride_sample(&features, self.sample_limit.max(1));
        let mut rng = SeedStream::new(self.seed.unwrap_or_else(random_seed));
        let initial = kmeans_plus_plus(&samples, self.max_colors, space, &mut rng);
        let (centroids, converged, iterations) =
            lloyd(&samples, initial, space, self.max_iterations.max(1));

        if !converged {
            tracing::debug!(
                iterations,
                "palette clustering hit its iteration cap before converging"
            );
        }

        // Exact RGB means of each cluster's members over the whole image.
        let labels: Vec<usize> = features
            .par_iter()
            .map(|f| nearest(&centroids, f, space).0)
            .collect();
        let candidates = cluster_means(&pixels, &labels, centroids.len());

        let merged = merge_close(candidates, self.merge_distance);
        let (entries, indices) = assign_final(&features, &merged, space);

        tracing::debug!(
            colors = entries.len(),
            requested = self.max_colors,
            converged,
            iterations,
            "palette reduced"
        );

        Ok(QuantizedImage {
            palette: Palette {
                entries,
                converged,
                iterations,
            },
            assignment: PaletteAssignment {
                dimensions: buffer.dimensions(),
                indices,
            },
        })
    }
}

/// Clustering coordinates of a color.
fn feature(space: ColorSpace, c: Color) -> [f32; 3] {
    match space {
        ColorSpace::Rgb => [f32::from(c.r), f32::from(c.g), f32::from(c.b)],
        ColorSpace::Lab => {
            let lab = color::to_lab(c);
            [lab.l, lab.a, lab.b]
        }
    }
}

fn distance_squared(space: ColorSpace, a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    let w0 = match space {
        ColorSpace::Rgb => 1.0,
        ColorSpace::Lab => LAB_LIGHTNESS_WEIGHT,
    };
    (w0 * d0).mul_add(d0, d1.mul_add(d1, d2 * d2))
}

/// Index of and squared distance to the closest centroid.
fn nearest(centroids: &[[f32; 3]], f: &[f32; 3], space: ColorSpace) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = distance_squared(space, f, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Every `stride`-th feature so that at most `limit` remain.
fn stride_sample(features: &[[f32; 3]], limit: usize) -> Vec<[f32; 3]> {
    if features.len() <= limit {
        return features.to_vec();
    }
    let stride = features.len().div_ceil(limit);
    features.iter().step_by(stride).copied().collect()
}

/// k-means++ seeding.
///
/// Stops early once every sample coincides with a chosen centroid, so an
/// image with fewer distinct colors than `k` yields fewer centroids.
fn kmeans_plus_plus(
    samples: &[[f32; 3]],
    k: usize,
    space: ColorSpace,
    rng: &mut SeedStream,
) -> Vec<[f32; 3]> {
    let first = samples[rng.below(samples.len())];
    let mut centroids = vec![first];
    let mut min_d2: Vec<f32> = samples
        .par_iter()
        .map(|s| distance_squared(space, s, &first))
        .collect();

    while centroids.len() < k {
        let total: f64 = min_d2.iter().map(|&d| f64::from(d)).sum();
        if total <= 0.0 {
            break;
        }
        let target = rng.next_f64() * total;
        let mut acc = 0.0;
        let mut chosen = samples.len() - 1;
        for (i, &d) in min_d2.iter().enumerate() {
            acc += f64::from(d);
            if acc >= target && d > 0.0 {
                chosen = i;
                break;
            }
        }
        let next = samples[chosen];
        centroids.push(next);
        min_d2
            .par_iter_mut()
            .zip(samples.par_iter())
            .for_each(|(d, s)| *d = d.min(distance_squared(space, s, &next)));
    }
    centroids
}

/// Lloyd refinement. Returns the centroids, whether they converged, and
/// how many iterations ran. Empty clusters keep their previous centroid.
#[allow(clippy::cast_precision_loss)]
fn lloyd(
    samples: &[[f32; 3]],
    mut centroids: Vec<[f32; 3]>,
    space: ColorSpace,
    max_iterations: u32,
) -> (Vec<[f32; 3]>, bool, u32) {
    for iteration in 1..=max_iterations {
        let labels: Vec<usize> = samples
            .par_iter()
            .map(|s| nearest(&centroids, s, space).0)
            .collect();

        let mut sums = vec![[0.0f64; 3]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (s, &label) in samples.iter().zip(&labels) {
            for (acc, &v) in sums[label].iter_mut().zip(s) {
                *acc += f64::from(v);
            }
            counts[label] += 1;
        }

        let mut movement = 0.0f32;
        for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
            if count == 0 {
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let updated = sum.map(|v| (v / count as f64) as f32);
            let shift = distance_squared(ColorSpace::Rgb, centroid, &updated).sqrt();
            movement = movement.max(shift);
            *centroid = updated;
        }

        if movement < CONVERGENCE_EPSILON {
            return (centroids, true, iteration);
        }
    }
    (centroids, false, max_iterations)
}

/// Rounded RGB mean of each cluster's member pixels, with member counts.
/// Empty clusters are dropped. The result is sorted by descending count.
fn cluster_means(pixels: &[Color], labels: &[usize], k: usize) -> Vec<PaletteEntry> {
    let mut sums = vec![[0u64; 3]; k];
    let mut counts = vec![0usize; k];
    for (c, &label) in pixels.iter().zip(labels) {
        sums[label][0] += u64::from(c.r);
        sums[label][1] += u64::from(c.g);
        sums[label][2] += u64::from(c.b);
        counts[label] += 1;
    }

    let mut entries: Vec<PaletteEntry> = sums
        .iter()
        .zip(&counts)
        .filter(|&(_, &n)| n > 0)
        .map(|(sum, &n)| {
            let n = n as u64;
            let mean = |v: u64| u8::try_from((v + n / 2) / n).unwrap_or(u8::MAX);
            PaletteEntry {
                color: Color::new(mean(sum[0]), mean(sum[1]), mean(sum[2])),
                pixel_count: usize::try_from(n).unwrap_or(usize::MAX),
            }
        })
        .collect();
    entries.sort_by(|a, b| b.pixel_count.cmp(&a.pixel_count));
    entries
}

/// Greedily fold each entry into the first more frequent entry within
/// `merge_distance` (ΔE76). Input must be sorted by descending count.
fn merge_close(candidates: Vec<PaletteEntry>, merge_distance: f64) -> Vec<Color> {
    let mut kept: Vec<Color> = Vec::with_capacity(candidates.len());
    for entry in candidates {
        let duplicate = kept
            .iter()
            .any(|&k| k == entry.color || color::delta_e76(k, entry.color) < merge_distance);
        if !duplicate {
            kept.push(entry.color);
        }
    }
    kept
}

/// Assign every pixel to its nearest palette color, drop unused colors,
/// and order entries by descending frequency.
fn assign_final(
    features: &[[f32; 3]],
    colors: &[Color],
    space: ColorSpace,
) -> (Vec<PaletteEntry>, Vec<u16>) {
    let palette_features: Vec<[f32; 3]> = colors.iter().map(|&c| feature(space, c)).collect();
    let labels: Vec<usize> = features
        .par_iter()
        .map(|f| nearest(&palette_features, f, space).0)
        .collect();

    let mut counts = vec![0usize; colors.len()];
    for &label in &labels {
        counts[label] += 1;
    }

    let mut order: Vec<usize> = (0..colors.len()).filter(|&i| counts[i] > 0).collect();
    order.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));

    let mut remap = vec![0u16; colors.len()];
    for (new, &old) in order.iter().enumerate() {
        remap[old] = u16::try_from(new).unwrap_or(u16::MAX);
    }

    let entries = order
        .iter()
        .map(|&i| PaletteEntry {
            color: colors[i],
            pixel_count: counts[i],
        })
        .collect();
    let indices = labels.iter().map(|&l| remap[l]).collect();
    (entries, indices)
}

fn random_seed() -> u64 {
    RandomState::new().hash_one(0x6368_726f_6d61_u64)
}

/// Deterministic pseudo-random stream: SipHash-1-3 of a counter under a
/// seed-derived key.
struct SeedStream {
    key: (u64, u64),
    counter: u64,
}

impl SeedStream {
    const fn new(seed: u64) -> Self {
        Self {
            key: (seed, seed.rotate_left(32) ^ 0x9E37_79B9_7F4A_7C15),
            counter: 0,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(self.key.0, self.key.1);
        hasher.write_u64(self.counter);
        self.counter += 1;
        hasher.finish()
    }

    /// Uniform in `[0, 1)`.
    #[allow(clippy::cast_precision_loss)]
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `0..n` (`n > 0`).
    fn below(&mut self, n: usize) -> usize {
        let n = n as u64;
        usize::try_from(self.next_u64() % n).unwrap_or(0)
    }
}
