//! Color-space helpers built on the `palette` crate.
//!
//! Palette reduction, merging, and highlight detection all reason about
//! perceptual distance in CIE L*a*b* (D65 white point).

use palette::{FromColor, Lab, Srgb};

use crate::types::Color;

/// Convert an 8-bit sRGB color to CIE L*a*b*.
#[must_use]
pub fn to_lab(color: Color) -> Lab {
    Lab::from_color(Srgb::new(color.r, color.g, color.b).into_format::<f32>())
}

/// Convert CIE L*a*b* back to 8-bit sRGB, clamping out-of-gamut values.
#[must_use]
pub fn from_lab(lab: Lab) -> Color {
    let srgb: Srgb<u8> = Srgb::from_color(lab).into_format();
    Color::new(srgb.red, srgb.green, srgb.blue)
}

/// CIE76 color difference (Euclidean distance in L*a*b*).
#[must_use]
pub fn delta_e76(a: Color, b: Color) -> f64 {
    let (la, lb) = (to_lab(a), to_lab(b));
    let dl = f64::from(la.l - lb.l);
    let da = f64::from(la.a - lb.a);
    let db = f64::from(la.b - lb.b);
    dl.mul_add(dl, da.mul_add(da, db * db)).sqrt()
}

/// L* lightness of a color, in `[0, 100]`.
#[must_use]
pub fn lightness(color: Color) -> f32 {
    to_lab(color).l
}
