//! Curve colours

use plotters::style::RGBColor;

/// Matplotlib's qualitative `tab20` map
pub const TAB20: [RGBColor; 20] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xae, 0xc7, 0xe8),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0xff, 0xbb, 0x78),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0x98, 0xdf, 0x8a),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0xff, 0x98, 0x96),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0xc5, 0xb0, 0xd5),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xc4, 0x9c, 0x94),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0xf7, 0xb6, 0xd2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xc7, 0xc7, 0xc7),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0xdb, 0xdb, 0x8d),
    RGBColor(0x17, 0xbe, 0xcf),
    RGBColor(0x9e, 0xda, 0xe5),
];

/// Study palette: purple, orange, green, gray, cyan, brown, blue, red,
/// olive, pink, black, magenta, yellow, teal, navy, maroon
pub const STUDY_PALETTE: [RGBColor; 16] = [
    RGBColor(0x80, 0x00, 0x80),
    RGBColor(0xff, 0xa5, 0x00),
    RGBColor(0x00, 0x80, 0x00),
    RGBColor(0x80, 0x80, 0x80),
    RGBColor(0x00, 0xff, 0xff),
    RGBColor(0xa5, 0x2a, 0x2a),
    RGBColor(0x00, 0x00, 0xff),
    RGBColor(0xff, 0x00, 0x00),
    RGBColor(0x80, 0x80, 0x00),
    RGBColor(0xff, 0xc0, 0xcb),
    RGBColor(0x00, 0x00, 0x00),
    RGBColor(0xff, 0x00, 0xff),
    RGBColor(0xff, 0xff, 0x00),
    RGBColor(0x00, 0x80, 0x80),
    RGBColor(0x00, 0x00, 0x80),
    RGBColor(0x80, 0x00, 0x00),
];

/// Reference overlays: red, then magenta
pub const REFERENCE_COLORS: [RGBColor; 2] = [RGBColor(0xff, 0x00, 0x00), RGBColor(0xbf, 0x00, 0xbf)];

/// Sample `tab20` at `x` in `[0, 1]`; out-of-range values are clamped
pub fn tab20(x: f64) -> RGBColor {
    let n = TAB20.len();
    let idx = if x.is_nan() || x <= 0.0 {
        0
    } else {
        ((x * n as f64).floor() as usize).min(n - 1)
    };
    TAB20[idx]
}

/// Colour of curve `index` out of `total`
pub fn curve_color(index: usize, total: usize) -> RGBColor {
    tab20(index as f64 / total.max(1) as f64)
}

pub fn study_color(index: usize) -> RGBColor {
    STUDY_PALETTE[index % STUDY_PALETTE.len()]
}

pub fn reference_color(index: usize) -> RGBColor {
    REFERENCE_COLORS[index % REFERENCE_COLORS.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab20_bins() {
        assert_eq!(tab20(0.0), TAB20[0]);
        assert_eq!(tab20(0.049), TAB20[0]);
        assert_eq!(tab20(0.05), TAB20[1]);
        assert_eq!(tab20(0.5), TAB20[10]);
        assert_eq!(tab20(1.0), TAB20[19]);
        assert_eq!(tab20(7.0), TAB20[19]);
        assert_eq!(tab20(-1.0), TAB20[0]);
    }

    #[test]
    fn test_curve_color_spreads_over_map() {
        // 3 curves over 4 slots land on 0, 0.25, 0.5
        assert_eq!(curve_color(0, 4), TAB20[0]);
        assert_eq!(curve_color(1, 4), TAB20[5]);
        assert_eq!(curve_color(2, 4), TAB20[10]);
        assert_eq!(curve_color(0, 0), TAB20[0]);
    }

    #[test]
    fn test_palettes_cycle() {
        assert_eq!(study_color(0), RGBColor(0x80, 0x00, 0x80));
        assert_eq!(study_color(16), study_color(0));
        assert_eq!(study_color(17), RGBColor(0xff, 0xa5, 0x00));
        assert_eq!(reference_color(0), RGBColor(0xff, 0x00, 0x00));
        assert_eq!(reference_color(2), reference_color(0));
    }
}
