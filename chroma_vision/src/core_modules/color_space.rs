// THEORY:
// The `color_space` module is the Color-Space Converter: the leaf of the whole
// engine. Every function here is pure and works on a single RGB sample whose
// channels are already normalized to [0, 1]. Nothing in this file knows about
// images, buffers or statistics; the `Pixel` container and the builders above
// it call into these functions and decide what to do with the results.
//
// Two policy axes exist because the reference pipelines disagree with each other:
// 1.  **Gamma decoding**: a plain power law (c^2.2) and the piecewise sRGB curve.
// 2.  **Tristimulus basis**: a CIE RGB / Illuminant-E matrix and the sRGB-D65
//     matrix. The CIE-E matrix is the default and must be kept exactly as written.
//
// Degenerate inputs never raise. Chromaticity divides return `None` when the
// denominator is zero so callers can skip-and-exclude, and hue is forced to 0
// for black and near-gray pixels.

use serde::{Deserialize, Serialize};

pub type Hue = f64;
pub type Saturation = f64;
pub type Brightness = f64;

/// Exponent used by [`GammaPolicy::PowerLaw`].
pub const POWER_LAW_GAMMA: f64 = 2.2;

/// Pixels whose HSB saturation falls below this are treated as hue-undefined.
pub const DEFAULT_SATURATION_THRESHOLD: f64 = 0.1;

/// CIE RGB (Illuminant E) to XYZ, row-major.
pub const CIE_E_MATRIX: [[f64; 3]; 3] = [
    [0.4887180, 0.3106803, 0.2006017],
    [0.1762044, 0.8129847, 0.0108109],
    [0.0000000, 0.0102048, 0.9897952],
];

/// Linear sRGB (D65) to XYZ, row-major.
pub const SRGB_D65_MATRIX: [[f64; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

/// How gamma-encoded channels are decoded to linear light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GammaPolicy {
    /// `c^2.2`
    #[default]
    PowerLaw,
    /// `c/12.92` below 0.04045, `((c+0.055)/1.055)^2.4` above.
    PiecewiseSrgb,
}

impl GammaPolicy {
    #[inline]
    pub fn to_linear(self, c: f64) -> f64 {
        match self {
            GammaPolicy::PowerLaw => c.powf(POWER_LAW_GAMMA),
            GammaPolicy::PiecewiseSrgb => {
                if c <= 0.04045 {
                    c / 12.92
                } else {
                    ((c + 0.055) / 1.055).powf(2.4)
                }
            }
        }
    }
}

/// Which RGB → XYZ basis to apply after linearization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum XyzMatrix {
    #[default]
    CieE,
    SrgbD65,
}

impl XyzMatrix {
    pub fn coefficients(self) -> &'static [[f64; 3]; 3] {
        match self {
            XyzMatrix::CieE => &CIE_E_MATRIX,
            XyzMatrix::SrgbD65 => &SRGB_D65_MATRIX,
        }
    }
}

/// CIE XYZ tristimulus values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Xyz {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sum(&self) -> f64 {
        self.x + self.y + self.z
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

impl std::ops::Add for Xyz {
    type Output = Xyz;

    fn add(self, other: Xyz) -> Xyz {
        Xyz::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::AddAssign for Xyz {
    fn add_assign(&mut self, other: Xyz) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

/// A 2-D chromaticity coordinate. For CIE-xy this is (x, y); for
/// normalized RGB it is (r', g').
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Chromaticity {
    pub x: f64,
    pub y: f64,
}

impl Chromaticity {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Normalized-RGB chromaticity: each channel divided by `r + g + b`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedRgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl NormalizedRgb {
    /// The (r', g') projection used for 2-D statistics.
    pub fn rg(&self) -> Chromaticity {
        Chromaticity::new(self.r, self.g)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsb {
    /// In [0, 1).
    pub hue: Hue,
    pub saturation: Saturation,
    pub brightness: Brightness,
}

/// Gamma-decodes one channel.
#[inline]
pub fn to_linear(c: f64, policy: GammaPolicy) -> f64 {
    policy.to_linear(c)
}

/// Applies the chosen basis to already-linear RGB.
#[inline]
pub fn linear_rgb_to_xyz(r: f64, g: f64, b: f64, matrix: XyzMatrix) -> Xyz {
    let m = matrix.coefficients();
    Xyz::new(
        m[0][0] * r + m[0][1] * g + m[0][2] * b,
        m[1][0] * r + m[1][1] * g + m[1][2] * b,
        m[2][0] * r + m[2][1] * g + m[2][2] * b,
    )
}

/// Linearizes each channel per `gamma`, then applies `matrix`.
#[inline]
pub fn rgb_to_xyz(r: f64, g: f64, b: f64, gamma: GammaPolicy, matrix: XyzMatrix) -> Xyz {
    linear_rgb_to_xyz(gamma.to_linear(r), gamma.to_linear(g), gamma.to_linear(b), matrix)
}

/// `x = X/(X+Y+Z)`, `y = Y/(X+Y+Z)`. `None` when the sum is not positive.
#[inline]
pub fn xyz_to_chromaticity(xyz: &Xyz) -> Option<Chromaticity> {
    let sum = xyz.sum();
    if !(sum > 0.0) {
        return None;
    }
    Some(Chromaticity::new(xyz.x / sum, xyz.y / sum))
}

/// Divides each channel by `r + g + b`. `None` when the sum is not positive.
#[inline]
pub fn rgb_to_normalized_chromaticity(r: f64, g: f64, b: f64) -> Option<NormalizedRgb> {
    let sum = r + g + b;
    if !(sum > 0.0) {
        return None;
    }
    Some(NormalizedRgb {
        r: r / sum,
        g: g / sum,
        b: b / sum,
    })
}

/// Standard HSB decomposition with hue in [0, 1).
pub fn rgb_to_hsb(r: f64, g: f64, b: f64) -> Hsb {
    let maximum_channel = r.max(g.max(b));
    let minimum_channel = r.min(g.min(b));
    let chroma = maximum_channel - minimum_channel;

    let saturation = if maximum_channel > 0.0 {
        chroma / maximum_channel
    } else {
        0.0
    };

    if chroma <= 0.0 {
        return Hsb {
            hue: 0.0,
            saturation,
            brightness: maximum_channel,
        };
    }

    let sector = if maximum_channel == r {
        (g - b) / chroma
    } else if maximum_channel == g {
        (b - r) / chroma + 2.0
    } else {
        (r - g) / chroma + 4.0
    };

    let mut hue = sector / 6.0;
    if hue < 0.0 {
        hue += 1.0;
    }
    if hue >= 1.0 {
        hue -= 1.0;
    }

    Hsb {
        hue,
        saturation,
        brightness: maximum_channel,
    }
}

/// Hue with the reference degenerate-pixel policy: 0 for pure black and for
/// any pixel whose saturation is below [`DEFAULT_SATURATION_THRESHOLD`].
pub fn rgb_to_hue(r: f64, g: f64, b: f64) -> Hue {
    rgb_to_hue_with_threshold(r, g, b, DEFAULT_SATURATION_THRESHOLD)
}

pub fn rgb_to_hue_with_threshold(r: f64, g: f64, b: f64, saturation_threshold: f64) -> Hue {
    if r == 0.0 && g == 0.0 && b == 0.0 {
        return 0.0;
    }
    let hsb = rgb_to_hsb(r, g, b);
    if hsb.saturation < saturation_threshold {
        return 0.0;
    }
    hsb.hue
}

/// Inverse of [`rgb_to_hsb`], used to paint hue cells.
pub fn hsb_to_rgb(hue: Hue, saturation: Saturation, brightness: Brightness) -> (f64, f64, f64) {
    if saturation <= 0.0 {
        return (brightness, brightness, brightness);
    }
    // A tiny negative hue wraps to exactly 1.0, which is red again.
    let h = hue.rem_euclid(1.0) * 6.0;
    let h = if h >= 6.0 { 0.0 } else { h };
    let sector = h.floor();
    let fraction = h - sector;
    let p = brightness * (1.0 - saturation);
    let q = brightness * (1.0 - saturation * fraction);
    let t = brightness * (1.0 - saturation * (1.0 - fraction));
    match sector as u8 {
        0 => (brightness, t, p),
        1 => (q, brightness, p),
        2 => (p, brightness, t),
        3 => (p, q, brightness),
        4 => (t, p, brightness),
        _ => (brightness, p, q),
    }
}
