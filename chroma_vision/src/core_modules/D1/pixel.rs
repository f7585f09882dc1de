// THEORY (1D Pixel Heuristics):
// The `Pixel` module is the most fundamental unit of the analysis engine. It holds
// a single sample in two forms and the set of 1-dimensional heuristics that can be
// computed from that sample alone, with no knowledge of neighbors or of the image.
//
// - `Pixel`:           the raw 8-bit RGBA bytes, exactly as the raster stores them.
//                      This is what the spot RGB sample reports.
// - `NormalizedPixel`: channels scaled to [0, 1], still gamma-encoded. Every
//                      colorimetric heuristic starts from here.
//
// Heuristic families (all single-pixel, all delegating to `color_space`):
// - Hue / saturation / brightness (HSB), with the degenerate-hue policy
// - Linearized channels under a chosen gamma policy
// - XYZ tristimulus values under a chosen basis
// - Chromaticity: CIE-xy from XYZ, and normalized RGB (r', g', b')
//
// Anything that needs more than one pixel (matrices, aggregates, blocks) lives in
// higher modules.

pub mod pixel {
    use crate::core_modules::color_space::{
        self, Chromaticity, GammaPolicy, Hue, NormalizedRgb, Xyz, XyzMatrix,
    };
    use crate::error::VisionError;

    pub type Byte = u8;
    pub type Channel = Byte;
    pub type NormalizedChannel = f64;

    pub const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single 8-bit RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Self {
                red,
                green,
                blue,
                alpha,
            }
        }

        pub fn normalized(&self) -> NormalizedPixel {
            NormalizedPixel::new(
                self.red as NormalizedChannel / 255.0,
                self.green as NormalizedChannel / 255.0,
                self.blue as NormalizedChannel / 255.0,
                self.alpha as NormalizedChannel / 255.0,
            )
        }
    }

    impl TryFrom<&[Byte]> for Pixel {
        type Error = VisionError;

        /// Reads four bytes in R, G, B, A order.
        fn try_from(bytes: &[Byte]) -> Result<Self, Self::Error> {
            if bytes.len() != CHANNELS {
                return Err(VisionError::Decode(format!(
                    "cannot convert {} bytes into a pixel",
                    bytes.len()
                )));
            }
            Ok(Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3]))
        }
    }

    /// A pixel with every channel in [0, 1]. Derived and transient.
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct NormalizedPixel {
        pub red: NormalizedChannel,
        pub green: NormalizedChannel,
        pub blue: NormalizedChannel,
        pub alpha: NormalizedChannel,
    }

    impl NormalizedPixel {
        pub fn new(
            red: NormalizedChannel,
            green: NormalizedChannel,
            blue: NormalizedChannel,
            alpha: NormalizedChannel,
        ) -> Self {
            Self {
                red,
                green,
                blue,
                alpha,
            }
        }

        pub fn is_black(&self) -> bool {
            self.red == 0.0 && self.green == 0.0 && self.blue == 0.0
        }

        /// =================================Heuristics==================================

        /// Hue in [0, 1), forced to 0 for black and for saturation below `saturation_threshold`.
        pub fn hue(&self, saturation_threshold: f64) -> Hue {
            color_space::rgb_to_hue_with_threshold(
                self.red,
                self.green,
                self.blue,
                saturation_threshold,
            )
        }

        /// Gamma-decoded (R, G, B). Alpha is not gamma-encoded and is left out.
        pub fn linearized(&self, gamma: GammaPolicy) -> (f64, f64, f64) {
            (
                gamma.to_linear(self.red),
                gamma.to_linear(self.green),
                gamma.to_linear(self.blue),
            )
        }

        pub fn xyz(&self, gamma: GammaPolicy, matrix: XyzMatrix) -> Xyz {
            let (red, green, blue) = self.linearized(gamma);
            color_space::linear_rgb_to_xyz(red, green, blue, matrix)
        }

        /// CIE-xy, or `None` for a zero tristimulus sum.
        pub fn chromaticity_xy(
            &self,
            gamma: GammaPolicy,
            matrix: XyzMatrix,
        ) -> Option<Chromaticity> {
            color_space::xyz_to_chromaticity(&self.xyz(gamma, matrix))
        }

        /// Normalized RGB on the encoded channels, or `None` for black.
        pub fn normalized_chromaticity(&self) -> Option<NormalizedRgb> {
            color_space::rgb_to_normalized_chromaticity(self.red, self.green, self.blue)
        }
    }
}
