use color::{AlphaColor, Srgb};

/// Keeps every packed color a finite float: clearing the lowest alpha bit means the
/// exponent bits can never all be set
const PACKED_MASK: u32 = 0xfeff_ffff;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    inner: AlphaColor<Srgb>,
}

impl Color {
    /// Create a new Color from RGBA components in [0..1]
    pub const fn new(components: [f32; 4]) -> Self {
        Self {
            inner: AlphaColor::new(components),
        }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::new([r, g, b, a])
    }

    /// Get raw RGBA components
    pub fn components(&self) -> [f32; 4] {
        self.inner.components
    }

    pub fn alpha(&self) -> f32 {
        self.inner.components[3]
    }

    /// Packs the color into 32 bits, one byte per channel, alpha in the high byte
    pub fn to_abgr8888(&self) -> u32 {
        let [r, g, b, a] = self.inner.to_rgba8().to_u8_array();
        (a as u32) << 24 | (b as u32) << 16 | (g as u32) << 8 | r as u32
    }

    pub fn from_abgr8888(value: u32) -> Self {
        let channel = |shift: u32| ((value >> shift) & 0xff) as f32 / 255.0;
        Self::new([channel(0), channel(8), channel(16), channel(24)])
    }

    /// Packs the color into the bit pattern of a single float for compact vertex storage
    ///
    /// Lossy: alpha loses its lowest bit, see [`int_to_float_color`]
    pub fn to_float_bits(&self) -> f32 {
        int_to_float_color(self.to_abgr8888())
    }

    /// Inverse of [`to_float_bits`](Self::to_float_bits)
    pub fn from_float_bits(packed: f32) -> Self {
        Self::from_abgr8888(float_to_int_color(packed))
    }
}

/// Reinterprets an ABGR8888 value as a float, masking off the lowest alpha bit
///
/// Alpha keeps 128 of its 256 values (0, 2, .., 254); decoding rescales by 255/254 so
/// that opaque stays opaque.
pub fn int_to_float_color(abgr: u32) -> f32 {
    f32::from_bits(abgr & PACKED_MASK)
}

/// Recovers the ABGR8888 value from a packed float, stretching alpha back to 0..=255
pub fn float_to_int_color(packed: f32) -> u32 {
    let bits = packed.to_bits();
    let alpha = ((bits >> 24) as f32 * (255.0 / 254.0)) as u32;
    (bits & 0x00ff_ffff) | alpha.min(255) << 24
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const BLACK: Color = Self {
        inner: AlphaColor::BLACK,
    };
    pub const WHITE: Color = Self {
        inner: AlphaColor::WHITE,
    };
    pub const TRANSPARENT: Color = Self {
        inner: AlphaColor::TRANSPARENT,
    };
    pub const RED: Color = Self {
        inner: AlphaColor::new([1., 0., 0., 1.]),
    };
    pub const GREEN: Color = Self {
        inner: AlphaColor::new([0., 1., 0., 1.]),
    };
    pub const BLUE: Color = Self {
        inner: AlphaColor::new([0., 0., 1., 1.]),
    };
}

impl From<[f32; 4]> for Color {
    fn from(value: [f32; 4]) -> Self {
        Self::new(value)
    }
}

// Convert Color to wgpu::Color (f64 RGBA)
impl From<Color> for wgpu::Color {
    fn from(value: Color) -> Self {
        let [r, g, b, a] = value.components();
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: f32 = 1.0 / 255.0;

    #[test]
    fn white_packs_to_masked_bits() {
        assert_eq!(Color::WHITE.to_abgr8888(), 0xffff_ffff);
        assert_eq!(Color::WHITE.to_float_bits().to_bits(), 0xfeff_ffff);
    }

    #[test]
    fn channels_land_in_abgr_order() {
        let packed = Color::rgba(1.0, 0.0, 0.0, 0.0).to_abgr8888();
        assert_eq!(packed, 0x0000_00ff);
        let packed = Color::rgba(0.0, 0.0, 1.0, 0.0).to_abgr8888();
        assert_eq!(packed, 0x00ff_0000);
    }

    #[test]
    fn round_trip_stays_within_one_step() {
        let levels = [0.0, 0.1, 0.25, 0.5, 0.66, 0.9, 1.0];
        for &r in &levels {
            for &g in &levels {
                for &b in &levels {
                    for &a in &levels {
                        // alpha only keeps even byte values
                        let a = ((a * 127.0_f32).round() * 2.0) / 254.0;
                        let color = Color::rgba(r, g, b, a);
                        let back = Color::from_float_bits(color.to_float_bits()).components();
                        // one quantization step for color, two for the masked alpha
                        let tolerances = [STEP, STEP, STEP, 2.0 * STEP];
                        for ((got, want), tolerance) in
                            back.iter().zip([r, g, b, a]).zip(tolerances)
                        {
                            assert!(
                                (got - want).abs() <= tolerance,
                                "{got} vs {want} for {:?}",
                                color.components()
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn opaque_alpha_survives_packing() {
        let back = Color::from_float_bits(Color::rgba(0.2, 0.4, 0.6, 1.0).to_float_bits());
        assert_eq!(back.alpha(), 1.0);
    }

    #[test]
    fn packed_colors_are_never_nan() {
        for alpha in 0..=255u32 {
            for blue in [0u32, 0x7f, 0x80, 0xff] {
                let packed = int_to_float_color(alpha << 24 | blue << 16 | 0xffff);
                assert!(!packed.is_nan(), "alpha {alpha} blue {blue}");
            }
        }
    }
}
