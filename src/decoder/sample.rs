use std::fmt;

use half::f16;

/// A destination sample type of a decoded image.
///
/// Implemented for `u8`, `u16`, `u32`, [`f16`] and `f32`. Integer types span `0..=MAX`, float
/// types are nominally `0.0..=1.0` but keep whatever value the source stored.
pub trait Sample: Copy + Default + PartialEq + fmt::Debug + Send + 'static {
    /// Width of the type in bits.
    const BITS: u8;
    const IS_FLOAT: bool;
    /// Name used in diagnostics.
    const NAME: &'static str;
    /// Fully opaque alpha, full intensity.
    const UNIT: Self;
    /// Distance from one to the next representable value, zero for integers.
    const EPSILON: f64;
    /// Largest finite value.
    const MAX: f64;

    /// Truncating conversion of an integer sample of the same width.
    fn from_u32(value: u32) -> Self;
    /// Reinterprets the raw bits of a floating point sample of the same width.
    fn from_float_bits(bits: u32) -> Self;
    /// Rounds to the nearest representable value, saturating at the integer range.
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;

    /// `UNIT - self`.
    fn invert(self) -> Self;
    /// Moves a signed a*/b* value into the unsigned ICC Lab encoding.
    fn lab_offset(self) -> Self;

    fn unit_f64() -> f64 {
        Self::UNIT.to_f64()
    }
}

macro_rules! integer_sample {
    ($type:ty, $name:literal) => {
        impl Sample for $type {
            const BITS: u8 = <$type>::BITS as u8;
            const IS_FLOAT: bool = false;
            const NAME: &'static str = $name;
            const UNIT: Self = <$type>::MAX;
            const EPSILON: f64 = 0.0;
            const MAX: f64 = <$type>::MAX as f64;

            #[inline(always)]
            fn from_u32(value: u32) -> Self {
                value as $type
            }

            #[inline(always)]
            fn from_float_bits(bits: u32) -> Self {
                bits as $type
            }

            #[inline(always)]
            fn from_f64(value: f64) -> Self {
                value.round().clamp(0.0, <Self as Sample>::MAX) as $type
            }

            #[inline(always)]
            fn to_f64(self) -> f64 {
                f64::from(self)
            }

            #[inline(always)]
            fn invert(self) -> Self {
                <$type>::MAX - self
            }

            #[inline(always)]
            fn lab_offset(self) -> Self {
                // Adding half the range to the two's complement value is the same as flipping the
                // sign bit: -1 (all ones) lands just below the midpoint.
                self.wrapping_add(1 << (<$type>::BITS - 1))
            }
        }
    };
}

integer_sample!(u8, "u8");
integer_sample!(u16, "u16");
integer_sample!(u32, "u32");

impl Sample for f16 {
    const BITS: u8 = 16;
    const IS_FLOAT: bool = true;
    const NAME: &'static str = "f16";
    const UNIT: Self = f16::ONE;
    const EPSILON: f64 = 0.0009765625;
    const MAX: f64 = 65504.0;

    fn from_u32(value: u32) -> Self {
        f16::from_f32(value as f32)
    }

    #[inline(always)]
    fn from_float_bits(bits: u32) -> Self {
        f16::from_bits(bits as u16)
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        f16::from_f64(value)
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn invert(self) -> Self {
        f16::ONE - self
    }

    // Float Lab stores a*/b* as signed values already.
    fn lab_offset(self) -> Self {
        self
    }
}

impl Sample for f32 {
    const BITS: u8 = 32;
    const IS_FLOAT: bool = true;
    const NAME: &'static str = "f32";
    const UNIT: Self = 1.0;
    const EPSILON: f64 = f32::EPSILON as f64;
    const MAX: f64 = f32::MAX as f64;

    fn from_u32(value: u32) -> Self {
        value as f32
    }

    #[inline(always)]
    fn from_float_bits(bits: u32) -> Self {
        f32::from_bits(bits)
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn invert(self) -> Self {
        1.0 - self
    }

    fn lab_offset(self) -> Self {
        self
    }
}

/// How a raw sample of the source bit depth becomes a destination sample.
///
/// Chosen once per decode from the source depth, the source sample format and the destination
/// type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Rescale {
    /// Source and destination have the same integer width.
    Identity,
    /// Multiply by `dest_max / (2^depth - 1)`.
    Scale(f64),
    /// The sample is an IEEE float of the destination width.
    FloatBits,
}

impl Rescale {
    pub(crate) fn new<T: Sample>(bits_per_sample: u8, float_source: bool) -> Rescale {
        if float_source {
            Rescale::FloatBits
        } else if !T::IS_FLOAT && bits_per_sample == T::BITS {
            Rescale::Identity
        } else {
            Rescale::Scale(T::unit_f64() / source_max(bits_per_sample))
        }
    }

    #[inline(always)]
    pub(crate) fn apply<T: Sample>(self, raw: u32) -> T {
        match self {
            Rescale::Identity => T::from_u32(raw),
            Rescale::Scale(coeff) => T::from_f64(f64::from(raw) * coeff),
            Rescale::FloatBits => T::from_float_bits(raw),
        }
    }
}

fn source_max(bits_per_sample: u8) -> f64 {
    ((1u64 << bits_per_sample) - 1) as f64
}
