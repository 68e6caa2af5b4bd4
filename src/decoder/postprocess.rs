use super::sample::Sample;
use crate::tags::PhotometricInterpretation;

/// A caller supplied conversion applied in place to every fully assembled pixel.
///
/// This is where an ICC device link or similar color management transform plugs in; the
/// slice holds all channels of one pixel in destination order.
pub type ColorTransform<T> = Box<dyn FnMut(&mut [T]) + Send>;

/// Fix-ups applied to the color channels of a decoded pixel.
///
/// Alpha is never touched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PostProcessor {
    #[default]
    None,
    /// `WhiteIsZero` images: every color value becomes `max - value`.
    Invert,
    /// CIE L*a*b* images: the signed a* and b* channels are biased by half the range to give
    /// the unsigned ICC Lab encoding. L* is left alone.
    CieLabToIccLab,
}

impl PostProcessor {
    pub fn for_photometric(photometric: PhotometricInterpretation) -> Self {
        match photometric {
            PhotometricInterpretation::WhiteIsZero => PostProcessor::Invert,
            PhotometricInterpretation::CIELab => PostProcessor::CieLabToIccLab,
            _ => PostProcessor::None,
        }
    }

    /// Applies the fix-up to the color channels at `color_positions` of `pixel`.
    #[inline]
    pub fn apply<T: Sample>(self, pixel: &mut [T], color_positions: &[usize]) {
        match self {
            PostProcessor::None => {}
            PostProcessor::Invert => {
                for &pos in color_positions {
                    pixel[pos] = pixel[pos].invert();
                }
            }
            PostProcessor::CieLabToIccLab => {
                for &pos in color_positions.iter().skip(1) {
                    pixel[pos] = pixel[pos].lab_offset();
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invert_leaves_alpha() {
        let mut pixel = [0x10u8, 0x00, 0xff, 0x42];
        PostProcessor::Invert.apply(&mut pixel, &[0, 1, 2]);
        assert_eq!(pixel, [0xef, 0xff, 0x00, 0x42]);
    }

    #[test]
    fn lab_offsets_chroma_only() {
        let mut pixel = [0x33u8, 0x00, 0xff, 0xff];
        PostProcessor::CieLabToIccLab.apply(&mut pixel, &[0, 1, 2]);
        assert_eq!(pixel, [0x33, 0x80, 0x7f, 0xff]);

        let mut pixel = [1000u16, 0xffff, 0x0001, 0xffff];
        PostProcessor::CieLabToIccLab.apply(&mut pixel, &[0, 1, 2]);
        assert_eq!(pixel, [1000, 0x7fff, 0x8001, 0xffff]);
    }

    #[test]
    fn photometric_selection() {
        assert_eq!(
            PostProcessor::for_photometric(PhotometricInterpretation::WhiteIsZero),
            PostProcessor::Invert
        );
        assert_eq!(
            PostProcessor::for_photometric(PhotometricInterpretation::CIELab),
            PostProcessor::CieLabToIccLab
        );
        assert_eq!(
            PostProcessor::for_photometric(PhotometricInterpretation::IccLab),
            PostProcessor::None
        );
    }
}
