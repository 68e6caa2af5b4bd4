//! Writing decoded samples into pixel buffers
//!
//! A writer pulls the samples of one row of a chunk from a [`SampleStream`], rescales them to
//! the destination type and stores them at their channel positions.

use super::alpha;
use super::bitstream::SampleStream;
use super::buffer::ImageBuffer;
use super::postprocess::{ColorTransform, PostProcessor};
use super::sample::{Rescale, Sample};
use crate::error::{TiffFormatError, UsageError};
use crate::tags::SampleFormat;
use crate::TiffResult;

/// Maps source channel order to positions within a destination pixel.
///
/// Destination pixels always have one alpha channel after (or between) the color channels,
/// which is fully opaque unless the source provides alpha.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelLayout {
    color: Vec<usize>,
    alpha: usize,
}

impl ChannelLayout {
    /// `color[i]` is the destination position of source color sample `i`.
    pub fn new(color: Vec<usize>, alpha: usize) -> Self {
        ChannelLayout { color, alpha }
    }

    /// Color channels in source order followed by alpha.
    pub fn identity(color_samples: usize) -> Self {
        ChannelLayout {
            color: (0..color_samples).collect(),
            alpha: color_samples,
        }
    }

    /// RGB source samples stored as BGRA pixels.
    pub fn bgra() -> Self {
        ChannelLayout {
            color: vec![2, 1, 0],
            alpha: 3,
        }
    }

    pub fn color(&self) -> &[usize] {
        &self.color
    }

    pub fn alpha(&self) -> usize {
        self.alpha
    }

    /// Channels of a destination pixel.
    pub fn channels(&self) -> usize {
        self.color.len() + 1
    }

    /// Checks for `color_samples` colors and a distinct position per channel within the pixel.
    pub(crate) fn check(&self, color_samples: usize) -> TiffResult<()> {
        if self.color.len() != color_samples {
            return Err(UsageError::ChannelCountMismatch(color_samples, self.color.len()).into());
        }

        let channels = self.channels();
        let mut taken = vec![false; channels];
        for &pos in self.color.iter().chain(Some(&self.alpha)) {
            match taken.get_mut(pos) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(UsageError::InvalidChannelPosition(pos, channels).into()),
            }
        }
        Ok(())
    }
}

/// What the source stores for every pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceSamples {
    pub bits_per_sample: u8,
    pub sample_format: SampleFormat,
    pub color_samples: u16,
    pub extra_samples: u16,
    /// Index among the extra samples of the one holding alpha.
    pub alpha: Option<usize>,
    /// Color samples are premultiplied by alpha.
    pub premultiplied: bool,
}

impl SourceSamples {
    pub(crate) fn rescale<T: Sample>(&self) -> Rescale {
        Rescale::new::<T>(
            self.bits_per_sample,
            self.sample_format == SampleFormat::IEEEFP,
        )
    }

    pub(crate) fn check(&self) -> TiffResult<()> {
        match self.alpha {
            Some(index) if index >= usize::from(self.extra_samples) => Err(
                TiffFormatError::InvalidAlphaIndex(index, usize::from(self.extra_samples)).into(),
            ),
            _ => Ok(()),
        }
    }

    /// Reads the extra samples of a pixel, storing alpha at `alpha_pos` and dropping the rest.
    #[inline]
    pub(crate) fn read_extras<T: Sample>(
        &self,
        stream: &mut SampleStream<'_>,
        rescale: Rescale,
        pixel: &mut [T],
        alpha_pos: usize,
    ) {
        pixel[alpha_pos] = T::UNIT;
        for index in 0..usize::from(self.extra_samples) {
            let raw = stream.next_value();
            if self.alpha == Some(index) {
                pixel[alpha_pos] = rescale.apply(raw);
            }
        }
    }
}

/// Consumes the samples of one row of a chunk.
pub trait RowWriter {
    /// Decodes `width` pixels starting at `(x, y)` from `stream`, which is positioned at the
    /// start of the row.
    ///
    /// Returns how many image rows the call filled.
    fn copy_row(&mut self, x: u32, y: u32, width: u32, stream: &mut SampleStream<'_>) -> u32;
}

/// Writes one pixel per position from interleaved color and extra samples.
pub struct ChannelWriter<T: Sample> {
    image: ImageBuffer<T>,
    source: SourceSamples,
    layout: ChannelLayout,
    rescale: Rescale,
    postprocess: PostProcessor,
    transform: Option<ColorTransform<T>>,
    scratch: Vec<T>,
}

impl<T: Sample> ChannelWriter<T> {
    pub fn new(
        image: ImageBuffer<T>,
        source: SourceSamples,
        layout: ChannelLayout,
    ) -> TiffResult<Self> {
        source.check()?;
        check_layout(&image, &layout, usize::from(source.color_samples))?;

        Ok(ChannelWriter {
            rescale: source.rescale::<T>(),
            scratch: vec![T::default(); layout.channels()],
            image,
            source,
            layout,
            postprocess: PostProcessor::None,
            transform: None,
        })
    }

    pub fn with_postprocessor(mut self, postprocess: PostProcessor) -> Self {
        self.postprocess = postprocess;
        self
    }

    pub fn with_color_transform(mut self, transform: Option<ColorTransform<T>>) -> Self {
        self.transform = transform;
        self
    }

    /// Every pixel is complete once written, so this only hands back the image.
    pub fn finalize(self) -> ImageBuffer<T> {
        self.image
    }
}

impl<T: Sample> RowWriter for ChannelWriter<T> {
    fn copy_row(&mut self, x: u32, y: u32, width: u32, stream: &mut SampleStream<'_>) -> u32 {
        let pixel = &mut self.scratch[..];

        for i in 0..width {
            for &pos in self.layout.color() {
                pixel[pos] = self.rescale.apply(stream.next_value());
            }
            self.source
                .read_extras(stream, self.rescale, pixel, self.layout.alpha());

            if self.source.premultiplied && self.source.alpha.is_some() {
                alpha::unpremultiply(pixel, &self.layout);
            }
            self.postprocess.apply(pixel, self.layout.color());
            if let Some(transform) = self.transform.as_mut() {
                transform(&mut *pixel);
            }

            if let Some(target) = self.image.pixel_mut(x + i, y) {
                target.copy_from_slice(pixel);
            }
        }

        1
    }
}

/// Expands palette indices through a 16-bit color map into RGB and alpha.
pub struct PaletteWriter {
    image: ImageBuffer<u16>,
    source: SourceSamples,
    layout: ChannelLayout,
    color_map: Vec<u16>,
    entries: usize,
    transform: Option<ColorTransform<u16>>,
    scratch: [u16; 4],
}

impl PaletteWriter {
    /// `color_map` holds all red, then all green, then all blue entries, `2^bits` each.
    pub fn new(
        image: ImageBuffer<u16>,
        source: SourceSamples,
        layout: ChannelLayout,
        color_map: Vec<u16>,
    ) -> TiffResult<Self> {
        source.check()?;
        check_layout(&image, &layout, 3)?;

        let entries = 1usize << source.bits_per_sample;
        if color_map.len() != 3 * entries {
            return Err(TiffFormatError::InvalidColorMap {
                expected: 3 * entries,
                found: color_map.len(),
            }
            .into());
        }

        Ok(PaletteWriter {
            image,
            source,
            layout,
            color_map,
            entries,
            transform: None,
            scratch: [0; 4],
        })
    }

    pub fn with_color_transform(mut self, transform: Option<ColorTransform<u16>>) -> Self {
        self.transform = transform;
        self
    }

    pub fn finalize(self) -> ImageBuffer<u16> {
        self.image
    }
}

impl RowWriter for PaletteWriter {
    fn copy_row(&mut self, x: u32, y: u32, width: u32, stream: &mut SampleStream<'_>) -> u32 {
        let rescale = self.source.rescale::<u16>();

        for i in 0..width {
            let index = stream.next_value() as usize;
            let pixel = &mut self.scratch[..];
            for (plane, &pos) in self.layout.color().iter().enumerate() {
                pixel[pos] = if index < self.entries {
                    self.color_map[plane * self.entries + index]
                } else {
                    0
                };
            }
            self.source
                .read_extras(stream, rescale, pixel, self.layout.alpha());

            if let Some(transform) = self.transform.as_mut() {
                transform(&mut *pixel);
            }
            if let Some(target) = self.image.pixel_mut(x + i, y) {
                target.copy_from_slice(pixel);
            }
        }

        1
    }
}

pub(crate) fn check_layout<T: Sample>(
    image: &ImageBuffer<T>,
    layout: &ChannelLayout,
    color_samples: usize,
) -> TiffResult<()> {
    layout.check(color_samples)?;
    if image.channels() != layout.channels() {
        return Err(UsageError::ChannelCountMismatch(layout.channels(), image.channels()).into());
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decoder::Limits;
    use crate::tags::ByteOrder;
    use half::f16;

    fn source(bits: u8, color: u16, extra: u16, alpha: Option<usize>) -> SourceSamples {
        SourceSamples {
            bits_per_sample: bits,
            sample_format: SampleFormat::Uint,
            color_samples: color,
            extra_samples: extra,
            alpha,
            premultiplied: false,
        }
    }

    fn image<T: Sample>(width: u32, height: u32, channels: usize) -> ImageBuffer<T> {
        ImageBuffer::new(width, height, channels, &Limits::default()).unwrap()
    }

    fn decode<T: Sample>(
        mut writer: ChannelWriter<T>,
        data: &[u8],
        width: u32,
        height: u32,
        stride: usize,
        bits: u8,
    ) -> ImageBuffer<T> {
        let mut stream = SampleStream::contiguous(data, bits, stride, ByteOrder::BigEndian).unwrap();
        stream.restart();
        let mut y = 0;
        while y < height {
            stream.move_to_line(y as usize);
            y += writer.copy_row(0, y, width, &mut stream);
        }
        writer.finalize()
    }

    #[test]
    fn rgb_2x2() {
        let data = [
            1, 2, 3, 4, 5, 6, //
            7, 8, 9, 10, 11, 12,
        ];
        let writer = ChannelWriter::new(
            image::<u8>(2, 2, 4),
            source(8, 3, 0, None),
            ChannelLayout::identity(3),
        )
        .unwrap();
        let result = decode(writer, &data, 2, 2, 6, 8);
        assert_eq!(
            result.as_slice(),
            &[1, 2, 3, 255, 4, 5, 6, 255, 7, 8, 9, 255, 10, 11, 12, 255]
        );
    }

    #[test]
    fn bgra_positions() {
        let data = [0x10, 0x20, 0x30, 0x40];
        let writer = ChannelWriter::new(
            image::<u8>(1, 1, 4),
            source(8, 3, 1, Some(0)),
            ChannelLayout::bgra(),
        )
        .unwrap();
        let result = decode(writer, &data, 1, 1, 4, 8);
        assert_eq!(result.as_slice(), &[0x30, 0x20, 0x10, 0x40]);
    }

    #[test]
    fn extra_samples_select_alpha() {
        // Gray, unspecified extra, alpha, unspecified extra.
        let data = [0x11, 0x99, 0x80, 0x77];
        let writer = ChannelWriter::new(
            image::<u16>(1, 1, 2),
            source(8, 1, 3, Some(1)),
            ChannelLayout::identity(1),
        )
        .unwrap();
        let result = decode(writer, &data, 1, 1, 4, 8);
        assert_eq!(result.as_slice(), &[0x1111, 0x8080]);
    }

    #[test]
    fn invert_keeps_alpha() {
        let data = [0x10, 0x40];
        let writer = ChannelWriter::new(
            image::<u8>(1, 1, 2),
            source(8, 1, 1, Some(0)),
            ChannelLayout::identity(1),
        )
        .unwrap()
        .with_postprocessor(PostProcessor::Invert);
        let result = decode(writer, &data, 1, 1, 2, 8);
        assert_eq!(result.as_slice(), &[0xef, 0x40]);
    }

    #[test]
    fn premultiplied_per_pixel() {
        let data = [50, 0, 128, 128];
        let mut samples = source(8, 3, 1, Some(0));
        samples.premultiplied = true;
        let writer =
            ChannelWriter::new(image::<u8>(1, 1, 4), samples, ChannelLayout::identity(3)).unwrap();
        let result = decode(writer, &data, 1, 1, 4, 8);
        assert_eq!(result.as_slice(), &[100, 0, 255, 128]);
    }

    #[test]
    fn transform_runs_last() {
        let data = [0x10];
        let writer = ChannelWriter::new(
            image::<u8>(1, 1, 2),
            source(8, 1, 0, None),
            ChannelLayout::identity(1),
        )
        .unwrap()
        .with_postprocessor(PostProcessor::Invert)
        .with_color_transform(Some(Box::new(|pixel: &mut [u8]| {
            assert_eq!(pixel, &[0xef, 0xff]);
            pixel[0] /= 2;
        })));
        let result = decode(writer, &data, 1, 1, 1, 8);
        assert_eq!(result.as_slice(), &[0x77, 0xff]);
    }

    #[test]
    fn float_bits_pass_through() {
        let mut data = Vec::new();
        data.extend_from_slice(&0.75f32.to_be_bytes());
        data.extend_from_slice(&(-2.0f32).to_be_bytes());
        let mut samples = source(32, 1, 0, None);
        samples.sample_format = SampleFormat::IEEEFP;
        let writer =
            ChannelWriter::new(image::<f32>(2, 1, 2), samples, ChannelLayout::identity(1)).unwrap();
        let result = decode(writer, &data, 2, 1, 8, 32);
        assert_eq!(result.as_slice(), &[0.75, 1.0, -2.0, 1.0]);

        let data = f16::from_f32(0.5).to_bits().to_be_bytes();
        let mut samples = source(16, 1, 0, None);
        samples.sample_format = SampleFormat::IEEEFP;
        let writer =
            ChannelWriter::new(image::<f16>(1, 1, 2), samples, ChannelLayout::identity(1)).unwrap();
        let result = decode(writer, &data, 1, 1, 2, 16);
        assert_eq!(result.as_slice(), &[f16::from_f32(0.5), f16::ONE]);
    }

    #[test]
    fn four_bit_gray_rescaled() {
        let data = [0x0f, 0x80];
        let writer = ChannelWriter::new(
            image::<u8>(3, 1, 2),
            source(4, 1, 0, None),
            ChannelLayout::identity(1),
        )
        .unwrap();
        let result = decode(writer, &data, 3, 1, 2, 4);
        assert_eq!(result.as_slice(), &[0, 255, 255, 255, 136, 255]);
    }

    #[test]
    fn mismatched_layouts_are_rejected() {
        assert!(ChannelWriter::new(
            image::<u8>(1, 1, 3),
            source(8, 3, 0, None),
            ChannelLayout::identity(3)
        )
        .is_err());
        assert!(ChannelWriter::new(
            image::<u8>(1, 1, 4),
            source(8, 3, 1, Some(1)),
            ChannelLayout::identity(3)
        )
        .is_err());
    }

    #[test]
    fn palette_lookup() {
        // Two bit palette, entries 0..4.
        let mut color_map = Vec::new();
        color_map.extend_from_slice(&[0, 100, 200, 300]);
        color_map.extend_from_slice(&[1, 101, 201, 301]);
        color_map.extend_from_slice(&[2, 102, 202, 302]);
        let mut writer = PaletteWriter::new(
            image(4, 1, 4),
            source(2, 1, 0, None),
            ChannelLayout::identity(3),
            color_map,
        )
        .unwrap();

        let data = [0b00_01_10_11];
        let mut stream = SampleStream::contiguous(&data, 2, 1, ByteOrder::BigEndian).unwrap();
        assert_eq!(writer.copy_row(0, 0, 4, &mut stream), 1);
        let result = writer.finalize();
        assert_eq!(
            result.as_slice(),
            &[
                0, 1, 2, 65535, 100, 101, 102, 65535, 200, 201, 202, 65535, 300, 301, 302,
                65535
            ]
        );
    }

    #[test]
    fn palette_size_checked() {
        let result = PaletteWriter::new(
            image(1, 1, 4),
            source(2, 1, 0, None),
            ChannelLayout::identity(3),
            vec![0; 11],
        );
        assert!(result.is_err());
    }

    #[test]
    fn channel_positions_must_be_distinct() {
        assert!(ChannelLayout::bgra().check(3).is_ok());
        assert!(matches!(
            ChannelLayout::new(vec![0, 1, 1], 3).check(3),
            Err(crate::TiffError::UsageError(
                UsageError::InvalidChannelPosition(1, 4)
            ))
        ));
        assert!(matches!(
            ChannelLayout::new(vec![0, 1, 2], 4).check(3),
            Err(crate::TiffError::UsageError(
                UsageError::InvalidChannelPosition(4, 4)
            ))
        ));
        assert!(ChannelLayout::bgra().check(1).is_err());
    }
}
