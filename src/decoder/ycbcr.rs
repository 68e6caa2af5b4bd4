//! Chroma subsampled YCbCr
//!
//! Contiguous YCbCr data with subsampling is stored in data units: `vsub` rows of `hsub` luma
//! samples (each followed by the pixel's extra samples), then a single Cb and Cr for the whole
//! block. Chroma is collected into separate buffers while rows are decoded and only spread
//! over the pixels in [`YCbCrWriter::finalize`], once every block of the image is known.
//!
//! Separate planes with subsampled chroma are upsampled by the stream instead
//! ([`SampleStream::InterleaveUpsample`]) and arrive here already interleaved per pixel.

use super::alpha;
use super::bitstream::SampleStream;
use super::buffer::ImageBuffer;
use super::postprocess::{ColorTransform, PostProcessor};
use super::sample::{Rescale, Sample};
use super::writer::{check_layout, ChannelLayout, RowWriter, SourceSamples};
use crate::error::TiffFormatError;
use crate::TiffResult;

/// How the chroma samples reach the writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChromaLayout {
    /// Contiguous data units.
    DataUnits,
    /// Per pixel samples from an upsampling stream.
    Upsampled,
}

pub struct YCbCrWriter<T: Sample> {
    image: ImageBuffer<T>,
    source: SourceSamples,
    layout: ChannelLayout,
    rescale: Rescale,
    chroma_layout: ChromaLayout,
    hsub: u32,
    vsub: u32,
    chroma_width: usize,
    cb: Vec<T>,
    cr: Vec<T>,
    postprocess: PostProcessor,
    transform: Option<ColorTransform<T>>,
}

impl<T: Sample> YCbCrWriter<T> {
    pub fn new(
        image: ImageBuffer<T>,
        source: SourceSamples,
        layout: ChannelLayout,
        (hsub, vsub): (u16, u16),
        chroma_layout: ChromaLayout,
    ) -> TiffResult<Self> {
        source.check()?;
        check_layout(&image, &layout, 3)?;
        if !matches!(hsub, 1 | 2 | 4) || !matches!(vsub, 1 | 2 | 4) {
            return Err(TiffFormatError::InvalidChromaSubsampling(hsub, vsub).into());
        }

        let (hsub, vsub) = (u32::from(hsub), u32::from(vsub));
        let (chroma_width, chroma_len) = match chroma_layout {
            ChromaLayout::DataUnits => {
                let width = image.width().div_ceil(hsub) as usize;
                (width, width * image.height().div_ceil(vsub) as usize)
            }
            ChromaLayout::Upsampled => (0, 0),
        };

        Ok(YCbCrWriter {
            rescale: source.rescale::<T>(),
            image,
            source,
            layout,
            chroma_layout,
            hsub,
            vsub,
            chroma_width,
            cb: vec![T::default(); chroma_len],
            cr: vec![T::default(); chroma_len],
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

    /// Completes every pixel, one row at a time: chroma is replicated over its block, associated
    /// alpha is divided out, then the postprocessor and color transform run.
    pub fn finalize(mut self) -> ImageBuffer<T> {
        let channels = self.image.channels();
        let (cb_pos, cr_pos) = (self.layout.color()[1], self.layout.color()[2]);
        let unpremultiply = self.source.premultiplied && self.source.alpha.is_some();

        for (y, row) in self.image.rows_mut().enumerate() {
            let chroma_row = y / self.vsub as usize * self.chroma_width;

            for (x, pixel) in row.chunks_exact_mut(channels).enumerate() {
                if self.chroma_layout == ChromaLayout::DataUnits {
                    let index = chroma_row + x / self.hsub as usize;
                    pixel[cb_pos] = self.cb[index];
                    pixel[cr_pos] = self.cr[index];
                }

                if unpremultiply {
                    alpha::unpremultiply(pixel, &self.layout);
                }
                self.postprocess.apply(pixel, self.layout.color());
                if let Some(transform) = self.transform.as_mut() {
                    transform(pixel);
                }
            }
        }

        self.image
    }

    fn copy_data_units(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        stream: &mut SampleStream<'_>,
    ) -> u32 {
        let (y_pos, alpha_pos) = (self.layout.color()[0], self.layout.alpha());
        let mut pixel = [T::default(); 4];
        let pixel = &mut pixel[..];

        let chroma_y = (y / self.vsub) as usize;
        let mut chroma_index = chroma_y * self.chroma_width + (x / self.hsub) as usize;

        for block in 0..width.div_ceil(self.hsub) {
            for v in 0..self.vsub {
                for h in 0..self.hsub {
                    pixel[y_pos] = self.rescale.apply(stream.next_value());
                    self.source
                        .read_extras(stream, self.rescale, pixel, alpha_pos);

                    let column = block * self.hsub + h;
                    if column < width {
                        if let Some(target) = self.image.pixel_mut(x + column, y + v) {
                            target[y_pos] = pixel[y_pos];
                            target[alpha_pos] = pixel[alpha_pos];
                        }
                    }
                }
            }

            let cb = self.rescale.apply(stream.next_value());
            let cr = self.rescale.apply(stream.next_value());
            if chroma_index < self.cb.len() {
                self.cb[chroma_index] = cb;
                self.cr[chroma_index] = cr;
            }
            chroma_index += 1;
        }

        self.vsub
    }

    fn copy_upsampled(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        stream: &mut SampleStream<'_>,
    ) -> u32 {
        let alpha_pos = self.layout.alpha();
        let mut pixel = [T::default(); 4];
        let pixel = &mut pixel[..];

        for i in 0..width {
            for &pos in self.layout.color() {
                pixel[pos] = self.rescale.apply(stream.next_value());
            }
            self.source
                .read_extras(stream, self.rescale, pixel, alpha_pos);

            if let Some(target) = self.image.pixel_mut(x + i, y) {
                target.copy_from_slice(pixel);
            }
        }

        1
    }
}

impl<T: Sample> RowWriter for YCbCrWriter<T> {
    /// With data units a call fills `vsub` rows, otherwise one.
    fn copy_row(&mut self, x: u32, y: u32, width: u32, stream: &mut SampleStream<'_>) -> u32 {
        match self.chroma_layout {
            ChromaLayout::DataUnits => self.copy_data_units(x, y, width, stream),
            ChromaLayout::Upsampled => self.copy_upsampled(x, y, width, stream),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decoder::Limits;
    use crate::tags::{ByteOrder, SampleFormat};

    fn source(extra: u16, alpha: Option<usize>, premultiplied: bool) -> SourceSamples {
        SourceSamples {
            bits_per_sample: 8,
            sample_format: SampleFormat::Uint,
            color_samples: 3,
            extra_samples: extra,
            alpha,
            premultiplied,
        }
    }

    fn writer(
        width: u32,
        height: u32,
        source: SourceSamples,
        subsampling: (u16, u16),
    ) -> YCbCrWriter<u8> {
        let image = ImageBuffer::new(width, height, 4, &Limits::default()).unwrap();
        YCbCrWriter::new(
            image,
            source,
            ChannelLayout::identity(3),
            subsampling,
            ChromaLayout::DataUnits,
        )
        .unwrap()
    }

    #[test]
    fn chroma_fills_its_block() {
        // One 2x2 data unit: Y00 Y01 Y10 Y11 Cb Cr.
        let data = [10, 11, 12, 13, 100, 200];
        let mut writer = writer(2, 2, source(0, None, false), (2, 2));
        let mut stream = SampleStream::contiguous(&data, 8, 6, ByteOrder::BigEndian).unwrap();

        stream.restart();
        assert_eq!(writer.copy_row(0, 0, 2, &mut stream), 2);

        let image = writer.finalize();
        assert_eq!(
            image.as_slice(),
            &[10, 100, 200, 255, 11, 100, 200, 255, 12, 100, 200, 255, 13, 100, 200, 255]
        );
    }

    #[test]
    fn partial_blocks_are_clipped() {
        // 3x1 image with 2x1 subsampling: two data units, the last one half outside.
        let data = [1, 2, 50, 60, 3, 4, 70, 80];
        let mut writer = writer(3, 1, source(0, None, false), (2, 1));
        let mut stream = SampleStream::contiguous(&data, 8, 8, ByteOrder::BigEndian).unwrap();
        assert_eq!(writer.copy_row(0, 0, 3, &mut stream), 1);

        let image = writer.finalize();
        assert_eq!(
            image.as_slice(),
            &[1, 50, 60, 255, 2, 50, 60, 255, 3, 70, 80, 255]
        );
    }

    #[test]
    fn premultiplied_after_replication() {
        // 2x1 image, 2x1 subsampling, each luma followed by its alpha.
        let data = [50, 128, 64, 0, 128, 100];
        let mut writer = writer(2, 1, source(1, Some(0), true), (2, 1));
        let mut stream = SampleStream::contiguous(&data, 8, 6, ByteOrder::BigEndian).unwrap();
        writer.copy_row(0, 0, 2, &mut stream);

        let image = writer.finalize();
        assert_eq!(image.pixel(0, 0), Some(&[100u8, 255, 199, 128][..]));
        assert_eq!(image.pixel(1, 0), Some(&[0u8, 0, 0, 0][..]));
    }

    #[test]
    fn upsampled_planes() {
        let y = [10u8, 11, 12, 13];
        let cb = [100u8];
        let cr = [200u8];
        let image = ImageBuffer::new(2, 2, 4, &Limits::default()).unwrap();
        let mut writer = YCbCrWriter::<u8>::new(
            image,
            source(0, None, false),
            ChannelLayout::identity(3),
            (2, 2),
            ChromaLayout::Upsampled,
        )
        .unwrap();
        let mut stream = SampleStream::interleave_upsample(
            &[(&y[..], 2), (&cb[..], 1), (&cr[..], 1)],
            8,
            ByteOrder::BigEndian,
            2,
            2,
        )
        .unwrap();

        for row in 0..2 {
            stream.move_to_line(row as usize);
            assert_eq!(writer.copy_row(0, row, 2, &mut stream), 1);
        }
        let image = writer.finalize();
        assert_eq!(
            image.as_slice(),
            &[10, 100, 200, 255, 11, 100, 200, 255, 12, 100, 200, 255, 13, 100, 200, 255]
        );
    }

    #[test]
    fn rejects_odd_subsampling() {
        let image = ImageBuffer::<u8>::new(2, 2, 4, &Limits::default()).unwrap();
        assert!(YCbCrWriter::new(
            image,
            source(0, None, false),
            ChannelLayout::identity(3),
            (3, 1),
            ChromaLayout::DataUnits,
        )
        .is_err());
    }
}
