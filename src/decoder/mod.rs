use std::fmt;
use std::mem;

use half::f16;

use crate::tags::{
    ByteOrder, CompressionMethod, ExtraSamples, PhotometricInterpretation, PlanarConfiguration,
    SampleFormat,
};
use crate::{TiffError, TiffFormatError, TiffResult, TiffUnsupportedError, UsageError};

use self::image::ChunkGeometry;

pub mod alpha;
pub mod bitstream;
mod buffer;
mod image;
pub mod postprocess;
mod sample;
mod stream;
pub mod writer;
pub mod ycbcr;

pub use self::bitstream::{BitUnpacker, DepthRegime, SampleStream};
pub use self::buffer::ImageBuffer;
pub use self::postprocess::{ColorTransform, PostProcessor};
pub use self::sample::Sample;
pub use self::writer::{ChannelLayout, ChannelWriter, PaletteWriter, RowWriter, SourceSamples};
pub use self::ycbcr::{ChromaLayout, YCbCrWriter};

/// Result of a decoding process
///
/// Every pixel carries its color channels followed by one alpha channel, which is opaque when
/// the image has no alpha.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodingResult {
    /// 8 bit unsigned samples
    U8(ImageBuffer<u8>),
    /// 16 bit unsigned samples, also used for palette images
    U16(ImageBuffer<u16>),
    /// 16 bit IEEE floats
    F16(ImageBuffer<f16>),
    /// 32 bit unsigned samples
    U32(ImageBuffer<u32>),
    /// 32 bit IEEE floats
    F32(ImageBuffer<f32>),
}

impl DecodingResult {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            DecodingResult::U8(buf) => buf.dimensions(),
            DecodingResult::U16(buf) => buf.dimensions(),
            DecodingResult::F16(buf) => buf.dimensions(),
            DecodingResult::U32(buf) => buf.dimensions(),
            DecodingResult::F32(buf) => buf.dimensions(),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            DecodingResult::U8(buf) => buf.channels(),
            DecodingResult::U16(buf) => buf.channels(),
            DecodingResult::F16(buf) => buf.channels(),
            DecodingResult::U32(buf) => buf.channels(),
            DecodingResult::F32(buf) => buf.channels(),
        }
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            DecodingResult::U8(_) => SampleType::U8,
            DecodingResult::U16(_) => SampleType::U16,
            DecodingResult::F16(_) => SampleType::F16,
            DecodingResult::U32(_) => SampleType::U32,
            DecodingResult::F32(_) => SampleType::F32,
        }
    }
}

/// The destination sample type an image decodes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleType {
    U8,
    U16,
    F16,
    U32,
    F32,
}

impl SampleType {
    pub fn name(self) -> &'static str {
        match self {
            SampleType::U8 => <u8 as Sample>::NAME,
            SampleType::U16 => <u16 as Sample>::NAME,
            SampleType::F16 => <f16 as Sample>::NAME,
            SampleType::U32 => <u32 as Sample>::NAME,
            SampleType::F32 => <f32 as Sample>::NAME,
        }
    }

    fn for_layout(layout: &ImageLayout) -> TiffResult<SampleType> {
        let bits = layout.bits_per_sample;
        if !(1..=32).contains(&bits) {
            return Err(TiffUnsupportedError::UnsupportedBitsPerSample(bits).into());
        }

        if layout.photometric_interpretation == PhotometricInterpretation::RGBPalette {
            return match (layout.sample_format, bits) {
                (SampleFormat::Uint, 1..=16) => Ok(SampleType::U16),
                (SampleFormat::Uint, _) => {
                    Err(TiffUnsupportedError::UnsupportedBitsPerSample(bits).into())
                }
                (format, _) => Err(TiffUnsupportedError::UnsupportedSampleFormat(format, bits).into()),
            };
        }

        // a* and b* of CIE Lab are signed, they are shifted to unsigned ICC Lab after decoding.
        let unsigned = match layout.sample_format {
            SampleFormat::Uint => true,
            SampleFormat::Int => {
                layout.photometric_interpretation == PhotometricInterpretation::CIELab
            }
            _ => false,
        };

        match (unsigned, layout.sample_format, bits) {
            (true, _, 1..=8) => Ok(SampleType::U8),
            (true, _, 9..=16) => Ok(SampleType::U16),
            (true, _, _) => Ok(SampleType::U32),
            (false, SampleFormat::IEEEFP, 16) => Ok(SampleType::F16),
            (false, SampleFormat::IEEEFP, 32) => Ok(SampleType::F32),
            (false, format, bits) => {
                Err(TiffUnsupportedError::UnsupportedSampleFormat(format, bits).into())
            }
        }
    }
}

/// How the chunks of an image cover it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkLayout {
    /// Full width strips of `rows_per_strip` rows, the last one possibly shorter.
    Strips { rows_per_strip: u32 },
    /// Tiles of a fixed size, padded at the right and bottom edge of the image.
    Tiles { tile_width: u32, tile_length: u32 },
}

/// Description of a TIFF image as found in its directory.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageLayout {
    pub width: u32,
    pub height: u32,
    /// Depth of every sample, color and extra.
    pub bits_per_sample: u8,
    pub sample_format: SampleFormat,
    pub photometric_interpretation: PhotometricInterpretation,
    pub planar_configuration: PlanarConfiguration,
    pub color_samples: u16,
    /// Kind of each sample following the color samples.
    pub extra_samples: Vec<ExtraSamples>,
    /// Horizontal and vertical chroma subsampling, only used for YCbCr.
    pub chroma_subsampling: (u16, u16),
    pub chunk_layout: ChunkLayout,
    pub compression_method: CompressionMethod,
    /// Byte order of samples of 16 bits and more.
    pub byte_order: ByteOrder,
    /// Palette of `RGBPalette` images: all red, then all green, then all blue entries.
    pub color_map: Option<Vec<u16>>,
}

impl ImageLayout {
    /// An uncompressed, single strip, interleaved image with unsigned samples and no extra
    /// samples.
    pub fn new(
        width: u32,
        height: u32,
        bits_per_sample: u8,
        photometric_interpretation: PhotometricInterpretation,
    ) -> Self {
        ImageLayout {
            width,
            height,
            bits_per_sample,
            sample_format: SampleFormat::Uint,
            photometric_interpretation,
            planar_configuration: PlanarConfiguration::Chunky,
            color_samples: color_samples(photometric_interpretation).unwrap_or(1),
            extra_samples: Vec::new(),
            chroma_subsampling: (1, 1),
            chunk_layout: ChunkLayout::Strips {
                rows_per_strip: height,
            },
            compression_method: CompressionMethod::None,
            byte_order: ByteOrder::BigEndian,
            color_map: None,
        }
    }

    pub fn samples_per_pixel(&self) -> usize {
        usize::from(self.color_samples) + self.extra_samples.len()
    }

    fn is_subsampled(&self) -> bool {
        self.photometric_interpretation == PhotometricInterpretation::YCbCr
            && self.chroma_subsampling != (1, 1)
    }
}

fn color_samples(photometric: PhotometricInterpretation) -> Option<u16> {
    match photometric {
        PhotometricInterpretation::WhiteIsZero
        | PhotometricInterpretation::BlackIsZero
        | PhotometricInterpretation::RGBPalette => Some(1),
        PhotometricInterpretation::RGB
        | PhotometricInterpretation::YCbCr
        | PhotometricInterpretation::CIELab => Some(3),
        PhotometricInterpretation::CMYK => Some(4),
        _ => None,
    }
}

/// Hands out the stored bytes of strips or tiles.
///
/// Chunks are numbered as in the `StripOffsets` and `TileOffsets` tags: row by row across the
/// image, and for planar images all chunks of the first plane before those of the next.
pub trait ChunkSource {
    fn chunk(&mut self, index: u32) -> TiffResult<Vec<u8>>;
}

impl ChunkSource for Vec<Vec<u8>> {
    fn chunk(&mut self, index: u32) -> TiffResult<Vec<u8>> {
        self.get(index as usize)
            .cloned()
            .ok_or(UsageError::MissingChunk(index).into())
    }
}

/// Decoding limits
#[derive(Clone, Debug)]
pub struct Limits {
    /// The maximum size of the decoded image in bytes, the default is 256MiB.
    pub decoding_buffer_size: usize,
    /// Maximum size of a single decompressed strip or tile, the default is 128MiB.
    pub intermediate_buffer_size: usize,
    /// The purpose of this is to prevent all the fields of the struct from
    /// being public, as this would make adding new fields a major version
    /// bump.
    _non_exhaustive: (),
}

impl Limits {
    /// A configuration that does not impose any limits.
    ///
    /// This is a good start if the caller only wants to impose selective limits, contrary to the
    /// default limits which allows selectively disabling limits.
    ///
    /// Note that this configuration is likely to crash on excessively large images since,
    /// naturally, the machine running the program does not have infinite memory.
    pub fn unlimited() -> Limits {
        Limits {
            decoding_buffer_size: usize::MAX,
            intermediate_buffer_size: usize::MAX,
            _non_exhaustive: (),
        }
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            decoding_buffer_size: 256 * 1024 * 1024,
            intermediate_buffer_size: 128 * 1024 * 1024,
            _non_exhaustive: (),
        }
    }
}

/// Arrangement of the samples within decompressed chunk data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamKind {
    /// Interleaved pixels.
    Contig,
    /// Interleaved YCbCr data units with subsampled chroma.
    DataUnits,
    /// One plane per sample.
    Separate,
    /// One plane per sample with subsampled chroma planes.
    InterleaveUpsample,
}

#[derive(Default)]
enum Transform {
    #[default]
    None,
    U8(ColorTransform<u8>),
    U16(ColorTransform<u16>),
    F16(ColorTransform<f16>),
    U32(ColorTransform<u32>),
    F32(ColorTransform<f32>),
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transform::None => "None",
            Transform::U8(_) => "U8",
            Transform::U16(_) => "U16",
            Transform::F16(_) => "F16",
            Transform::U32(_) => "U32",
            Transform::F32(_) => "F32",
        };
        f.write_str(name)
    }
}

macro_rules! color_transform_fn {
    ($name:ident, $type:ty, $variant:ident) => {
        #[doc = concat!("Installs a transform run on every decoded `", stringify!($type), "` pixel.")]
        ///
        /// It sees the pixel after alpha reconstruction and the photometric fix-ups. Fails if
        /// the image decodes to another sample type.
        pub fn $name(
            mut self,
            transform: impl FnMut(&mut [$type]) + Send + 'static,
        ) -> TiffResult<Self> {
            if self.sample_type != SampleType::$variant {
                return Err(UsageError::MismatchedTransform(
                    <$type as Sample>::NAME,
                    self.sample_type.name(),
                )
                .into());
            }
            self.transform = Transform::$variant(Box::new(transform));
            Ok(self)
        }
    };
}

/// Decodes the chunks of a single image into an interleaved pixel buffer.
///
/// Everything that could make decoding fail is checked by [`Decoder::new`] and while fetching
/// chunks. Once a chunk is in memory its samples are unpacked without further checks.
#[derive(Debug)]
pub struct Decoder {
    layout: ImageLayout,
    limits: Limits,
    sample_type: SampleType,
    samples: SourceSamples,
    geometry: ChunkGeometry,
    stream_kind: StreamKind,
    planes: usize,
    channels: ChannelLayout,
    postprocess: PostProcessor,
    transform: Transform,
}

impl Decoder {
    /// Validates the layout and selects how it is decoded.
    pub fn new(layout: ImageLayout) -> TiffResult<Decoder> {
        let photometric = layout.photometric_interpretation;
        if layout.width == 0 || layout.height == 0 {
            return Err(TiffFormatError::InvalidDimensions(layout.width, layout.height).into());
        }

        let expected_samples = color_samples(photometric)
            .ok_or(TiffUnsupportedError::UnsupportedInterpretation(photometric))?;
        if layout.color_samples != expected_samples {
            return Err(
                TiffFormatError::SamplesPerPixelMismatch(photometric, layout.color_samples).into(),
            );
        }

        let sample_type = SampleType::for_layout(&layout)?;
        // Rejects little endian samples that do not consist of whole bytes.
        BitUnpacker::new(&[], layout.bits_per_sample, 0)?.with_byte_order(layout.byte_order)?;
        stream::check_compression(layout.compression_method)?;

        if photometric == PhotometricInterpretation::RGBPalette {
            let color_map = layout
                .color_map
                .as_ref()
                .ok_or(TiffFormatError::ColorMapNotFound)?;
            let expected = 3usize << layout.bits_per_sample;
            if color_map.len() != expected {
                return Err(TiffFormatError::InvalidColorMap {
                    expected,
                    found: color_map.len(),
                }
                .into());
            }
        }

        let (hsub, vsub) = layout.chroma_subsampling;
        if photometric == PhotometricInterpretation::YCbCr
            && (!matches!(hsub, 1 | 2 | 4) || !matches!(vsub, 1 | 2 | 4))
        {
            return Err(TiffFormatError::InvalidChromaSubsampling(hsub, vsub).into());
        }

        let stream_kind = match (layout.planar_configuration, layout.is_subsampled()) {
            (PlanarConfiguration::Chunky, false) => StreamKind::Contig,
            (PlanarConfiguration::Chunky, true) => StreamKind::DataUnits,
            (PlanarConfiguration::Planar, false) => StreamKind::Separate,
            (PlanarConfiguration::Planar, true) => StreamKind::InterleaveUpsample,
        };
        let planes = match layout.planar_configuration {
            PlanarConfiguration::Chunky => 1,
            PlanarConfiguration::Planar => layout.samples_per_pixel(),
        };

        Self::check_chunk_layout(&layout, stream_kind)?;
        let geometry = ChunkGeometry::new(layout.width, layout.height, layout.chunk_layout);
        let chunks = u64::from(geometry.chunks_across())
            * u64::from(geometry.chunks_down())
            * planes as u64;
        u32::try_from(chunks)?;

        let alpha = layout.extra_samples.iter().position(ExtraSamples::is_alpha);
        let premultiplied =
            alpha.map(|index| layout.extra_samples[index]) == Some(ExtraSamples::AssociatedAlpha);
        let samples = SourceSamples {
            bits_per_sample: layout.bits_per_sample,
            sample_format: layout.sample_format,
            color_samples: layout.color_samples,
            extra_samples: u16::try_from(layout.extra_samples.len())?,
            alpha,
            premultiplied,
        };
        let postprocess = PostProcessor::for_photometric(photometric);
        let channels = ChannelLayout::identity(Self::destination_colors(&layout));

        log::debug!(
            "{}x{} {:?} image with {} bit samples decodes to {} through a {:?} stream, postprocessor {:?}",
            layout.width,
            layout.height,
            photometric,
            layout.bits_per_sample,
            sample_type.name(),
            stream_kind,
            postprocess,
        );
        if let Some(index) = alpha {
            log::debug!(
                "alpha in extra sample {}, premultiplied: {}",
                index,
                premultiplied
            );
        }

        Ok(Decoder {
            layout,
            limits: Limits::default(),
            sample_type,
            samples,
            geometry,
            stream_kind,
            planes,
            channels,
            postprocess,
            transform: Transform::None,
        })
    }

    /// Color channels of a decoded pixel, palette indices expand to RGB.
    fn destination_colors(layout: &ImageLayout) -> usize {
        match layout.photometric_interpretation {
            PhotometricInterpretation::RGBPalette => 3,
            _ => usize::from(layout.color_samples),
        }
    }

    fn check_chunk_layout(layout: &ImageLayout, stream_kind: StreamKind) -> TiffResult<()> {
        let (hsub, vsub) = (
            u32::from(layout.chroma_subsampling.0),
            u32::from(layout.chroma_subsampling.1),
        );

        match layout.chunk_layout {
            ChunkLayout::Strips { rows_per_strip: 0 }
            | ChunkLayout::Tiles { tile_width: 0, .. }
            | ChunkLayout::Tiles { tile_length: 0, .. } => {
                Err(TiffFormatError::InvalidChunkSize.into())
            }
            // A block of `vsub` rows shares its chroma and must not straddle two strips.
            ChunkLayout::Strips { rows_per_strip }
                if matches!(
                    stream_kind,
                    StreamKind::DataUnits | StreamKind::InterleaveUpsample
                ) && rows_per_strip < layout.height
                    && rows_per_strip % vsub != 0 =>
            {
                Err(TiffFormatError::InvalidChunkSize.into())
            }
            ChunkLayout::Tiles {
                tile_width,
                tile_length,
            } if layout.is_subsampled() && (tile_width % hsub != 0 || tile_length % vsub != 0) => {
                Err(TiffFormatError::InvalidChunkSize.into())
            }
            _ => Ok(()),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Decoder {
        self.limits = limits;
        self
    }

    /// Places the decoded channels at the positions of `channels`, such as
    /// [`ChannelLayout::bgra`] for RGB images.
    ///
    /// The map must have one entry per color channel of the decoded pixel, three for palette
    /// images, and give every channel its own position.
    pub fn with_channel_layout(mut self, channels: ChannelLayout) -> TiffResult<Decoder> {
        channels.check(Self::destination_colors(&self.layout))?;
        self.channels = channels;
        Ok(self)
    }

    color_transform_fn!(with_color_transform_u8, u8, U8);
    color_transform_fn!(with_color_transform_u16, u16, U16);
    color_transform_fn!(with_color_transform_f16, f16, F16);
    color_transform_fn!(with_color_transform_u32, u32, U32);
    color_transform_fn!(with_color_transform_f32, f32, F32);

    pub fn dimensions(&self) -> (u32, u32) {
        (self.layout.width, self.layout.height)
    }

    /// The sample type [`Decoder::read_image`] produces.
    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    /// Decodes the whole image from the chunks of `source`.
    pub fn read_image<S: ChunkSource>(mut self, source: &mut S) -> TiffResult<DecodingResult> {
        let transform = mem::take(&mut self.transform);

        if self.layout.photometric_interpretation == PhotometricInterpretation::RGBPalette {
            let transform = match transform {
                Transform::U16(transform) => Some(transform),
                _ => None,
            };
            return Ok(DecodingResult::U16(self.read_palette(source, transform)?));
        }

        Ok(match (self.sample_type, transform) {
            (SampleType::U8, Transform::U8(t)) => {
                DecodingResult::U8(self.read_samples(source, Some(t))?)
            }
            (SampleType::U8, _) => DecodingResult::U8(self.read_samples(source, None)?),
            (SampleType::U16, Transform::U16(t)) => {
                DecodingResult::U16(self.read_samples(source, Some(t))?)
            }
            (SampleType::U16, _) => DecodingResult::U16(self.read_samples(source, None)?),
            (SampleType::F16, Transform::F16(t)) => {
                DecodingResult::F16(self.read_samples(source, Some(t))?)
            }
            (SampleType::F16, _) => DecodingResult::F16(self.read_samples(source, None)?),
            (SampleType::U32, Transform::U32(t)) => {
                DecodingResult::U32(self.read_samples(source, Some(t))?)
            }
            (SampleType::U32, _) => DecodingResult::U32(self.read_samples(source, None)?),
            (SampleType::F32, Transform::F32(t)) => {
                DecodingResult::F32(self.read_samples(source, Some(t))?)
            }
            (SampleType::F32, _) => DecodingResult::F32(self.read_samples(source, None)?),
        })
    }

    fn read_samples<T: Sample, S: ChunkSource>(
        &self,
        source: &mut S,
        transform: Option<ColorTransform<T>>,
    ) -> TiffResult<ImageBuffer<T>> {
        let channels = self.channels.clone();
        let image = ImageBuffer::new(
            self.layout.width,
            self.layout.height,
            channels.channels(),
            &self.limits,
        )?;

        let chroma_layout = match self.stream_kind {
            StreamKind::DataUnits => ChromaLayout::DataUnits,
            StreamKind::InterleaveUpsample => ChromaLayout::Upsampled,
            StreamKind::Contig | StreamKind::Separate => {
                let mut writer = ChannelWriter::new(image, self.samples, channels)?
                    .with_postprocessor(self.postprocess)
                    .with_color_transform(transform);
                self.read_chunks(source, &mut writer)?;
                return Ok(writer.finalize());
            }
        };

        let mut writer = YCbCrWriter::new(
            image,
            self.samples,
            channels,
            self.layout.chroma_subsampling,
            chroma_layout,
        )?
        .with_postprocessor(self.postprocess)
        .with_color_transform(transform);
        self.read_chunks(source, &mut writer)?;
        Ok(writer.finalize())
    }

    fn read_palette<S: ChunkSource>(
        &mut self,
        source: &mut S,
        transform: Option<ColorTransform<u16>>,
    ) -> TiffResult<ImageBuffer<u16>> {
        let color_map = self
            .layout
            .color_map
            .take()
            .ok_or(TiffFormatError::ColorMapNotFound)?;
        let channels = self.channels.clone();
        let image = ImageBuffer::new(
            self.layout.width,
            self.layout.height,
            channels.channels(),
            &self.limits,
        )?;

        let mut writer = PaletteWriter::new(image, self.samples, channels, color_map)?
            .with_color_transform(transform);
        self.read_chunks(source, &mut writer)?;
        Ok(writer.finalize())
    }

    /// Feeds every chunk of the image through `writer`, row by row.
    fn read_chunks<S: ChunkSource, W: RowWriter>(
        &self,
        source: &mut S,
        writer: &mut W,
    ) -> TiffResult<()> {
        let bits = self.layout.bits_per_sample;
        let byte_order = self.layout.byte_order;
        let (hsub, vsub) = self.layout.chroma_subsampling;
        let chunks_per_plane = self.geometry.chunks_per_plane();

        for chunk in 0..chunks_per_plane {
            let mut buffers = Vec::with_capacity(self.planes);
            for plane in 0..self.planes {
                let index = plane as u32 * chunks_per_plane + chunk;
                let (stride, expected) = self.plane_size(plane, chunk)?;
                let data = stream::decompress(
                    self.layout.compression_method,
                    source.chunk(index)?,
                    expected,
                )?;
                if data.len() < expected {
                    return Err(TiffFormatError::InconsistentSizesEncountered {
                        chunk: index,
                        expected,
                        found: data.len(),
                    }
                    .into());
                }
                buffers.push((data, stride));
            }

            let planes: Vec<(&[u8], usize)> = buffers
                .iter()
                .map(|(data, stride)| (&data[..], *stride))
                .collect();
            let mut stream = match self.stream_kind {
                StreamKind::Contig | StreamKind::DataUnits => {
                    SampleStream::contiguous(planes[0].0, bits, planes[0].1, byte_order)?
                }
                StreamKind::Separate => SampleStream::separate(&planes, bits, byte_order)?,
                StreamKind::InterleaveUpsample => {
                    SampleStream::interleave_upsample(&planes, bits, byte_order, hsub, vsub)?
                }
            };

            // Data unit rows each cover `vsub` image rows.
            let rows_per_line = match self.stream_kind {
                StreamKind::DataUnits => u32::from(vsub),
                _ => 1,
            };
            let (x, y) = self.geometry.origin(chunk);
            let (width, height) = self.geometry.visible_dimensions(chunk);

            stream.restart();
            let mut row = 0;
            while row < height {
                stream.move_to_line((row / rows_per_line) as usize);
                row += writer.copy_row(x, y + row, width, &mut stream);
            }
        }

        Ok(())
    }

    /// Row stride and total size in bytes of one plane of a decompressed chunk.
    fn plane_size(&self, plane: usize, chunk: u32) -> TiffResult<(usize, usize)> {
        let (width, height) = self.geometry.data_dimensions(chunk);
        let (hsub, vsub) = (
            u32::from(self.layout.chroma_subsampling.0),
            u32::from(self.layout.chroma_subsampling.1),
        );
        let extras = self.layout.extra_samples.len() as u64;

        let (samples_per_line, lines) = match self.stream_kind {
            StreamKind::Contig => (
                u64::from(width) * self.layout.samples_per_pixel() as u64,
                height,
            ),
            StreamKind::DataUnits => {
                let unit_samples = u64::from(hsub * vsub) * (1 + extras) + 2;
                (
                    u64::from(width.div_ceil(hsub)) * unit_samples,
                    height.div_ceil(vsub),
                )
            }
            StreamKind::InterleaveUpsample if plane == 1 || plane == 2 => (
                u64::from(width.div_ceil(hsub)),
                height.div_ceil(vsub),
            ),
            StreamKind::Separate | StreamKind::InterleaveUpsample => (u64::from(width), height),
        };

        let stride = (samples_per_line * u64::from(self.layout.bits_per_sample)).div_ceil(8);
        let size = stride
            .checked_mul(u64::from(lines))
            .ok_or(TiffError::LimitsExceeded)?;
        let size = usize::try_from(size)?;
        if size > self.limits.intermediate_buffer_size {
            return Err(TiffError::LimitsExceeded);
        }

        Ok((usize::try_from(stride)?, size))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sample_type_selection() {
        let mut layout = ImageLayout::new(1, 1, 8, PhotometricInterpretation::BlackIsZero);
        assert_eq!(SampleType::for_layout(&layout).unwrap(), SampleType::U8);
        layout.bits_per_sample = 12;
        assert_eq!(SampleType::for_layout(&layout).unwrap(), SampleType::U16);
        layout.bits_per_sample = 24;
        assert_eq!(SampleType::for_layout(&layout).unwrap(), SampleType::U32);
        layout.sample_format = SampleFormat::IEEEFP;
        assert!(SampleType::for_layout(&layout).is_err());
        layout.bits_per_sample = 16;
        assert_eq!(SampleType::for_layout(&layout).unwrap(), SampleType::F16);
        layout.bits_per_sample = 32;
        assert_eq!(SampleType::for_layout(&layout).unwrap(), SampleType::F32);
        layout.sample_format = SampleFormat::Int;
        assert!(SampleType::for_layout(&layout).is_err());
        layout.photometric_interpretation = PhotometricInterpretation::CIELab;
        assert_eq!(SampleType::for_layout(&layout).unwrap(), SampleType::U32);
    }

    #[test]
    fn palette_decodes_to_u16() {
        let mut layout = ImageLayout::new(1, 1, 4, PhotometricInterpretation::RGBPalette);
        assert_eq!(SampleType::for_layout(&layout).unwrap(), SampleType::U16);
        layout.bits_per_sample = 24;
        assert!(SampleType::for_layout(&layout).is_err());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let layout = ImageLayout::new(0, 4, 8, PhotometricInterpretation::RGB);
        assert!(matches!(
            Decoder::new(layout),
            Err(TiffError::FormatError(TiffFormatError::InvalidDimensions(
                0, 4
            )))
        ));

        let mut layout = ImageLayout::new(4, 4, 8, PhotometricInterpretation::RGB);
        layout.chunk_layout = ChunkLayout::Tiles {
            tile_width: 16,
            tile_length: 0,
        };
        assert!(matches!(
            Decoder::new(layout),
            Err(TiffError::FormatError(TiffFormatError::InvalidChunkSize))
        ));
    }

    #[test]
    fn data_unit_plane_size() {
        // 4x2 image, 2x2 subsampling, alpha: per unit 4 * (1 + 1) + 2 samples.
        let mut layout = ImageLayout::new(4, 2, 8, PhotometricInterpretation::YCbCr);
        layout.chroma_subsampling = (2, 2);
        layout.extra_samples = vec![ExtraSamples::UnassociatedAlpha];
        let decoder = Decoder::new(layout).unwrap();
        assert_eq!(decoder.stream_kind, StreamKind::DataUnits);
        assert_eq!(decoder.plane_size(0, 0).unwrap(), (20, 20));
    }

    #[test]
    fn upsampled_plane_sizes() {
        let mut layout = ImageLayout::new(5, 3, 8, PhotometricInterpretation::YCbCr);
        layout.chroma_subsampling = (2, 2);
        layout.planar_configuration = PlanarConfiguration::Planar;
        let decoder = Decoder::new(layout).unwrap();
        assert_eq!(decoder.planes, 3);
        assert_eq!(decoder.plane_size(0, 0).unwrap(), (5, 15));
        assert_eq!(decoder.plane_size(1, 0).unwrap(), (3, 6));
        assert_eq!(decoder.plane_size(2, 0).unwrap(), (3, 6));
    }

    #[test]
    fn strips_must_hold_whole_data_units() {
        let mut layout = ImageLayout::new(4, 8, 8, PhotometricInterpretation::YCbCr);
        layout.chroma_subsampling = (2, 2);
        layout.chunk_layout = ChunkLayout::Strips { rows_per_strip: 3 };
        assert!(Decoder::new(layout).is_err());
    }

    #[test]
    fn planar_strips_must_hold_whole_chroma_rows() {
        let mut layout = ImageLayout::new(1, 4, 8, PhotometricInterpretation::YCbCr);
        layout.chroma_subsampling = (1, 2);
        layout.planar_configuration = PlanarConfiguration::Planar;
        layout.chunk_layout = ChunkLayout::Strips { rows_per_strip: 3 };
        assert!(matches!(
            Decoder::new(layout.clone()),
            Err(TiffError::FormatError(TiffFormatError::InvalidChunkSize))
        ));

        layout.chunk_layout = ChunkLayout::Strips { rows_per_strip: 2 };
        let decoder = Decoder::new(layout).unwrap();
        assert_eq!(decoder.stream_kind, StreamKind::InterleaveUpsample);
    }

    #[test]
    fn channel_layout_must_fit_colors() {
        let layout = ImageLayout::new(1, 1, 8, PhotometricInterpretation::BlackIsZero);
        let result = Decoder::new(layout)
            .unwrap()
            .with_channel_layout(ChannelLayout::bgra());
        assert!(matches!(
            result,
            Err(TiffError::UsageError(UsageError::ChannelCountMismatch(1, 3)))
        ));

        let mut layout = ImageLayout::new(1, 1, 2, PhotometricInterpretation::RGBPalette);
        layout.color_map = Some(vec![0; 12]);
        assert!(Decoder::new(layout)
            .unwrap()
            .with_channel_layout(ChannelLayout::bgra())
            .is_ok());
    }

    #[test]
    fn transform_type_must_match() {
        let layout = ImageLayout::new(1, 1, 16, PhotometricInterpretation::BlackIsZero);
        let result = Decoder::new(layout)
            .unwrap()
            .with_color_transform_u8(|_| {});
        assert!(matches!(
            result,
            Err(TiffError::UsageError(UsageError::MismatchedTransform(
                "u8", "u16"
            )))
        ));
    }

    #[test]
    fn chunk_limit() {
        let layout = ImageLayout::new(1024, 1024, 8, PhotometricInterpretation::RGB);
        let mut limits = Limits::default();
        limits.intermediate_buffer_size = 1024;
        let decoder = Decoder::new(layout).unwrap().with_limits(limits);
        assert!(matches!(
            decoder.plane_size(0, 0),
            Err(TiffError::LimitsExceeded)
        ));
    }
}
