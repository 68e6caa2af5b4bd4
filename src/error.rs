use std::io;
use std::num::TryFromIntError;

use quick_error::quick_error;

use crate::tags::{CompressionMethod, PhotometricInterpretation, SampleFormat};

quick_error! {
    /// Tiff error kinds.
    #[derive(Debug)]
    pub enum TiffError {
        /// The Image is not formatted properly.
        FormatError(err: TiffFormatError) {
            display("format error: {}", err)
            from()
        }
        /// The Decoder does not support features required by the image.
        UnsupportedError(err: TiffUnsupportedError) {
            display("the decoder does not support the image format `{}`", err)
            from()
        }
        /// An I/O Error occurred while decoding the image.
        IoError(err: io::Error) {
            display("{}", err)
            source(err)
            from()
        }
        /// The Limits of the Decoder is exceeded.
        LimitsExceeded {
            display("the decoder limits are exceeded")
        }
        /// An integer conversion to or from a platform size failed.
        IntSizeError {
            display("platform or format size limits exceeded")
            from(TryFromIntError)
        }
        /// The image does not support the requested operation.
        UsageError(err: UsageError) {
            display("usage error: {}", err)
            from()
        }
    }
}

quick_error! {
    /// The image is not formatted properly.
    ///
    /// This indicates that the layout handed to the decoder, or the chunk data matching it, is
    /// inconsistent. Geometry is checked before any sample is unpacked.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum TiffFormatError {
        /// Width or height is zero.
        InvalidDimensions(width: u32, height: u32) {
            display("invalid image dimensions {}x{}", width, height)
        }
        /// Strip or tile size is zero.
        InvalidChunkSize {
            display("strip or tile dimensions must be non-zero")
        }
        /// A chunk decompressed to fewer bytes than its geometry requires.
        InconsistentSizesEncountered { chunk: u32, expected: usize, found: usize } {
            display("chunk {} holds {} bytes but {} are required", chunk, found, expected)
        }
        /// The alpha sample refers to an extra sample that does not exist.
        InvalidAlphaIndex(index: usize, extra_samples: usize) {
            display("alpha sample {} out of range for {} extra samples", index, extra_samples)
        }
        /// Chroma subsampling factors must be one of 1, 2 or 4.
        InvalidChromaSubsampling(horizontal: u16, vertical: u16) {
            display("invalid chroma subsampling {}x{}", horizontal, vertical)
        }
        /// The palette does not have `3 * 2^bits` entries.
        InvalidColorMap { expected: usize, found: usize } {
            display("color map has {} entries, expected {}", found, expected)
        }
        /// A palette image without a color map.
        ColorMapNotFound {
            display("palette image is missing its color map")
        }
        /// The number of samples does not match the photometric interpretation.
        SamplesPerPixelMismatch(photometric: PhotometricInterpretation, samples: u16) {
            display("{:?} images cannot have {} color samples", photometric, samples)
        }
        /// A decompressor rejected the chunk data.
        CompressedDataCorrupt(message: String) {
            display("compressed data is corrupt: {}", message)
        }
    }
}

quick_error! {
    /// The Decoder does not support features required by the image.
    ///
    /// Returned while selecting a stream or writer variant, never from inside a decode loop.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum TiffUnsupportedError {
        UnsupportedBitsPerSample(bits: u8) {
            display("{} bits per sample", bits)
        }
        UnsupportedSampleFormat(format: SampleFormat, bits: u8) {
            display("sample format {:?} with {} bits per sample", format, bits)
        }
        UnsupportedCompressionMethod(method: CompressionMethod) {
            display("compression method {:?}", method)
        }
        UnsupportedInterpretation(photometric: PhotometricInterpretation) {
            display("photometric interpretation {:?}", photometric)
        }
        UnsupportedByteOrder(bits: u8) {
            display("little endian samples of {} bits, only whole bytes can be swapped", bits)
        }
    }
}

quick_error! {
    /// User attempted to use the Decoder in a way that is incompatible with a specific image.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum UsageError {
        /// A color transform was installed for a destination type the image does not decode to.
        MismatchedTransform(requested: &'static str, actual: &'static str) {
            display("color transform for {} pixels installed, image decodes to {}", requested, actual)
        }
        /// A channel layout does not fit the source samples or the destination buffer.
        ChannelCountMismatch(expected: usize, found: usize) {
            display("expected {} channels, found {}", expected, found)
        }
        /// A channel position lies outside the destination pixel or is used twice.
        InvalidChannelPosition(position: usize, channels: usize) {
            display("channel position {} is taken or outside a {} channel pixel", position, channels)
        }
        /// A sample stream was built from too few planes.
        PlaneCountMismatch(minimum: usize, found: usize) {
            display("expected at least {} planes, found {}", minimum, found)
        }
        /// The chunk source has no data for the requested chunk.
        MissingChunk(index: u32) {
            display("no data for chunk {}", index)
        }
    }
}

/// Result of an image decoding process
pub type TiffResult<T> = Result<T, TiffError>;
