//! Sample unpacking and pixel reconstruction for TIFF images
//!
//! TIFF (Tagged Image File Format) stores samples as a packed bit stream of any depth between
//! 1 and 32 bits, either interleaved per pixel or in separate planes, with optional chroma
//! subsampling and premultiplied alpha. This crate turns the (decompressed) bytes of strips and
//! tiles into typed, interleaved pixel buffers.
//!
//! Parsing the TIFF directory is left to the caller, who describes the image with a
//! [`decoder::ImageLayout`] and hands chunk data to a [`decoder::Decoder`].
//!
//! # Related Links
//! * <https://web.archive.org/web/20210108073850/https://www.adobe.io/open/standards/TIFF.html> - The TIFF specification

pub mod decoder;
mod error;
pub mod tags;

pub use self::error::{TiffError, TiffFormatError, TiffResult, TiffUnsupportedError, UsageError};
