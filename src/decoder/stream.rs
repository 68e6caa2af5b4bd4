//! Decompression of strip and tile data
//!
//! Every chunk is held in memory as a whole, so the decompressors work on slices and stop as
//! soon as the chunk geometry is filled.

use crate::tags::CompressionMethod;
use crate::{TiffError, TiffFormatError, TiffResult, TiffUnsupportedError};

fn corrupt(message: impl ToString) -> TiffError {
    TiffFormatError::CompressedDataCorrupt(message.to_string()).into()
}

/// Whether chunks compressed with `method` can be turned into a plain sample stream.
pub(crate) fn check_compression(method: CompressionMethod) -> TiffResult<()> {
    match method {
        CompressionMethod::None | CompressionMethod::PackBits => Ok(()),
        #[cfg(feature = "lzw")]
        CompressionMethod::LZW => Ok(()),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate | CompressionMethod::OldDeflate => Ok(()),
        method => Err(TiffUnsupportedError::UnsupportedCompressionMethod(method).into()),
    }
}

/// Decompresses one chunk into an owned buffer of at most `expected` bytes.
///
/// The result may be shorter than `expected`; the caller compares it against the chunk
/// geometry.
pub(crate) fn decompress(
    method: CompressionMethod,
    mut data: Vec<u8>,
    expected: usize,
) -> TiffResult<Vec<u8>> {
    match method {
        CompressionMethod::None => {
            data.truncate(expected);
            Ok(data)
        }
        CompressionMethod::PackBits => unpack_bits(&data, expected),
        #[cfg(feature = "lzw")]
        CompressionMethod::LZW => decode_lzw(&data, expected),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate | CompressionMethod::OldDeflate => inflate(&data, expected),
        method => Err(TiffUnsupportedError::UnsupportedCompressionMethod(method).into()),
    }
}

/// Expands Apple's `PackBits` runs.
///
/// A header `n` in `0..=127` is followed by `n + 1` literal bytes, `-127..=-1` by one byte
/// repeated `1 - n` times, and `-128` is skipped.
fn unpack_bits(data: &[u8], expected: usize) -> TiffResult<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    let mut pos = 0;

    while out.len() < expected && pos < data.len() {
        let header = data[pos] as i8;
        pos += 1;

        match header {
            -128 => {}
            0..=127 => {
                let end = pos + header as usize + 1;
                let literal = data
                    .get(pos..end)
                    .ok_or_else(|| corrupt("packbits literal run is truncated"))?;
                out.extend_from_slice(literal);
                pos = end;
            }
            _ => {
                let value = *data
                    .get(pos)
                    .ok_or_else(|| corrupt("packbits repeat run is truncated"))?;
                pos += 1;
                let count = (1 - isize::from(header)) as usize;
                out.resize(out.len() + count, value);
            }
        }
    }

    out.truncate(expected);
    Ok(out)
}

#[cfg(feature = "lzw")]
fn decode_lzw(data: &[u8], expected: usize) -> TiffResult<Vec<u8>> {
    let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
    let mut out = vec![0; expected];
    let (mut read, mut written) = (0, 0);

    while written < expected {
        let result = decoder.decode_bytes(&data[read..], &mut out[written..]);
        read += result.consumed_in;
        written += result.consumed_out;

        match result.status {
            Ok(weezl::LzwStatus::Ok) => {}
            Ok(weezl::LzwStatus::Done) => break,
            Ok(weezl::LzwStatus::NoProgress) => return Err(corrupt("no lzw end code found")),
            Err(err) => return Err(corrupt(err)),
        }
    }

    out.truncate(written);
    Ok(out)
}

#[cfg(feature = "deflate")]
fn inflate(data: &[u8], expected: usize) -> TiffResult<Vec<u8>> {
    use std::io::{self, Read};

    let mut out = Vec::with_capacity(expected);
    flate2::read::ZlibDecoder::new(data)
        .take(expected as u64)
        .read_to_end(&mut out)
        .map_err(|err| match err.kind() {
            io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof => corrupt(err),
            _ => TiffError::IoError(err),
        })?;
    Ok(out)
}
