//! Bit level sample streams over decompressed strip and tile data
//!
//! TIFF packs samples most significant bit first with no padding except at the end of each row,
//! which is padded to a whole byte. A [`BitUnpacker`] walks one such buffer. A [`SampleStream`]
//! presents one or more of them as a single stream of samples in channel order, whatever the
//! planar configuration and chroma subsampling of the image.

use crate::tags::ByteOrder;
use crate::{TiffResult, TiffUnsupportedError, UsageError};

/// Accumulator width used to assemble a sample.
///
/// The three regimes behave the same for well formed input, they only differ in the integer
/// width the bits are collected in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthRegime {
    /// Less than 16 bits per sample.
    Below16,
    /// 16 up to 31 bits per sample.
    Below32,
    /// Exactly 32 bits per sample.
    Above32,
}

impl DepthRegime {
    fn for_depth(bits_per_sample: u8) -> TiffResult<DepthRegime> {
        match bits_per_sample {
            1..=15 => Ok(DepthRegime::Below16),
            16..=31 => Ok(DepthRegime::Below32),
            32 => Ok(DepthRegime::Above32),
            n => Err(TiffUnsupportedError::UnsupportedBitsPerSample(n).into()),
        }
    }
}

macro_rules! unpack_fn {
    ($name:ident, $acc:ty) => {
        /// Collects `depth` bits, continuing in the following bytes if the sample straddles a
        /// byte boundary.
        #[inline(always)]
        fn $name(&mut self) -> u32 {
            let mut remain = self.depth;
            let mut value: $acc = 0;
            while remain > 0 {
                let to_read = remain.min(self.bits_left);
                remain -= to_read;
                self.bits_left -= to_read;

                let byte = <$acc>::from(self.current_byte());
                let mask: $acc = (1 << to_read) - 1;
                value = (value << to_read) | ((byte >> self.bits_left) & mask);

                if self.bits_left == 0 {
                    self.pos += 1;
                    self.bits_left = 8;
                }
            }
            value as u32
        }
    };
}

/// Cursor over one packed sample buffer.
///
/// Reads past the end of the buffer yield zero bits. The caller bounds the number of samples
/// by the chunk geometry, which is validated against the buffer length up front.
#[derive(Clone, Debug)]
pub struct BitUnpacker<'a> {
    data: &'a [u8],
    regime: DepthRegime,
    depth: u8,
    byte_order: ByteOrder,
    line_stride: usize,
    /// Byte holding the next unread bit.
    pos: usize,
    /// Unread bits in the byte at `pos`, always in `1..=8`.
    bits_left: u8,
}

impl<'a> BitUnpacker<'a> {
    /// Creates an unpacker reading `bits_per_sample` bit samples from rows of `line_stride`
    /// bytes.
    pub fn new(data: &'a [u8], bits_per_sample: u8, line_stride: usize) -> TiffResult<Self> {
        Ok(BitUnpacker {
            data,
            regime: DepthRegime::for_depth(bits_per_sample)?,
            depth: bits_per_sample,
            byte_order: ByteOrder::BigEndian,
            line_stride,
            pos: 0,
            bits_left: 8,
        })
    }

    /// Interprets multi-byte samples in the given byte order.
    ///
    /// Only whole byte depths can be stored little endian; anything else is rejected.
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> TiffResult<Self> {
        if byte_order == ByteOrder::LittleEndian && self.depth > 8 && self.depth % 8 != 0 {
            return Err(TiffUnsupportedError::UnsupportedByteOrder(self.depth).into());
        }
        self.byte_order = byte_order;
        Ok(self)
    }

    pub fn regime(&self) -> DepthRegime {
        self.regime
    }

    pub fn bits_per_sample(&self) -> u8 {
        self.depth
    }

    /// Returns the next sample.
    #[inline]
    pub fn next_value(&mut self) -> u32 {
        let value = match self.regime {
            DepthRegime::Below16 => self.unpack_below16(),
            DepthRegime::Below32 => self.unpack_below32(),
            DepthRegime::Above32 => self.unpack_above32(),
        };

        match self.byte_order {
            ByteOrder::LittleEndian if self.depth > 8 => {
                value.swap_bytes() >> (32 - u32::from(self.depth))
            }
            _ => value,
        }
    }

    /// Moves the cursor back to the start of the buffer.
    pub fn restart(&mut self) {
        self.pos = 0;
        self.bits_left = 8;
    }

    /// Moves the cursor to the first sample of row `line`.
    pub fn move_to_line(&mut self, line: usize) {
        self.pos = line * self.line_stride;
        self.bits_left = 8;
    }

    #[inline(always)]
    fn current_byte(&self) -> u8 {
        self.data.get(self.pos).copied().unwrap_or(0)
    }

    unpack_fn!(unpack_below16, u16);
    unpack_fn!(unpack_below32, u32);
    unpack_fn!(unpack_above32, u64);
}

/// Separate planes read round-robin, one sample from each plane in turn.
#[derive(Clone, Debug)]
pub struct Separate<'a> {
    planes: Vec<BitUnpacker<'a>>,
    current: usize,
}

impl<'a> Separate<'a> {
    /// Fails without at least one plane.
    pub fn new(planes: Vec<BitUnpacker<'a>>) -> TiffResult<Self> {
        if planes.is_empty() {
            return Err(UsageError::PlaneCountMismatch(1, 0).into());
        }
        Ok(Separate { planes, current: 0 })
    }

    #[inline]
    pub fn next_value(&mut self) -> u32 {
        let value = self.planes[self.current].next_value();
        self.current += 1;
        if self.current == self.planes.len() {
            self.current = 0;
        }
        value
    }

    pub fn restart(&mut self) {
        self.planes.iter_mut().for_each(BitUnpacker::restart);
        self.current = 0;
    }

    pub fn move_to_line(&mut self, line: usize) {
        self.planes.iter_mut().for_each(|p| p.move_to_line(line));
        self.current = 0;
    }
}

/// Separate YCbCr planes whose chroma planes (1 and 2) are subsampled.
///
/// Yields Y, Cb, Cr and the extra samples of every pixel in turn. A chroma sample is read from
/// its plane on the first pixel of each horizontal block and repeated for the rest of the block;
/// rows in the same vertical block read the same chroma row.
#[derive(Clone, Debug)]
pub struct InterleaveUpsample<'a> {
    planes: Vec<BitUnpacker<'a>>,
    hsub: usize,
    vsub: usize,
    current: usize,
    column: usize,
    chroma: [u32; 2],
}

impl<'a> InterleaveUpsample<'a> {
    /// Fails unless `planes` holds at least the Y, Cb and Cr planes.
    pub fn new(planes: Vec<BitUnpacker<'a>>, hsub: u16, vsub: u16) -> TiffResult<Self> {
        if planes.len() < 3 {
            return Err(UsageError::PlaneCountMismatch(3, planes.len()).into());
        }
        Ok(InterleaveUpsample {
            planes,
            hsub: usize::from(hsub.max(1)),
            vsub: usize::from(vsub.max(1)),
            current: 0,
            column: 0,
            chroma: [0; 2],
        })
    }

    #[inline]
    pub fn next_value(&mut self) -> u32 {
        let plane = self.current;
        let value = match plane {
            1 | 2 => {
                if self.column % self.hsub == 0 {
                    self.chroma[plane - 1] = self.planes[plane].next_value();
                }
                self.chroma[plane - 1]
            }
            _ => self.planes[plane].next_value(),
        };

        self.current += 1;
        if self.current == self.planes.len() {
            self.current = 0;
            self.column += 1;
        }
        value
    }

    pub fn restart(&mut self) {
        self.planes.iter_mut().for_each(BitUnpacker::restart);
        self.current = 0;
        self.column = 0;
    }

    pub fn move_to_line(&mut self, line: usize) {
        for (index, plane) in self.planes.iter_mut().enumerate() {
            match index {
                1 | 2 => plane.move_to_line(line / self.vsub),
                _ => plane.move_to_line(line),
            }
        }
        self.current = 0;
        self.column = 0;
    }
}

/// All samples of a chunk in channel order, regardless of how they are stored.
///
/// The variant is picked once per chunk so the per-sample loop dispatches on a plain enum.
#[derive(Clone, Debug)]
pub enum SampleStream<'a> {
    /// Interleaved samples in a single buffer.
    Contig(BitUnpacker<'a>),
    /// One buffer per sample.
    Separate(Separate<'a>),
    /// One buffer per sample, chroma planes subsampled.
    InterleaveUpsample(InterleaveUpsample<'a>),
}

impl<'a> SampleStream<'a> {
    /// A stream over interleaved samples with rows of `line_stride` bytes.
    pub fn contiguous(
        data: &'a [u8],
        bits_per_sample: u8,
        line_stride: usize,
        byte_order: ByteOrder,
    ) -> TiffResult<Self> {
        let unpacker = BitUnpacker::new(data, bits_per_sample, line_stride)?
            .with_byte_order(byte_order)?;
        Ok(SampleStream::Contig(unpacker))
    }

    /// A stream over separate planes, each given as its data and row stride in bytes.
    pub fn separate(
        planes: &[(&'a [u8], usize)],
        bits_per_sample: u8,
        byte_order: ByteOrder,
    ) -> TiffResult<Self> {
        let planes = Self::unpackers(planes, bits_per_sample, byte_order)?;
        Ok(SampleStream::Separate(Separate::new(planes)?))
    }

    /// A stream over separate YCbCr planes with chroma subsampled by `hsub` x `vsub`.
    pub fn interleave_upsample(
        planes: &[(&'a [u8], usize)],
        bits_per_sample: u8,
        byte_order: ByteOrder,
        hsub: u16,
        vsub: u16,
    ) -> TiffResult<Self> {
        let planes = Self::unpackers(planes, bits_per_sample, byte_order)?;
        Ok(SampleStream::InterleaveUpsample(InterleaveUpsample::new(
            planes, hsub, vsub,
        )?))
    }

    fn unpackers(
        planes: &[(&'a [u8], usize)],
        bits_per_sample: u8,
        byte_order: ByteOrder,
    ) -> TiffResult<Vec<BitUnpacker<'a>>> {
        planes
            .iter()
            .map(|&(data, stride)| {
                BitUnpacker::new(data, bits_per_sample, stride)?.with_byte_order(byte_order)
            })
            .collect()
    }

    #[inline]
    pub fn next_value(&mut self) -> u32 {
        match self {
            SampleStream::Contig(s) => s.next_value(),
            SampleStream::Separate(s) => s.next_value(),
            SampleStream::InterleaveUpsample(s) => s.next_value(),
        }
    }

    pub fn restart(&mut self) {
        match self {
            SampleStream::Contig(s) => s.restart(),
            SampleStream::Separate(s) => s.restart(),
            SampleStream::InterleaveUpsample(s) => s.restart(),
        }
    }

    pub fn move_to_line(&mut self, line: usize) {
        match self {
            SampleStream::Contig(s) => s.move_to_line(line),
            SampleStream::Separate(s) => s.move_to_line(line),
            SampleStream::InterleaveUpsample(s) => s.move_to_line(line),
        }
    }
}
