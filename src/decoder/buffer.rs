use std::mem;
use std::slice::ChunksExactMut;

use super::sample::Sample;
use super::Limits;
use crate::{TiffError, TiffResult};

/// An owned, interleaved pixel buffer in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuffer<T> {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<T>,
}

impl<T: Sample> ImageBuffer<T> {
    /// Allocates a zeroed buffer, failing if it would exceed `limits.decoding_buffer_size`.
    pub fn new(width: u32, height: u32, channels: usize, limits: &Limits) -> TiffResult<Self> {
        let len = usize::try_from(width)?
            .checked_mul(usize::try_from(height)?)
            .and_then(|n| n.checked_mul(channels))
            .ok_or(TiffError::LimitsExceeded)?;

        if len > limits.decoding_buffer_size / mem::size_of::<T>() {
            return Err(TiffError::LimitsExceeded);
        }

        Ok(ImageBuffer {
            width,
            height,
            channels,
            data: vec![T::default(); len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Samples per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The samples of the pixel at `(x, y)`, or `None` outside of the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[T]> {
        let start = self.offset(x, y)?;
        Some(&self.data[start..start + self.channels])
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [T]> {
        let start = self.offset(x, y)?;
        Some(&mut self.data[start..start + self.channels])
    }

    /// Iterates over the rows of the image, each row holding `width * channels` samples.
    pub fn rows_mut(&mut self) -> ChunksExactMut<'_, T> {
        let row_len = (self.width as usize * self.channels).max(1);
        self.data.chunks_exact_mut(row_len)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<T> {
        self.data
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * self.channels)
    }
}
