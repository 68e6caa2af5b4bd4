use super::ChunkLayout;

/// Placement of strips or tiles within one plane of the image.
///
/// Tiles are always stored at full size, padded past the right and bottom edge. The last strip
/// only holds the rows that remain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ChunkGeometry {
    pub image_width: u32,
    pub image_height: u32,
    pub chunk_width: u32,
    pub chunk_height: u32,
    pub tiled: bool,
}

impl ChunkGeometry {
    pub fn new(image_width: u32, image_height: u32, chunk_layout: ChunkLayout) -> Self {
        match chunk_layout {
            ChunkLayout::Strips { rows_per_strip } => ChunkGeometry {
                image_width,
                image_height,
                chunk_width: image_width,
                chunk_height: rows_per_strip.min(image_height),
                tiled: false,
            },
            ChunkLayout::Tiles {
                tile_width,
                tile_length,
            } => ChunkGeometry {
                image_width,
                image_height,
                chunk_width: tile_width,
                chunk_height: tile_length,
                tiled: true,
            },
        }
    }

    pub fn chunks_across(&self) -> u32 {
        self.image_width.div_ceil(self.chunk_width)
    }

    pub fn chunks_down(&self) -> u32 {
        self.image_height.div_ceil(self.chunk_height)
    }

    pub fn chunks_per_plane(&self) -> u32 {
        self.chunks_across() * self.chunks_down()
    }

    /// Image coordinates of the top left pixel of a chunk.
    pub fn origin(&self, chunk: u32) -> (u32, u32) {
        let row = chunk / self.chunks_across();
        let column = chunk % self.chunks_across();
        (column * self.chunk_width, row * self.chunk_height)
    }

    /// Dimensions of the pixel data stored in a chunk, padding included.
    pub fn data_dimensions(&self, chunk: u32) -> (u32, u32) {
        if self.tiled {
            (self.chunk_width, self.chunk_height)
        } else {
            self.visible_dimensions(chunk)
        }
    }

    /// Dimensions of the part of a chunk that lies inside the image.
    pub fn visible_dimensions(&self, chunk: u32) -> (u32, u32) {
        let (x, y) = self.origin(chunk);
        (
            self.chunk_width.min(self.image_width - x),
            self.chunk_height.min(self.image_height - y),
        )
    }
}
