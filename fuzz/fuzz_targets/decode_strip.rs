#![no_main]
use libfuzzer_sys::fuzz_target;

use tiff_samples::decoder::{ChunkLayout, Decoder, ImageLayout, Limits};
use tiff_samples::tags::{
    CompressionMethod, ExtraSamples, PhotometricInterpretation, PlanarConfiguration,
    SampleFormat,
};

const PHOTOMETRIC: [PhotometricInterpretation; 6] = [
    PhotometricInterpretation::WhiteIsZero,
    PhotometricInterpretation::BlackIsZero,
    PhotometricInterpretation::RGB,
    PhotometricInterpretation::CMYK,
    PhotometricInterpretation::YCbCr,
    PhotometricInterpretation::CIELab,
];

const COMPRESSION: [CompressionMethod; 4] = [
    CompressionMethod::None,
    CompressionMethod::PackBits,
    CompressionMethod::LZW,
    CompressionMethod::Deflate,
];

// The first bytes pick the layout, the rest is split into four chunks.
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let (header, body) = data.split_at(8);

    let photometric = PHOTOMETRIC[usize::from(header[0]) % PHOTOMETRIC.len()];
    let bits = header[1] % 33;
    let mut layout = ImageLayout::new(
        u32::from(header[2] % 64) + 1,
        u32::from(header[3] % 64) + 1,
        bits,
        photometric,
    );
    if header[4] & 1 != 0 {
        layout.sample_format = SampleFormat::IEEEFP;
    }
    if header[4] & 2 != 0 {
        layout.planar_configuration = PlanarConfiguration::Planar;
    }
    if header[4] & 4 != 0 {
        layout.extra_samples = vec![ExtraSamples::AssociatedAlpha];
    }
    if header[4] & 8 != 0 {
        layout.chunk_layout = ChunkLayout::Tiles {
            tile_width: 16,
            tile_length: 16,
        };
    } else {
        layout.chunk_layout = ChunkLayout::Strips {
            rows_per_strip: u32::from(header[5] % 16) + 1,
        };
    }
    layout.chroma_subsampling = (1 << (header[6] % 3), 1 << ((header[6] >> 2) % 3));
    layout.compression_method = COMPRESSION[usize::from(header[7]) % COMPRESSION.len()];

    let decoder = if let Ok(d) = Decoder::new(layout) {
        d
    } else {
        return;
    };

    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1_000_000;
    limits.intermediate_buffer_size = 1_000_000;

    let mut chunks: Vec<Vec<u8>> = body.chunks(body.len() / 4 + 1).map(<[u8]>::to_vec).collect();
    let _ = decoder.with_limits(limits).read_image(&mut chunks);
});
