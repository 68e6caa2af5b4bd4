extern crate tiff_samples;

use tiff_samples::decoder::{BitUnpacker, SampleStream};
use tiff_samples::tags::ByteOrder;

/// Packs `values` most significant bit first, padding the end to a whole byte.
fn pack(values: &[u32], bits: u8) -> Vec<u8> {
    let mut out = Vec::new();
    let mut acc = 0u64;
    let mut filled = 0u32;

    for &value in values {
        acc = (acc << bits) | u64::from(value);
        filled += u32::from(bits);
        while filled >= 8 {
            filled -= 8;
            out.push((acc >> filled) as u8);
        }
        acc &= (1u64 << filled) - 1;
    }
    if filled > 0 {
        out.push((acc << (8 - filled)) as u8);
    }
    out
}

fn samples(count: usize, bits: u8) -> Vec<u32> {
    let mask = ((1u64 << bits) - 1) as u32;
    (0..count as u64)
        .map(|i| (i.wrapping_mul(2_654_435_761).rotate_left(7) as u32) & mask)
        .collect()
}

#[test]
fn every_depth_round_trips() {
    for bits in 1..=32u8 {
        for count in [1, 7, 16, 100] {
            let values = samples(count, bits);
            let data = pack(&values, bits);
            let mut unpacker = BitUnpacker::new(&data, bits, data.len()).unwrap();

            let read: Vec<u32> = (0..count).map(|_| unpacker.next_value()).collect();
            assert_eq!(read, values, "{} samples of {} bits", count, bits);
            assert_eq!(pack(&read, bits), data);
        }
    }
}

#[test]
fn move_to_line_matches_sequential_reads() {
    let (width, height) = (5usize, 4usize);
    for bits in [1u8, 3, 7, 12, 17, 32] {
        let rows: Vec<Vec<u32>> = (0..height)
            .map(|row| {
                let mut values = samples(width * (row + 2), bits);
                values.drain(..width * (row + 1));
                values
            })
            .collect();
        let packed: Vec<Vec<u8>> = rows.iter().map(|row| pack(row, bits)).collect();
        let stride = packed[0].len();
        let data = packed.concat();

        let mut unpacker = BitUnpacker::new(&data, bits, stride).unwrap();
        for line in (0..height).rev() {
            unpacker.move_to_line(line);
            let read: Vec<u32> = (0..width).map(|_| unpacker.next_value()).collect();
            assert_eq!(read, rows[line], "line {} at {} bits", line, bits);
        }

        unpacker.restart();
        let read: Vec<u32> = (0..width).map(|_| unpacker.next_value()).collect();
        assert_eq!(read, rows[0]);
    }
}

#[test]
fn little_endian_whole_bytes() {
    let data = [0x34, 0x12, 0x56, 0x34, 0x12];
    let mut unpacker = BitUnpacker::new(&data[..2], 16, 2)
        .unwrap()
        .with_byte_order(ByteOrder::LittleEndian)
        .unwrap();
    assert_eq!(unpacker.next_value(), 0x1234);

    let mut unpacker = BitUnpacker::new(&data[2..], 24, 3)
        .unwrap()
        .with_byte_order(ByteOrder::LittleEndian)
        .unwrap();
    assert_eq!(unpacker.next_value(), 0x123456);

    assert!(BitUnpacker::new(&data, 12, 2)
        .unwrap()
        .with_byte_order(ByteOrder::LittleEndian)
        .is_err());
}

#[test]
fn separate_planes_round_robin() {
    let red = pack(&[1, 2, 3], 4);
    let green = pack(&[4, 5, 6], 4);
    let blue = pack(&[7, 8, 9], 4);
    let mut stream = SampleStream::separate(
        &[(&red[..], 2), (&green[..], 2), (&blue[..], 2)],
        4,
        ByteOrder::BigEndian,
    )
    .unwrap();

    let read: Vec<u32> = (0..9).map(|_| stream.next_value()).collect();
    assert_eq!(read, [1, 4, 7, 2, 5, 8, 3, 6, 9]);
}
