//! Autofocus point bitmap remapping.
//!
//! The camera reports and accepts focus points as a 32-bit wire bitmap whose
//! bit order is model specific; the public API exclusively speaks zero-based
//! row-major indices (top-left point is index 0).

use itertools::Itertools;

/// Row-major index carried by each wire bit on 27-point bodies.  11-point
/// bodies use the identity mapping.
const WIRE_TO_ROW_MAJOR_27: [u32; 27] = [
    16, 10, // bits 0-1
    26, 25, 24, 23, 22, 21, 20, 19, 18, 17, // bits 2-11
    15, 14, 13, 12, 11, // bits 12-16
    9, 8, 7, 6, 5, 4, 3, 2, 1, 0, // bits 17-26
];

fn wire_to_row_major(bit: u32, af_point_count: u32) -> Option<u32> {
    match af_point_count {
        11 if bit < 11 => Some(bit),
        27 => WIRE_TO_ROW_MAJOR_27.get(bit as usize).copied(),
        _ => None,
    }
}

/// Decodes a wire bitmap into row-major point indices, in strictly ascending
/// order.  Bits beyond the model's point count are ignored.
pub fn decode_af_points(mask: u32, af_point_count: u32) -> Vec<u32> {
    (0..af_point_count.min(32))
        .filter(|bit| mask & (1 << bit) != 0)
        .filter_map(|bit| wire_to_row_major(bit, af_point_count))
        .sorted_unstable()
        .collect()
}

/// Encodes row-major point indices into the wire bitmap.  Duplicates collapse
/// into the same bit; indices beyond the model's point count are ignored.
pub fn encode_af_points(indices: &[u32], af_point_count: u32) -> u32 {
    (0..af_point_count.min(32))
        .filter(|&bit| {
            wire_to_row_major(bit, af_point_count)
                .is_some_and(|index| indices.contains(&index))
        })
        .fold(0, |mask, bit| mask | (1 << bit))
}
