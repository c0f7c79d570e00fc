//! Bit allocator
//!
//! Free functions over a chunked bitmap, used by the kernel's
//! notification buffer pool. A set bit marks an allocated slot.

use crate::sysmap::{BitChunk, BITCHUNK_BITS};

/// Allocate the lowest free bit, marking it used.
///
/// Returns `None` when all `nr_bits` are taken.
#[must_use]
pub fn alloc_bit(map: &mut [BitChunk], nr_bits: usize) -> Option<usize> {
    for (ci, chunk) in map.iter_mut().enumerate() {
        if *chunk == BitChunk::MAX {
            continue;
        }
        let bit = chunk.trailing_ones() as usize;
        let nr = ci * BITCHUNK_BITS + bit;
        if nr >= nr_bits {
            return None;
        }
        *chunk |= 1 << bit;
        return Some(nr);
    }
    None
}

/// Release a previously allocated bit.
///
/// # Panics
///
/// Panics in debug builds if the bit was not allocated; a double free
/// here means a notification buffer was consumed twice.
pub fn free_bit(map: &mut [BitChunk], bit: usize) {
    let chunk = &mut map[bit / BITCHUNK_BITS];
    let mask = 1 << (bit % BITCHUNK_BITS);
    debug_assert!(*chunk & mask != 0, "freeing an unallocated bit");
    *chunk &= !mask;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysmap::bitmap_chunks;

    const BITS: usize = 40;
    const CHUNKS: usize = bitmap_chunks(BITS);

    #[test]
    fn test_alloc_is_lowest_first() {
        let mut map = [0 as BitChunk; CHUNKS];
        assert_eq!(alloc_bit(&mut map, BITS), Some(0));
        assert_eq!(alloc_bit(&mut map, BITS), Some(1));
        free_bit(&mut map, 0);
        assert_eq!(alloc_bit(&mut map, BITS), Some(0));
    }

    #[test]
    fn test_exhaustion() {
        let mut map = [0 as BitChunk; CHUNKS];
        for expect in 0..BITS {
            assert_eq!(alloc_bit(&mut map, BITS), Some(expect));
        }
        assert_eq!(alloc_bit(&mut map, BITS), None);

        free_bit(&mut map, 17);
        assert_eq!(alloc_bit(&mut map, BITS), Some(17));
        assert_eq!(alloc_bit(&mut map, BITS), None);
    }
}
