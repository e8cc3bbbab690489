//! First-fit free-list allocator over a linear range of buffer elements.
//!
//! The allocator only does bookkeeping: it hands out element offsets inside
//! `[0, capacity)` and never touches the GPU. Free blocks are kept sorted by
//! offset so that freeing can find its neighbours with a binary search and merge
//! with them.

use std::collections::HashMap;

/// A contiguous element range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub offset: u32,
    pub size: u32,
}

impl Block {
    #[inline]
    pub fn end(&self) -> u32 {
        self.offset + self.size
    }
}

#[derive(Debug, Clone)]
pub struct FreeListAllocator {
    capacity: u32,
    /// Sorted by offset, never adjacent to each other.
    free_blocks: Vec<Block>,
    /// Live allocation sizes keyed by offset.
    allocations: HashMap<u32, u32>,
}

impl FreeListAllocator {
    pub fn new(capacity: u32) -> Self {
        let free_blocks = if capacity > 0 {
            vec![Block {
                offset: 0,
                size: capacity,
            }]
        } else {
            Vec::new()
        };
        Self {
            capacity,
            free_blocks,
            allocations: HashMap::new(),
        }
    }

    /// Reserves `size` elements at the lowest offset that fits.
    ///
    /// Returns `None` when no free block is large enough; the caller is expected
    /// to [`grow`](Self::grow) and retry. Zero-sized requests are refused.
    pub fn allocate(&mut self, size: u32) -> Option<u32> {
        if size == 0 {
            return None;
        }
        let index = self.free_blocks.iter().position(|block| block.size >= size)?;

        let block = &mut self.free_blocks[index];
        let offset = block.offset;
        if block.size == size {
            self.free_blocks.remove(index);
        } else {
            block.offset += size;
            block.size -= size;
        }

        self.allocations.insert(offset, size);
        Some(offset)
    }

    /// Releases the allocation starting at `offset`.
    ///
    /// Returns `false` if there is no live allocation at that offset.
    pub fn free(&mut self, offset: u32) -> bool {
        let Some(size) = self.allocations.remove(&offset) else {
            return false;
        };

        let index = match self
            .free_blocks
            .binary_search_by_key(&offset, |block| block.offset)
        {
            Ok(index) | Err(index) => index,
        };
        self.free_blocks.insert(index, Block { offset, size });

        // Merge with the successor first so `index` stays valid.
        if index + 1 < self.free_blocks.len()
            && self.free_blocks[index].end() == self.free_blocks[index + 1].offset
        {
            self.free_blocks[index].size += self.free_blocks[index + 1].size;
            self.free_blocks.remove(index + 1);
        }
        if index > 0 && self.free_blocks[index - 1].end() == self.free_blocks[index].offset {
            self.free_blocks[index - 1].size += self.free_blocks[index].size;
            self.free_blocks.remove(index);
        }
        true
    }

    /// Extends the managed range to `new_capacity`. Shrinking is ignored.
    pub fn grow(&mut self, new_capacity: u32) {
        if new_capacity <= self.capacity {
            return;
        }
        let added = Block {
            offset: self.capacity,
            size: new_capacity - self.capacity,
        };
        self.capacity = new_capacity;

        match self.free_blocks.last_mut() {
            Some(last) if last.end() == added.offset => last.size += added.size,
            _ => self.free_blocks.push(added),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Size of the live allocation at `offset`.
    pub fn allocation_size(&self, offset: u32) -> Option<u32> {
        self.allocations.get(&offset).copied()
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Elements currently handed out.
    pub fn used(&self) -> u32 {
        self.allocations.values().sum()
    }

    pub fn free_blocks(&self) -> &[Block] {
        &self.free_blocks
    }

    /// Largest single allocation that would currently succeed without growing.
    pub fn largest_free_block(&self) -> u32 {
        self.free_blocks.iter().map(|block| block.size).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Checks that free and live ranges tile `[0, capacity)` exactly.
    fn assert_tiles_capacity(allocator: &FreeListAllocator) {
        let mut ranges: Vec<(u32, u32, bool)> = allocator
            .free_blocks()
            .iter()
            .map(|block| (block.offset, block.size, true))
            .chain(
                allocator
                    .allocations
                    .iter()
                    .map(|(offset, size)| (*offset, *size, false)),
            )
            .collect();
        ranges.sort_by_key(|range| range.0);

        let mut cursor = 0;
        let mut previous_free = false;
        for (offset, size, is_free) in ranges {
            assert_eq!(offset, cursor, "gap or overlap at {offset}");
            assert!(size > 0);
            assert!(!(is_free && previous_free), "uncoalesced free blocks at {offset}");
            cursor = offset + size;
            previous_free = is_free;
        }
        assert_eq!(cursor, allocator.capacity());
    }

    #[test]
    fn test_first_fit_splits_the_lowest_block() {
        let mut allocator = FreeListAllocator::new(100);
        assert_eq!(allocator.allocate(10), Some(0));
        assert_eq!(allocator.allocate(20), Some(10));
        assert_eq!(allocator.free_blocks(), &[Block { offset: 30, size: 70 }]);
        assert_tiles_capacity(&allocator);
    }

    #[test]
    fn test_single_allocation_round_trip_restores_one_block() {
        let mut allocator = FreeListAllocator::new(64);
        let offset = allocator.allocate(17).unwrap();
        assert!(allocator.free(offset));
        assert_eq!(allocator.free_blocks(), &[Block { offset: 0, size: 64 }]);
    }

    #[test]
    fn test_free_coalesces_both_neighbors() {
        let mut allocator = FreeListAllocator::new(30);
        let a = allocator.allocate(10).unwrap();
        let b = allocator.allocate(10).unwrap();
        let c = allocator.allocate(10).unwrap();

        assert_eq!(allocator.allocation_count(), 3);
        assert_eq!(allocator.largest_free_block(), 0);

        allocator.free(a);
        allocator.free(c);
        assert_eq!(allocator.free_blocks().len(), 2);
        assert_eq!(allocator.allocation_count(), 1);
        assert_eq!(allocator.largest_free_block(), 10);

        allocator.free(b);
        assert_eq!(allocator.free_blocks(), &[Block { offset: 0, size: 30 }]);
        assert_eq!(allocator.allocation_count(), 0);
        assert_eq!(allocator.largest_free_block(), 30);
    }

    #[test]
    fn test_unknown_offset_and_zero_size_are_rejected() {
        let mut allocator = FreeListAllocator::new(8);
        assert!(!allocator.free(3));
        assert_eq!(allocator.allocate(0), None);
        assert_eq!(allocator.allocate(9), None);
    }

    #[test]
    fn test_grow_appends_and_merges_with_trailing_free_block() {
        let mut allocator = FreeListAllocator::new(10);
        let head = allocator.allocate(6).unwrap();
        assert_eq!(allocator.allocate(8), None);

        allocator.grow(20);
        assert_eq!(allocator.free_blocks(), &[Block { offset: 6, size: 14 }]);
        assert_eq!(allocator.allocate(8), Some(6));
        assert_eq!(allocator.allocation_size(head), Some(6));
        assert_tiles_capacity(&allocator);
    }

    #[test]
    fn test_grow_after_full_buffer_appends_a_new_block() {
        let mut allocator = FreeListAllocator::new(4);
        allocator.allocate(4).unwrap();
        allocator.grow(8);
        assert_eq!(allocator.free_blocks(), &[Block { offset: 4, size: 4 }]);
    }

    #[test]
    fn test_random_sequences_keep_the_tiling_invariant() {
        let mut rng = fastrand::Rng::with_seed(0x5EED);
        let mut allocator = FreeListAllocator::new(256);
        let mut live = Vec::new();

        for _ in 0..2_000 {
            match rng.u8(0..10) {
                0..=5 => {
                    let size = rng.u32(1..40);
                    match allocator.allocate(size) {
                        Some(offset) => live.push(offset),
                        None => allocator.grow(allocator.capacity() * 2),
                    }
                }
                _ if !live.is_empty() => {
                    let offset = live.swap_remove(rng.usize(0..live.len()));
                    assert!(allocator.free(offset));
                }
                _ => {}
            }
            assert_tiles_capacity(&allocator);
        }

        for offset in live {
            allocator.free(offset);
        }
        assert_eq!(
            allocator.free_blocks(),
            &[Block {
                offset: 0,
                size: allocator.capacity()
            }]
        );
        assert_eq!(allocator.used(), 0);
    }
}
