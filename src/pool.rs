/* Generic sparse voxel octree with level of detail and ray casting.
Copyright (C) 2023  Alexander Pyattaev

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Pool of fixed size blocks, used to hold the 8-node clusters of the tree.
use slab::Slab;
use std::num::NonZeroU32;
use std::ops::{Index, IndexMut};

/// Relative pointer to a block in the pool. Kept 32bit for cache locality during lookups,
/// and non-zero so that `Option<BlockPtr>` is the same size.
/// Should you need > 4 billion blocks do let me know who sells you the RAM.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct BlockPtr(NonZeroU32);

impl BlockPtr {
    /// Generate a handle for slot x
    #[inline]
    fn valid(x: usize) -> Self {
        debug_assert!(x < u32::MAX as usize);
        Self(NonZeroU32::MIN.saturating_add(x as u32))
    }

    /// Cast to slot index
    #[inline]
    fn usize(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl core::fmt::Display for BlockPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("BlockPtr({})", self.usize()))
    }
}

/// Fixed size block allocator. Freed blocks go back into the pool for reuse,
/// memory is only handed back to the system on [`BlockPool::shrink_to_fit`] or drop.
#[derive(Clone, Debug)]
pub struct BlockPool<B> {
    blocks: Slab<B>,
}

impl<B> Default for BlockPool<B> {
    fn default() -> Self {
        Self::new()
    }
}

const PANIC_MSG: &str = "Invalid block pointer into BlockPool";

impl<B> BlockPool<B> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            blocks: Slab::with_capacity(cap),
        }
    }

    /// Stores a block in the pool, reusing a freed slot when possible.
    /// Running out of memory or handles is fatal.
    #[inline]
    pub fn alloc(&mut self, block: B) -> BlockPtr {
        assert!(
            self.blocks.vacant_key() < u32::MAX as usize,
            "BlockPool is out of block handles"
        );
        BlockPtr::valid(self.blocks.insert(block))
    }

    /// Returns the block to the pool, handing back its contents.
    #[inline]
    pub fn free(&mut self, ptr: BlockPtr) -> B {
        match self.blocks.try_remove(ptr.usize()) {
            Some(b) => b,
            None => panic!("{}", PANIC_MSG),
        }
    }

    #[inline]
    pub fn get(&self, ptr: BlockPtr) -> Option<&B> {
        self.blocks.get(ptr.usize())
    }

    #[inline]
    pub fn get_mut(&mut self, ptr: BlockPtr) -> Option<&mut B> {
        self.blocks.get_mut(ptr.usize())
    }

    /// Number of outstanding blocks
    #[inline]
    pub fn used_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Number of blocks the pool can hold without allocating
    #[inline]
    pub fn allocated_blocks(&self) -> usize {
        self.blocks.capacity()
    }

    /// Frees every block at once. Capacity is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Hands unused memory back to the system. Outstanding handles stay valid.
    pub fn shrink_to_fit(&mut self) {
        self.blocks.shrink_to_fit();
    }
}

impl<B> Index<BlockPtr> for BlockPool<B> {
    type Output = B;
    /// Index into the pool. If the pointer was freed, this will panic.
    #[inline]
    fn index(&self, index: BlockPtr) -> &Self::Output {
        self.get(index).expect(PANIC_MSG)
    }
}

impl<B> IndexMut<BlockPtr> for BlockPool<B> {
    /// Index into the pool. If the pointer was freed, this will panic.
    #[inline]
    fn index_mut(&mut self, index: BlockPtr) -> &mut Self::Output {
        self.get_mut(index).expect(PANIC_MSG)
    }
}
