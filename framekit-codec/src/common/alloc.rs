//! Allocation strategies backing ByteBuffer

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

/// strategy for (re)allocating and releasing raw byte blocks
///
/// # Safety
///
/// `reallocate` must return a block valid for reads and writes of `new_size`
/// bytes which preserves the first `min(size, new_size)` bytes of `block`, and
/// `deallocate` must accept any block previously returned by `reallocate`
/// together with the size it was last reallocated to.
pub unsafe trait BufferAllocator {
    /// resize `block` (currently `size` bytes) to `new_size` bytes
    ///
    /// `block` is None if nothing was allocated yet. `new_size` is never zero.
    /// Returns None on allocation failure, leaving `block` untouched.
    ///
    /// # Safety
    ///
    /// `block` and `size` must describe a block obtained from this allocator.
    unsafe fn reallocate(block: Option<NonNull<u8>>, size: usize, new_size: usize)
        -> Option<NonNull<u8>>;

    /// release a block of `size` bytes
    ///
    /// # Safety
    ///
    /// `block` and `size` must describe a block obtained from this allocator,
    /// and the block must not be used afterwards.
    unsafe fn deallocate(block: NonNull<u8>, size: usize);
}

/// byte layout of a block, None if the size is not representable
fn block_layout(size: usize) -> Option<Layout> {
    Layout::array::<u8>(size).ok()
}

/// grows blocks in place through the global allocator's realloc
#[derive(Debug, Clone, Copy, Default)]
pub struct ReallocAllocator;

unsafe impl BufferAllocator for ReallocAllocator {
    unsafe fn reallocate(
        block: Option<NonNull<u8>>,
        size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        debug_assert!(new_size > 0, "zero-sized reallocation");
        let new_layout = block_layout(new_size)?;
        let new_block = match block {
            None => alloc::alloc(new_layout),
            Some(block) => {
                let old_layout = block_layout(size)?;
                alloc::realloc(block.as_ptr(), old_layout, new_size)
            }
        };
        NonNull::new(new_block)
    }

    unsafe fn deallocate(block: NonNull<u8>, size: usize) {
        if let Some(layout) = block_layout(size) {
            alloc::dealloc(block.as_ptr(), layout);
        }
    }
}

/// always allocates a fresh block, copies, then releases the old one
///
/// Never resizes in place, so previously handed out pointers are reliably
/// invalidated on every growth.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyingAllocator;

unsafe impl BufferAllocator for CopyingAllocator {
    unsafe fn reallocate(
        block: Option<NonNull<u8>>,
        size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        debug_assert!(new_size > 0, "zero-sized reallocation");
        let new_block = NonNull::new(alloc::alloc(block_layout(new_size)?))?;
        if let Some(block) = block {
            ptr::copy_nonoverlapping(
                block.as_ptr(),
                new_block.as_ptr(),
                usize::min(size, new_size),
            );
            Self::deallocate(block, size);
        }
        Some(new_block)
    }

    unsafe fn deallocate(block: NonNull<u8>, size: usize) {
        if let Some(layout) = block_layout(size) {
            alloc::dealloc(block.as_ptr(), layout);
        }
    }
}
