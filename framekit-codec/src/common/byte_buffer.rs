use std::alloc::{self as std_alloc, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::slice;

use tracing::trace;

use super::alloc::{BufferAllocator, ReallocAllocator};
use crate::error::{CodecError, Result};

/// growable byte buffer with manual control over growth and fill
///
/// Unlike Vec<u8>, growing the logical length does not have to initialize the
/// new bytes (see `resize_uninit`), and the backing block can be detached and
/// handed to a caller as-is.
pub struct ByteBuffer<A: BufferAllocator = ReallocAllocator> {
    // buf: [=====(len)------(cap)]
    ptr: Option<NonNull<u8>>,
    len: usize,
    cap: usize,
    _alloc: PhantomData<A>,
}

// safety: the block is exclusively owned, same as Vec<u8>
unsafe impl<A: BufferAllocator> Send for ByteBuffer<A> {}
unsafe impl<A: BufferAllocator> Sync for ByteBuffer<A> {}

/// raw block detached from a ByteBuffer
///
/// Owns the allocation. Dropping it releases the block through the allocator
/// it came from; `into_raw_parts` gives up ownership entirely.
pub struct RawBlock<A: BufferAllocator = ReallocAllocator> {
    ptr: Option<NonNull<u8>>,
    len: usize,
    cap: usize,
    _alloc: PhantomData<A>,
}

unsafe impl<A: BufferAllocator> Send for RawBlock<A> {}
unsafe impl<A: BufferAllocator> Sync for RawBlock<A> {}

impl<A: BufferAllocator> ByteBuffer<A> {
    /// create empty buffer without allocating
    pub const fn new() -> ByteBuffer<A> {
        ByteBuffer {
            ptr: None,
            len: 0,
            cap: 0,
            _alloc: PhantomData,
        }
    }

    /// create empty buffer with at least `capacity` bytes allocated
    pub fn with_capacity(capacity: usize) -> ByteBuffer<A> {
        let mut buf = Self::new();
        buf.reserve(capacity);
        buf
    }

    /// create buffer holding a copy of `data`
    pub fn from_slice(data: &[u8]) -> ByteBuffer<A> {
        let mut buf = Self::new();
        buf.assign(data);
        buf
    }

    /// create buffer of `len` bytes set to `value`
    pub fn filled(len: usize, value: u8) -> ByteBuffer<A> {
        let mut buf = Self::new();
        buf.resize(len, value);
        buf
    }

    /// logical length
    pub fn len(&self) -> usize {
        self.len
    }

    /// allocated length
    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// pointer to start of block (dangling if nothing is allocated)
    pub fn as_ptr(&self) -> *const u8 {
        match self.ptr {
            Some(ptr) => ptr.as_ptr(),
            None => NonNull::<u8>::dangling().as_ptr(),
        }
    }

    /// mutable pointer to start of block (dangling if nothing is allocated)
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        match self.ptr {
            Some(ptr) => ptr.as_ptr(),
            None => NonNull::<u8>::dangling().as_ptr(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        // safety: bytes below len are always initialized
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // safety: bytes below len are always initialized
        unsafe { slice::from_raw_parts_mut(self.as_mut_ptr(), self.len) }
    }

    /// reallocate backing block to exactly `new_cap` bytes
    fn try_reset_cap(&mut self, new_cap: usize) -> Result<()> {
        debug_assert!(new_cap >= self.len, "cannot reallocate below length");
        if new_cap == 0 {
            if let Some(ptr) = self.ptr.take() {
                // safety: block was allocated by A with size cap
                unsafe { A::deallocate(ptr, self.cap) };
            }
            self.cap = 0;
            return Ok(());
        }

        // safety: block (if any) was allocated by A with size cap
        let new_ptr = unsafe { A::reallocate(self.ptr, self.cap, new_cap) }
            .ok_or(CodecError::AllocationFailure { requested: new_cap })?;
        trace!("reallocate buffer {} -> {} bytes", self.cap, new_cap);
        self.ptr = Some(new_ptr);
        self.cap = new_cap;
        Ok(())
    }

    /// reallocate backing block, aborting on allocation failure
    fn reset_cap(&mut self, new_cap: usize) {
        if self.try_reset_cap(new_cap).is_err() {
            match Layout::array::<u8>(new_cap) {
                Ok(layout) => std_alloc::handle_alloc_error(layout),
                Err(_) => panic!("capacity overflow"),
            }
        }
    }

    /// ensure capacity is at least `new_cap`, never shrinks
    pub fn reserve(&mut self, new_cap: usize) {
        if self.cap < new_cap {
            self.reset_cap(new_cap);
        }
    }

    /// ensure capacity is at least `new_cap`, reporting allocation failure
    pub fn try_reserve(&mut self, new_cap: usize) -> Result<()> {
        if self.cap < new_cap {
            self.try_reset_cap(new_cap)?;
        }
        Ok(())
    }

    /// grow capacity geometrically so that `new_len` bytes fit
    fn grow_for(&mut self, new_len: usize) {
        if self.cap < new_len {
            self.reset_cap(new_len.saturating_add(new_len / 2));
        }
    }

    /// set logical length without initializing new bytes
    ///
    /// # Safety
    ///
    /// If the buffer grows, bytes in `[old_len, new_len)` are uninitialized
    /// and must be written (through `as_mut_ptr`) before the buffer is read.
    pub unsafe fn resize_uninit(&mut self, new_len: usize) {
        self.grow_for(new_len);
        self.len = new_len;
    }

    /// set logical length, setting bytes past the old length to `value`
    pub fn resize(&mut self, new_len: usize, value: u8) {
        let old_len = self.len;
        self.grow_for(new_len);
        if new_len > old_len {
            // safety: capacity was ensured above
            unsafe { ptr::write_bytes(self.as_mut_ptr().add(old_len), value, new_len - old_len) };
        }
        self.len = new_len;
    }

    /// append one byte
    pub fn push_back(&mut self, value: u8) {
        let old_len = self.len;
        let new_len = old_len.checked_add(1).expect("capacity overflow");
        self.grow_for(new_len);
        // safety: capacity was ensured above
        unsafe { ptr::write(self.as_mut_ptr().add(old_len), value) };
        self.len = new_len;
    }

    /// append contents of slice
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.insert(self.len, data);
    }

    /// insert bytes at `pos`, appending if `pos` is at or past the end
    pub fn insert(&mut self, pos: usize, data: &[u8]) {
        let count = data.len();
        if count == 0 {
            return;
        }

        let old_len = self.len;
        let new_len = old_len.checked_add(count).expect("capacity overflow");
        unsafe {
            // safety: every byte in [old_len, new_len) is written below
            self.resize_uninit(new_len);
            let base = self.as_mut_ptr();
            if pos >= old_len {
                ptr::copy_nonoverlapping(data.as_ptr(), base.add(old_len), count);
            } else {
                // shift tail right, then fill the hole
                // from: [===(pos)###(old_len)------]
                // to:   [===(pos)+++###(new_len)---]
                let at = base.add(pos);
                ptr::copy(at, at.add(count), old_len - pos);
                ptr::copy_nonoverlapping(data.as_ptr(), at, count);
            }
        }
    }

    /// replace contents with a copy of `data`
    pub fn assign(&mut self, data: &[u8]) -> &mut Self {
        self.clear();
        self.extend_from_slice(data);
        self
    }

    /// reference to first byte
    pub fn front(&self) -> Result<&u8> {
        self.as_slice()
            .first()
            .ok_or(CodecError::out_of_range(0, 1, 0))
    }

    /// mutable reference to first byte
    pub fn front_mut(&mut self) -> Result<&mut u8> {
        self.as_mut_slice()
            .first_mut()
            .ok_or(CodecError::out_of_range(0, 1, 0))
    }

    /// set length to zero, retaining capacity
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// reallocate so capacity equals length, releasing the block if empty
    pub fn shrink_to_fit(&mut self) {
        if self.cap != self.len {
            self.reset_cap(self.len);
        }
    }

    /// give up ownership of the backing block, leaving the buffer empty
    pub fn detach(&mut self) -> RawBlock<A> {
        let block = RawBlock {
            ptr: self.ptr.take(),
            len: self.len,
            cap: self.cap,
            _alloc: PhantomData,
        };
        self.len = 0;
        self.cap = 0;
        block
    }

    /// move contents out, leaving this buffer empty without deallocating
    pub fn take(&mut self) -> ByteBuffer<A> {
        mem::take(self)
    }

    /// exchange contents with another buffer
    pub fn swap(&mut self, other: &mut ByteBuffer<A>) {
        mem::swap(self, other);
    }
}

impl<A: BufferAllocator> RawBlock<A> {
    /// number of initialized bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// allocated size of the block
    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match self.ptr {
            // safety: bytes below len were initialized by the buffer
            Some(ptr) => unsafe { slice::from_raw_parts(ptr.as_ptr(), self.len) },
            None => &[],
        }
    }

    /// give up ownership entirely, returning (pointer, length, capacity)
    ///
    /// The pointer is null if nothing was allocated. The caller must
    /// eventually release the block with `A::deallocate` or `from_raw_parts`.
    pub fn into_raw_parts(self) -> (*mut u8, usize, usize) {
        let parts = (
            self.ptr.map_or(ptr::null_mut(), NonNull::as_ptr),
            self.len,
            self.cap,
        );
        mem::forget(self);
        parts
    }

    /// reclaim a block previously produced by `into_raw_parts`
    ///
    /// # Safety
    ///
    /// The parts must come from `into_raw_parts` of a block with the same
    /// allocator, and must not be reclaimed twice.
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize, cap: usize) -> RawBlock<A> {
        let ptr = NonNull::new(ptr);
        RawBlock {
            ptr,
            len: if ptr.is_some() { len } else { 0 },
            cap: if ptr.is_some() { cap } else { 0 },
            _alloc: PhantomData,
        }
    }
}

impl<A: BufferAllocator> Drop for RawBlock<A> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // safety: block was allocated by A with size cap
            unsafe { A::deallocate(ptr, self.cap) };
        }
    }
}

impl<A: BufferAllocator> From<RawBlock<A>> for ByteBuffer<A> {
    fn from(block: RawBlock<A>) -> Self {
        let (ptr, len, cap) = block.into_raw_parts();
        let ptr = NonNull::new(ptr);
        ByteBuffer {
            ptr,
            len,
            cap: if ptr.is_some() { cap } else { 0 },
            _alloc: PhantomData,
        }
    }
}

impl<A: BufferAllocator> Drop for ByteBuffer<A> {
    fn drop(&mut self) {
        self.clear();
        self.shrink_to_fit();
    }
}

impl<A: BufferAllocator> Default for ByteBuffer<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: BufferAllocator> Clone for ByteBuffer<A> {
    fn clone(&self) -> Self {
        Self::from_slice(self.as_slice())
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source.as_slice());
    }
}

impl<A: BufferAllocator> Deref for ByteBuffer<A> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl<A: BufferAllocator> DerefMut for ByteBuffer<A> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl<A: BufferAllocator> AsRef<[u8]> for ByteBuffer<A> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl<A: BufferAllocator> AsMut<[u8]> for ByteBuffer<A> {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl<A: BufferAllocator, B: BufferAllocator> PartialEq<ByteBuffer<B>> for ByteBuffer<A> {
    fn eq(&self, other: &ByteBuffer<B>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<A: BufferAllocator> Eq for ByteBuffer<A> {}

impl<A: BufferAllocator> PartialEq<[u8]> for ByteBuffer<A> {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_slice() == other
    }
}

impl<A: BufferAllocator, const N: usize> PartialEq<[u8; N]> for ByteBuffer<A> {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.as_slice() == other
    }
}

impl<A: BufferAllocator> fmt::Debug for ByteBuffer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.len)
            .field("cap", &self.cap)
            .field("data", &self.as_slice())
            .finish()
    }
}

impl<A: BufferAllocator> From<&[u8]> for ByteBuffer<A> {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}

impl<A: BufferAllocator> From<Vec<u8>> for ByteBuffer<A> {
    fn from(data: Vec<u8>) -> Self {
        Self::from_slice(&data)
    }
}

impl<A: BufferAllocator> From<ByteBuffer<A>> for Vec<u8> {
    fn from(buf: ByteBuffer<A>) -> Self {
        buf.as_slice().to_vec()
    }
}
