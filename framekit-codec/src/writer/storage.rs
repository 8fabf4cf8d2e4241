//! Backing storage for `BinaryWriter`

use crate::common::{BufferAllocator, ByteBuffer};
use crate::error::{CodecError, Result};

/// byte storage a writer appends to
///
/// Growable storage never fails; fixed storage reports `OutOfRange` when a
/// write would pass its bound.
pub trait WriteStorage {
    fn len(&self) -> usize;
    fn as_slice(&self) -> &[u8];
    fn as_mut_slice(&mut self) -> &mut [u8];
    /// append bytes at the end
    fn append(&mut self, data: &[u8]) -> Result<()>;
    /// grow to at least `new_len` bytes, zero filling
    fn extend_to(&mut self, new_len: usize) -> Result<()>;
    /// drop all content
    fn clear(&mut self);
    /// release unused capacity, if the storage has any
    fn shrink_to_fit(&mut self) {}

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// overwrite `data.len()` bytes at `offset`, extending storage if needed
    fn patch(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset + data.len();
        if end > self.len() {
            self.extend_to(end)?;
        }
        self.as_mut_slice()[offset..end].copy_from_slice(data);
        Ok(())
    }
}

impl<A: BufferAllocator> WriteStorage for ByteBuffer<A> {
    fn len(&self) -> usize {
        ByteBuffer::len(self)
    }

    fn as_slice(&self) -> &[u8] {
        ByteBuffer::as_slice(self)
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        ByteBuffer::as_mut_slice(self)
    }

    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }

    fn extend_to(&mut self, new_len: usize) -> Result<()> {
        if new_len > ByteBuffer::len(self) {
            self.resize(new_len, 0);
        }
        Ok(())
    }

    fn clear(&mut self) {
        ByteBuffer::clear(self)
    }

    fn shrink_to_fit(&mut self) {
        ByteBuffer::shrink_to_fit(self)
    }
}

impl WriteStorage for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn as_slice(&self) -> &[u8] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        self
    }

    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }

    fn extend_to(&mut self, new_len: usize) -> Result<()> {
        if new_len > Vec::len(self) {
            self.resize(new_len, 0);
        }
        Ok(())
    }

    fn clear(&mut self) {
        Vec::clear(self)
    }

    fn shrink_to_fit(&mut self) {
        Vec::shrink_to_fit(self)
    }
}

/// writes into caller-provided memory
#[derive(Debug)]
pub struct FixedBuffer<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> FixedBuffer<'a> {
    pub fn new(buf: &'a mut [u8]) -> FixedBuffer<'a> {
        FixedBuffer { buf, len: 0 }
    }

    /// total bytes available
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// bytes written so far, releasing the borrow
    pub fn into_written(self) -> &'a mut [u8] {
        &mut self.buf[..self.len]
    }
}

/// writes into an inline array of `N` bytes
#[derive(Debug, Clone)]
pub struct FixedArray<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> Default for FixedArray<N> {
    fn default() -> Self {
        FixedArray {
            buf: [0; N],
            len: 0,
        }
    }
}

impl<const N: usize> FixedArray<N> {
    pub fn new() -> FixedArray<N> {
        Default::default()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

macro_rules! impl_fixed_storage {
    ($ty:ty, $($generics:tt)*) => {
        impl<$($generics)*> WriteStorage for $ty {
            fn len(&self) -> usize {
                self.len
            }

            fn as_slice(&self) -> &[u8] {
                &self.buf[..self.len]
            }

            fn as_mut_slice(&mut self) -> &mut [u8] {
                &mut self.buf[..self.len]
            }

            fn append(&mut self, data: &[u8]) -> Result<()> {
                let end = self.len + data.len();
                if end > self.buf.len() {
                    return Err(CodecError::out_of_range(self.len, data.len(), self.buf.len()));
                }
                self.buf[self.len..end].copy_from_slice(data);
                self.len = end;
                Ok(())
            }

            fn extend_to(&mut self, new_len: usize) -> Result<()> {
                if new_len > self.buf.len() {
                    return Err(CodecError::out_of_range(0, new_len, self.buf.len()));
                }
                if new_len > self.len {
                    self.buf[self.len..new_len].fill(0);
                    self.len = new_len;
                }
                Ok(())
            }

            fn clear(&mut self) {
                self.len = 0;
            }
        }
    };
}

impl_fixed_storage!(FixedBuffer<'a>, 'a);
impl_fixed_storage!(FixedArray<N>, const N: usize);
