//! Cursor over encoded bytes, the inverse of `BinaryWriter`

use std::marker::PhantomData;

use crate::common::varint;
use crate::common::{Endian, NetworkOrder, VarInt, WireInt};
use crate::error::{CodecError, Result};

/// bounded reader over a byte slice
///
/// Reads that would pass the end fail with `OutOfRange` and leave the
/// position unchanged.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a, E: Endian = NetworkOrder> {
    data: &'a [u8],
    position: usize,
    _order: PhantomData<E>,
}

impl<'a, E: Endian> BinaryReader<'a, E> {
    pub fn new(data: &'a [u8]) -> BinaryReader<'a, E> {
        BinaryReader {
            data,
            position: 0,
            _order: PhantomData,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// move the cursor to an absolute offset
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(CodecError::out_of_range(position, 0, self.data.len()));
        }
        self.position = position;
        Ok(())
    }

    /// bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// unread part of the input
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// read `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(CodecError::out_of_range(self.position, len, self.data.len()));
        }
        let out = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(out)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// read fixed-width value in wire order
    pub fn read<T: WireInt>(&mut self) -> Result<T> {
        let mut bytes = T::Bytes::default();
        bytes.as_mut().copy_from_slice(self.read_bytes(T::SIZE)?);
        Ok(E::from_wire(bytes))
    }

    /// read an unsigned integer of `size` bytes (clamped to 1 through 4)
    pub fn read_sized(&mut self, size: usize) -> Result<u32> {
        let size = size.clamp(1, 4);
        Ok(E::uint_from_wire(self.read_bytes(size)?) as u32)
    }

    /// read a 7-bit varint sized for `T`
    pub fn read_ix<T: VarInt>(&mut self) -> Result<T> {
        let (value, size) = varint::read_varint_as::<T>(self.rest()).map_err(|err| match err {
            CodecError::OutOfRange { len, .. } => {
                CodecError::out_of_range(self.position, len, self.data.len())
            }
            other => other,
        })?;
        self.position += size;
        Ok(value)
    }

    /// read blob prefixed with a varint length
    pub fn read_v(&mut self) -> Result<&'a [u8]> {
        let start = self.position;
        let len = self.read_ix::<u32>()?;
        self.read_bytes(len as usize).inspect_err(|_| self.position = start)
    }

    /// read blob prefixed with a one byte length
    pub fn read_v8(&mut self) -> Result<&'a [u8]> {
        self.read_prefixed_blob(1)
    }

    /// read blob prefixed with a two byte length
    pub fn read_v16(&mut self) -> Result<&'a [u8]> {
        self.read_prefixed_blob(2)
    }

    /// read blob prefixed with a four byte length
    pub fn read_v32(&mut self) -> Result<&'a [u8]> {
        self.read_prefixed_blob(4)
    }

    fn read_prefixed_blob(&mut self, size: usize) -> Result<&'a [u8]> {
        let start = self.position;
        let len = self.read_sized(size)?;
        self.read_bytes(len as usize).inspect_err(|_| self.position = start)
    }
}
