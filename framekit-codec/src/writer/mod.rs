//! Binary writer with backpatched length fields
//!
//! Fixed-width values are converted by the writer's `Endian` policy and
//! appended to its storage. Length fields whose value is only known after the
//! content is written are reserved with `push*` and filled in by the matching
//! `pop*`, innermost first:
//!
//! ```
//! use framekit_codec::writer::NetworkWriter;
//!
//! let mut writer = NetworkWriter::new();
//! writer.push32().unwrap();
//! writer.write_v8(b"ab").unwrap();
//! writer.pop32().unwrap();
//! assert_eq!(writer.data(), [0, 0, 0, 3, 2, b'a', b'b']);
//! ```

pub mod backpatch;
pub mod storage;

use std::io;
use std::marker::PhantomData;
use std::path::Path;

use tracing::trace;

pub use backpatch::{BackpatchStack, LengthWidth};
pub use storage::{FixedArray, FixedBuffer, WriteStorage};

use crate::common::varint::{self, MAX_VARINT_SIZE};
use crate::common::{ByteBuffer, Endian, HostOrder, NetworkOrder, VarInt, WireInt};
use crate::error::{CodecError, Result};

/// initial capacity of a growable writer
pub const DEFAULT_CAPACITY: usize = 128;

/// big-endian writer over a growable buffer
pub type NetworkWriter = BinaryWriter<ByteBuffer, NetworkOrder>;
/// native order writer over a growable buffer
pub type HostWriter = BinaryWriter<ByteBuffer, HostOrder>;

/// serializer over a `WriteStorage`
#[derive(Debug)]
pub struct BinaryWriter<S: WriteStorage = ByteBuffer, E: Endian = NetworkOrder> {
    storage: S,
    stack: BackpatchStack,
    _order: PhantomData<E>,
}

impl<E: Endian> BinaryWriter<ByteBuffer, E> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_storage(ByteBuffer::with_capacity(capacity))
    }
}

impl<S: WriteStorage + Default, E: Endian> Default for BinaryWriter<S, E> {
    fn default() -> Self {
        Self::with_storage(S::default())
    }
}

/// copies content only, the copy starts with no open placeholders
impl<S: WriteStorage + Clone, E: Endian> Clone for BinaryWriter<S, E> {
    fn clone(&self) -> Self {
        Self::with_storage(self.storage.clone())
    }
}

impl<S: WriteStorage, E: Endian> BinaryWriter<S, E> {
    /// writer appending to existing storage
    pub fn with_storage(storage: S) -> Self {
        BinaryWriter {
            storage,
            stack: BackpatchStack::new(),
            _order: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// bytes written so far
    pub fn data(&self) -> &[u8] {
        self.storage.as_slice()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.storage.as_mut_slice()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// take the storage, discarding any open placeholders
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// number of placeholders pushed but not yet popped
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// drop all content and open placeholders
    pub fn clear(&mut self) {
        self.storage.clear();
        self.stack.clear();
    }

    pub fn shrink_to_fit(&mut self) {
        self.storage.shrink_to_fit();
    }

    /// write fixed-width value in wire order
    pub fn write<T: WireInt>(&mut self, value: T) -> Result<()> {
        self.storage.append(E::to_wire(value).as_ref())
    }

    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.storage.append(&[value])
    }

    /// write raw bytes
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.storage.append(data)
    }

    /// overwrite bytes at `offset`, extending the content if it ends past it
    pub fn write_bytes_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.storage.patch(offset, data)
    }

    /// overwrite a fixed-width value at `offset`
    pub fn pwrite<T: WireInt>(&mut self, offset: usize, value: T) -> Result<()> {
        self.storage.patch(offset, E::to_wire(value).as_ref())
    }

    /// write the low `size` bytes (clamped to 1 through 4) of an integer
    pub fn write_sized(&mut self, value: i32, size: usize) -> Result<()> {
        self.write_uint(value as u32 as u64, backpatch::clamp_size(size))
    }

    /// write integer as a 7-bit varint
    ///
    /// Negative values are encoded by their bit pattern at their own width.
    pub fn write_ix<T: VarInt>(&mut self, value: T) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT_SIZE];
        // 10 bytes always hold a 64-bit value
        let size = varint::write_varint(&mut buf, value.to_bits()).unwrap_or(MAX_VARINT_SIZE);
        self.storage.append(&buf[..size])
    }

    /// write blob prefixed with its length as a varint
    pub fn write_v(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| CodecError::LengthOverflow {
            length: data.len(),
            width: 4,
        })?;
        self.write_ix(len)?;
        self.write_bytes(data)
    }

    /// write blob prefixed with its length in one byte
    pub fn write_v8(&mut self, data: &[u8]) -> Result<()> {
        self.write_prefixed_blob(LengthWidth::U8, data)
    }

    /// write blob prefixed with its length in two bytes
    pub fn write_v16(&mut self, data: &[u8]) -> Result<()> {
        self.write_prefixed_blob(LengthWidth::U16, data)
    }

    /// write blob prefixed with its length in four bytes
    pub fn write_v32(&mut self, data: &[u8]) -> Result<()> {
        self.write_prefixed_blob(LengthWidth::U32, data)
    }

    fn write_prefixed_blob(&mut self, width: LengthWidth, data: &[u8]) -> Result<()> {
        let length = data.len();
        if length as u64 > width.max_value() {
            return Err(CodecError::LengthOverflow {
                length,
                width: width.size(),
            });
        }
        self.write_uint(length as u64, width.size())?;
        self.write_bytes(data)
    }

    fn write_uint(&mut self, value: u64, size: usize) -> Result<()> {
        let mut buf = [0u8; 4];
        E::uint_to_wire(value, &mut buf[..size]);
        self.storage.append(&buf[..size])
    }

    /// reserve a length placeholder of the given width
    pub fn push_width(&mut self, width: LengthWidth) -> Result<()> {
        let offset = self.storage.len();
        self.storage.append(&[0u8; 4][..width.size()])?;
        self.stack.push(offset);
        Ok(())
    }

    /// fill the most recent placeholder with the number of bytes after it
    ///
    /// Returns the length written. The placeholder is consumed even if the
    /// length does not fit. Panics if no placeholder is open, or if `width`
    /// reaches past the end of the written data.
    pub fn pop_width(&mut self, width: LengthWidth) -> Result<usize> {
        let offset = self.stack.pop();
        let size = width.size();
        let Some(length) = self.storage.len().checked_sub(offset + size) else {
            panic!("backpatch pop of {size} byte field overruns placeholder at offset {offset}");
        };
        if length as u64 > width.max_value() {
            return Err(CodecError::LengthOverflow {
                length,
                width: size,
            });
        }
        self.patch_uint(offset, length as u64, size)?;
        trace!("backpatched length {length} at offset {offset}");
        Ok(length)
    }

    /// fill the most recent placeholder with `value`, truncated to its width
    ///
    /// Panics if no placeholder is open.
    pub fn pop_width_value(&mut self, width: LengthWidth, value: u64) -> Result<()> {
        let offset = self.stack.pop();
        self.patch_uint(offset, value, width.size())
    }

    fn patch_uint(&mut self, offset: usize, value: u64, size: usize) -> Result<()> {
        let mut buf = [0u8; 4];
        E::uint_to_wire(value, &mut buf[..size]);
        self.storage.patch(offset, &buf[..size])
    }

    pub fn push8(&mut self) -> Result<()> {
        self.push_width(LengthWidth::U8)
    }

    pub fn pop8(&mut self) -> Result<usize> {
        self.pop_width(LengthWidth::U8)
    }

    pub fn pop8_value(&mut self, value: u8) -> Result<()> {
        self.pop_width_value(LengthWidth::U8, value as u64)
    }

    pub fn push16(&mut self) -> Result<()> {
        self.push_width(LengthWidth::U16)
    }

    pub fn pop16(&mut self) -> Result<usize> {
        self.pop_width(LengthWidth::U16)
    }

    pub fn pop16_value(&mut self, value: u16) -> Result<()> {
        self.pop_width_value(LengthWidth::U16, value as u64)
    }

    pub fn push32(&mut self) -> Result<()> {
        self.push_width(LengthWidth::U32)
    }

    pub fn pop32(&mut self) -> Result<usize> {
        self.pop_width(LengthWidth::U32)
    }

    pub fn pop32_value(&mut self, value: u32) -> Result<()> {
        self.pop_width_value(LengthWidth::U32, value as u64)
    }

    /// reserve a placeholder of `size` bytes, clamped to 1 through 4
    pub fn push(&mut self, size: usize) -> Result<()> {
        self.push_width(LengthWidth::Bytes(size))
    }

    /// fill a placeholder reserved with `push(size)`
    pub fn pop(&mut self, size: usize) -> Result<usize> {
        self.pop_width(LengthWidth::Bytes(size))
    }

    /// fill a placeholder reserved with `push(size)` with `value`
    pub fn pop_value(&mut self, value: u32, size: usize) -> Result<()> {
        self.pop_width_value(LengthWidth::Bytes(size), value as u64)
    }

    /// write content produced by `f` behind a length field of `width`
    ///
    /// The placeholder is always closed, also when `f` fails.
    pub fn prefixed<R>(
        &mut self,
        width: LengthWidth,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.push_width(width)?;
        let depth = self.stack.depth();
        let result = f(self);
        debug_assert_eq!(self.stack.depth(), depth, "unbalanced push/pop in prefixed()");
        match result {
            Ok(value) => {
                self.pop_width(width)?;
                Ok(value)
            }
            Err(err) => {
                self.stack.pop();
                Err(err)
            }
        }
    }

    /// write content to a file, replacing it
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.data())
    }
}

impl<S: WriteStorage + Default, E: Endian> BinaryWriter<S, E> {
    /// copy of `count` bytes starting at `offset`, clipped to the content
    ///
    /// An offset past the end produces an empty writer.
    pub fn sub(&self, offset: usize, count: usize) -> Result<Self> {
        let mut out = Self::default();
        let data = self.data();
        if offset < data.len() {
            let count = count.min(data.len() - offset);
            out.write_bytes(&data[offset..offset + count])?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::ByteOrder;
    use crate::frame::{FrameAssembler, FrameDecoder, FrameOptions};
    use crate::reader::BinaryReader;

    #[test]
    fn fixed_width_network() {
        let mut writer = NetworkWriter::new();
        writer.write(0x0102u16).unwrap();
        writer.write(-1i32).unwrap();
        writer.write_byte(7).unwrap();
        writer.write(1.5f64).unwrap();
        let mut expected = vec![1, 2, 0xff, 0xff, 0xff, 0xff, 7];
        expected.extend_from_slice(&1.5f64.to_be_bytes());
        assert_eq!(writer.data(), expected);
    }

    #[test]
    fn fixed_width_host() {
        let mut writer = HostWriter::new();
        writer.write(0x0a0b0c0du32).unwrap();
        assert_eq!(writer.data(), 0x0a0b0c0du32.to_ne_bytes());
    }

    #[test]
    fn nested_backpatch() {
        let mut writer = NetworkWriter::new();
        writer.push32().unwrap();
        writer.write_v8(b"ab").unwrap();
        writer.push16().unwrap();
        writer.write_bytes(b"xyz").unwrap();
        assert_eq!(writer.depth(), 2);
        assert_eq!(writer.pop16().unwrap(), 3);
        assert_eq!(writer.pop32().unwrap(), 8);
        assert_eq!(writer.depth(), 0);
        assert_eq!(
            writer.data(),
            [0, 0, 0, 8, 2, b'a', b'b', 0, 3, b'x', b'y', b'z']
        );
    }

    #[test]
    fn pop_with_value() {
        let mut writer = HostWriter::new();
        writer.push16().unwrap();
        writer.write_bytes(b"abc").unwrap();
        writer.pop16_value(0x1234).unwrap();
        assert_eq!(writer.data()[..2], 0x1234u16.to_ne_bytes());

        let mut writer = NetworkWriter::new();
        writer.push(3).unwrap();
        writer.pop_value(0x01020304, 3).unwrap();
        assert_eq!(writer.data(), [2, 3, 4]);
    }

    #[test]
    fn clamped_sizes() {
        let mut writer = NetworkWriter::new();
        writer.push(0).unwrap();
        writer.write_bytes(&[9; 5]).unwrap();
        assert_eq!(writer.pop(0).unwrap(), 5);
        assert_eq!(writer.data()[0], 5);

        writer.clear();
        writer.push(8).unwrap();
        assert_eq!(writer.len(), 4);
        assert_eq!(writer.pop(8).unwrap(), 0);

        writer.clear();
        writer.write_sized(0x0a0b0c, 3).unwrap();
        writer.write_sized(-1, 9).unwrap();
        writer.write_sized(0x1ff, 0).unwrap();
        assert_eq!(
            writer.data(),
            [0x0a, 0x0b, 0x0c, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn length_overflow() {
        let mut writer = NetworkWriter::new();
        writer.push8().unwrap();
        writer.write_bytes(&[0; 256]).unwrap();
        assert_eq!(
            writer.pop8(),
            Err(CodecError::LengthOverflow {
                length: 256,
                width: 1
            })
        );
        assert_eq!(writer.depth(), 0);
        assert!(writer.write_v8(&[0; 300]).is_err());
        writer.write_v16(&[0; 300]).unwrap();
    }

    #[test]
    #[should_panic(expected = "without matching push")]
    fn pop_without_push() {
        let mut writer = NetworkWriter::new();
        writer.write_byte(1).unwrap();
        let _ = writer.pop16();
    }

    #[test]
    fn varints() {
        let mut writer = NetworkWriter::new();
        writer.write_ix(300u32).unwrap();
        assert_eq!(writer.data(), [0xac, 0x02]);

        writer.clear();
        writer.write_ix(-1i32).unwrap();
        assert_eq!(writer.data(), [0xff, 0xff, 0xff, 0xff, 0x0f]);

        writer.clear();
        writer.write_v(b"hi").unwrap();
        writer.write_v(&[]).unwrap();
        assert_eq!(writer.data(), [2, b'h', b'i', 0]);

        let mut values = [0i64, 127, 128, 16383, 16384, -5, i64::MIN].to_vec();
        writer.clear();
        for &value in &values {
            writer.write_ix(value).unwrap();
        }
        let mut reader = BinaryReader::<NetworkOrder>::new(writer.data());
        values.reverse();
        while let Some(expected) = values.pop() {
            assert_eq!(reader.read_ix::<i64>().unwrap(), expected);
        }
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn patch_and_extend() {
        let mut writer = NetworkWriter::new();
        writer.write_bytes(b"hello").unwrap();
        writer.write_bytes_at(1, b"EL").unwrap();
        writer.pwrite(3, 0x4c4fu16).unwrap();
        assert_eq!(writer.data(), b"hELLO");
        writer.write_bytes_at(4, b"!!").unwrap();
        assert_eq!(writer.data(), b"hELL!!");
        writer.write_bytes_at(8, b"x").unwrap();
        assert_eq!(writer.data(), b"hELL!!\0\0x");
    }

    #[test]
    fn prefixed_scope() {
        let mut writer = NetworkWriter::new();
        let inner = writer
            .prefixed(LengthWidth::U16, |w| {
                w.write_bytes(b"abc")?;
                w.prefixed(LengthWidth::U8, |w| w.write(7u32))?;
                Ok(42)
            })
            .unwrap();
        assert_eq!(inner, 42);
        assert_eq!(writer.data(), [0, 8, b'a', b'b', b'c', 4, 0, 0, 0, 7]);

        let mut mem = [0u8; 4];
        let mut fixed = BinaryWriter::<_, NetworkOrder>::with_storage(FixedBuffer::new(&mut mem));
        let result = fixed.prefixed(LengthWidth::U16, |w| w.write(1u32));
        assert!(matches!(result, Err(CodecError::OutOfRange { .. })));
        assert_eq!(fixed.depth(), 0);
    }

    #[test]
    fn fixed_storage_writer() {
        let mut writer = BinaryWriter::<FixedArray<6>, NetworkOrder>::default();
        writer.push16().unwrap();
        writer.write_bytes(b"abcd").unwrap();
        writer.pop16().unwrap();
        assert_eq!(writer.data(), [0, 4, b'a', b'b', b'c', b'd']);
        assert!(writer.write_byte(0).is_err());

        let sub = writer.sub(2, 100).unwrap();
        assert_eq!(sub.data(), b"abcd");
    }

    #[test]
    fn sub_and_clone() {
        let mut writer = NetworkWriter::new();
        writer.write_bytes(b"0123456789").unwrap();
        assert_eq!(writer.sub(3, 4).unwrap().data(), b"3456");
        assert_eq!(writer.sub(8, 10).unwrap().data(), b"89");
        assert!(writer.sub(10, 1).unwrap().is_empty());

        writer.push8().unwrap();
        let mut copy = writer.clone();
        assert_eq!(copy.depth(), 0);
        assert_eq!(copy.data(), writer.data());
        copy.write_byte(1).unwrap();
        assert_eq!(copy.len(), writer.len() + 1);
    }

    #[test]
    fn shrink_and_storage() {
        let mut writer = NetworkWriter::with_capacity(256);
        writer.write_bytes(b"abc").unwrap();
        writer.shrink_to_fit();
        assert_eq!(writer.storage().capacity(), 3);
        let buffer = writer.into_storage();
        assert_eq!(buffer, *b"abc");
    }

    #[test]
    fn save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut writer = NetworkWriter::new();
        writer.write_v16(b"saved").unwrap();
        writer.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), writer.data());

        NetworkWriter::new().save(&path).unwrap();
        assert!(std::fs::read(&path).unwrap().is_empty());
    }

    #[test]
    fn backpatched_frames_decode() {
        fn check<E: Endian>(byte_order: ByteOrder, width: usize, body: &[u8]) {
            let mut writer = BinaryWriter::<ByteBuffer, E>::new();
            writer.push(width).unwrap();
            writer.write_bytes(body).unwrap();
            assert_eq!(writer.pop(width).unwrap(), body.len());

            let options = FrameOptions::default()
                .with_length_field_length(width)
                .with_initial_bytes_to_strip(width)
                .with_byte_order(byte_order);
            let mut decoder = FrameDecoder::new(options.clone()).unwrap();
            let mut assembler = FrameAssembler::from_options(&options);
            decoder.input(writer.data(), &mut assembler).unwrap();
            assert_eq!(decoder.frames_decoded(), 1);
            assert!(decoder.is_idle());
            assert_eq!(Vec::from(assembler.pop_frame().unwrap()), body);
        }

        for n in [0usize, 1, 100, 300, 1000] {
            let body: Vec<u8> = (0..n).map(|i| i as u8).collect();
            for width in [2, 3, 4] {
                check::<NetworkOrder>(ByteOrder::Network, width, &body);
                check::<HostOrder>(ByteOrder::Host, width, &body);
            }
        }
    }

    #[test]
    fn host_backpatch_uses_host_order() {
        let mut writer = HostWriter::new();
        writer.push16().unwrap();
        writer.write_bytes(&[0u8; 300]).unwrap();
        writer.pop16().unwrap();
        assert_eq!(writer.data()[..2], 300u16.to_ne_bytes());

        let mut writer = NetworkWriter::new();
        writer.push(3).unwrap();
        writer.write_bytes(&[0u8; 300]).unwrap();
        writer.pop(3).unwrap();
        assert_eq!(writer.data()[..3], [0, 1, 44]);
    }

    #[test]
    #[should_panic(expected = "overruns placeholder")]
    fn mismatched_pop_width() {
        let mut writer = NetworkWriter::new();
        writer.push8().unwrap();
        writer.write_byte(1).unwrap();
        let _ = writer.pop32();
    }
}
