//! 7-bit continuation varints
//!
//! Least significant group first, high bit set on every byte except the last.
//! Signed values are encoded by their unsigned bit pattern at their own width,
//! so -1i32 takes 5 bytes and -1i64 takes 10.

use crate::error::{CodecError, Result};

/// maximum encoded size of a 64-bit value
pub const MAX_VARINT_SIZE: usize = 10;

/// integer that can be written as a varint
pub trait VarInt: Copy {
    /// maximum encoded size for this type
    const MAX_SIZE: usize;
    /// unsigned bit pattern at the type's own width
    fn to_bits(self) -> u64;
    /// rebuild from bit pattern, None if it does not fit the type
    fn from_bits(bits: u64) -> Option<Self>;
}

macro_rules! impl_varint {
    ($ty:ty, $unsigned:ty, $max_size:expr) => {
        impl VarInt for $ty {
            const MAX_SIZE: usize = $max_size;

            fn to_bits(self) -> u64 {
                self as $unsigned as u64
            }

            fn from_bits(bits: u64) -> Option<Self> {
                <$unsigned>::try_from(bits).ok().map(|v| v as $ty)
            }
        }
    };
}

impl_varint!(i32, u32, 5);
impl_varint!(u32, u32, 5);
impl_varint!(i64, u64, 10);
impl_varint!(u64, u64, 10);

/// determine how many bytes are required to encode a varint
pub fn varint_size(mut n: u64) -> usize {
    let mut size = 1;
    while n >= 0x80 {
        n >>= 7;
        size += 1;
    }
    size
}

/// write varint to buffer, returning how many bytes were used
///
/// Returns None if the buffer is too short.
pub fn write_varint(buf: &mut [u8], mut n: u64) -> Option<usize> {
    let mut index = 0;
    while n >= 0x80 {
        *buf.get_mut(index)? = (n as u8) | 0x80;
        n >>= 7;
        index += 1;
    }
    *buf.get_mut(index)? = n as u8;
    Some(index + 1)
}

/// read varint of at most `max_size` bytes from buffer, returning (value, size)
pub fn read_varint(buf: &[u8], max_size: usize) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (index, &byte) in buf.iter().enumerate() {
        if index >= max_size.min(MAX_VARINT_SIZE) {
            return Err(CodecError::MalformedVarint);
        }
        let group = (byte & 0x7f) as u64;
        let shift = 7 * index as u32;
        if shift == 63 && group > 1 {
            // 10th byte may only carry the top bit
            return Err(CodecError::MalformedVarint);
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            return Ok((value, index + 1));
        }
    }
    Err(CodecError::out_of_range(0, buf.len() + 1, buf.len()))
}

/// read varint sized for `T`
pub fn read_varint_as<T: VarInt>(buf: &[u8]) -> Result<(T, usize)> {
    let (bits, size) = read_varint(buf, T::MAX_SIZE)?;
    let value = T::from_bits(bits).ok_or(CodecError::MalformedVarint)?;
    Ok((value, size))
}
