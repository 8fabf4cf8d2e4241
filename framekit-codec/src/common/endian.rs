//! Byte order conversion policies
//!
//! `ByteOrder` is the runtime selection carried by configuration, `Endian`
//! the compile-time policy the writer and reader are parameterized with.

/// wire byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// big-endian regardless of platform
    #[default]
    Network,
    /// native order of the executing platform
    Host,
}

impl ByteOrder {
    /// whether values are laid out most significant byte first
    pub const fn is_big_endian(self) -> bool {
        match self {
            ByteOrder::Network => true,
            ByteOrder::Host => cfg!(target_endian = "big"),
        }
    }

    /// decode an unsigned integer occupying all of `bytes` (at most 8)
    pub fn read_uint(self, bytes: &[u8]) -> u64 {
        debug_assert!(bytes.len() <= 8, "integer wider than 8 bytes");
        if self.is_big_endian() {
            bytes.iter().fold(0, |acc, &b| (acc << 8) | b as u64)
        } else {
            bytes.iter().rev().fold(0, |acc, &b| (acc << 8) | b as u64)
        }
    }

    /// encode the low `out.len()` bytes of `value` into `out` (at most 8)
    pub fn write_uint(self, value: u64, out: &mut [u8]) {
        debug_assert!(out.len() <= 8, "integer wider than 8 bytes");
        let n = out.len();
        if self.is_big_endian() {
            for (i, b) in out.iter_mut().enumerate() {
                *b = (value >> (8 * (n - 1 - i))) as u8;
            }
        } else {
            for (i, b) in out.iter_mut().enumerate() {
                *b = (value >> (8 * i)) as u8;
            }
        }
    }
}

/// fixed-width value with a defined wire representation
pub trait WireInt: Copy {
    /// encoded size in bytes
    const SIZE: usize;
    /// byte array holding one encoded value
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;

    fn to_be_bytes(self) -> Self::Bytes;
    fn to_le_bytes(self) -> Self::Bytes;
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_wire_int {
    ($($ty:ty),*) => {
        $(
            impl WireInt for $ty {
                const SIZE: usize = ::std::mem::size_of::<$ty>();
                type Bytes = [u8; ::std::mem::size_of::<$ty>()];

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }
                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_wire_int!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// compile-time byte order policy
pub trait Endian {
    /// order this policy produces
    const ORDER: ByteOrder;

    /// convert host value to wire bytes
    #[inline]
    fn to_wire<T: WireInt>(value: T) -> T::Bytes {
        if Self::ORDER.is_big_endian() {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    /// convert wire bytes to host value
    #[inline]
    fn from_wire<T: WireInt>(bytes: T::Bytes) -> T {
        if Self::ORDER.is_big_endian() {
            T::from_be_bytes(bytes)
        } else {
            T::from_le_bytes(bytes)
        }
    }

    /// encode the low `out.len()` bytes of an integer
    #[inline]
    fn uint_to_wire(value: u64, out: &mut [u8]) {
        Self::ORDER.write_uint(value, out)
    }

    /// decode an integer occupying all of `bytes`
    #[inline]
    fn uint_from_wire(bytes: &[u8]) -> u64 {
        Self::ORDER.read_uint(bytes)
    }
}

/// big-endian wire order
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkOrder;

impl Endian for NetworkOrder {
    const ORDER: ByteOrder = ByteOrder::Network;
}

/// native order, no conversion
#[derive(Debug, Clone, Copy, Default)]
pub struct HostOrder;

impl Endian for HostOrder {
    const ORDER: ByteOrder = ByteOrder::Host;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn network_is_big_endian() {
        assert_eq!(NetworkOrder::to_wire(0x0102_0304u32), [1, 2, 3, 4]);
        assert_eq!(NetworkOrder::to_wire(-2i16), [0xff, 0xfe]);
        assert_eq!(NetworkOrder::from_wire::<u16>([0x12, 0x34]), 0x1234);
        assert_eq!(NetworkOrder::to_wire(1.0f32), [0x3f, 0x80, 0, 0]);
    }

    #[test]
    fn host_is_native() {
        assert_eq!(HostOrder::to_wire(0x0102_0304u32), 0x0102_0304u32.to_ne_bytes());
        assert_eq!(
            HostOrder::from_wire::<u64>(77u64.to_ne_bytes()),
            77,
        );
    }

    #[test]
    fn truncated_uint() {
        let mut buf = [0u8; 3];
        ByteOrder::Network.write_uint(0x0a0b0c, &mut buf);
        assert_eq!(buf, [0x0a, 0x0b, 0x0c]);
        assert_eq!(ByteOrder::Network.read_uint(&buf), 0x0a0b0c);

        let mut buf = [0u8; 2];
        ByteOrder::Host.write_uint(0x1234, &mut buf);
        assert_eq!(buf, 0x1234u16.to_ne_bytes());
        assert_eq!(ByteOrder::Host.read_uint(&buf), 0x1234);

        // high bytes are dropped
        let mut buf = [0u8; 1];
        NetworkOrder::uint_to_wire(0x1ff, &mut buf);
        assert_eq!(buf, [0xff]);
        assert_eq!(NetworkOrder::uint_from_wire(&[]), 0);
    }
}
