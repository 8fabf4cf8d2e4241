pub mod alloc;
pub mod byte_buffer;
pub mod endian;
pub mod varint;

#[cfg(test)]
pub mod test_util;

pub use alloc::{BufferAllocator, CopyingAllocator, ReallocAllocator};
pub use byte_buffer::{ByteBuffer, RawBlock};
pub use endian::{ByteOrder, Endian, HostOrder, NetworkOrder, WireInt};
pub use varint::VarInt;
