//! Wire codec building blocks: an owned byte buffer, byte order policies, a
//! binary writer with backpatched length fields, a matching reader, and an
//! incremental length-field frame decoder.

pub mod common;
pub mod error;
pub mod frame;
pub mod reader;
pub mod writer;

pub use common::{ByteBuffer, ByteOrder, HostOrder, NetworkOrder};
pub use error::{CodecError, Result};
pub use frame::{FrameAssembler, FrameDecoder, FrameHandler, FrameOptions};
pub use reader::BinaryReader;
pub use writer::{BinaryWriter, HostWriter, NetworkWriter};
