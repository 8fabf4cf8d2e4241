//! Length-field framing
//!
//! A frame on the wire is laid out as
//!
//! ```text
//! +--------------------------+------------------------+------------------+
//! | length_field_offset bytes | length_field_length    | body             |
//! | (skipped, not decoded)    | bytes (frame length)   | (length + adj.)  |
//! +--------------------------+------------------------+------------------+
//! ```
//!
//! With `length_field_length == 0` there is no header at all and every chunk
//! handed to the decoder is a frame of its own.

pub mod assembler;
pub mod decoder;

pub use assembler::FrameAssembler;
pub use decoder::{DecoderState, FrameDecoder};

use crate::common::ByteOrder;
use crate::error::{CodecError, Result};

/// widest supported length field, in bytes
pub const MAX_LENGTH_FIELD_LENGTH: usize = 4;

/// framing scheme of one byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOptions {
    /// upper bound on the resolved frame length
    pub max_frame_size: usize,
    /// bytes to skip before the length field begins
    pub length_field_offset: usize,
    /// width of the length field, 0 through 4 (0 means stream mode)
    pub length_field_length: usize,
    /// added to the decoded length to get the body length
    pub length_adjustment: i32,
    /// bytes of each assembled frame not delivered to the consumer
    ///
    /// Not applied by the decoder itself, see `FrameAssembler`.
    pub initial_bytes_to_strip: usize,
    /// byte order of the length field
    pub byte_order: ByteOrder,
}

impl Default for FrameOptions {
    fn default() -> Self {
        FrameOptions {
            max_frame_size: i32::MAX as usize,
            length_field_offset: 0,
            length_field_length: 4,
            length_adjustment: 0,
            initial_bytes_to_strip: 0,
            byte_order: ByteOrder::Network,
        }
    }
}

impl FrameOptions {
    /// options for unframed streams, where every chunk is one frame
    pub fn stream_mode() -> Self {
        FrameOptions {
            length_field_length: 0,
            ..Default::default()
        }
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_length_field_offset(mut self, offset: usize) -> Self {
        self.length_field_offset = offset;
        self
    }

    pub fn with_length_field_length(mut self, length: usize) -> Self {
        self.length_field_length = length;
        self
    }

    pub fn with_length_adjustment(mut self, adjustment: i32) -> Self {
        self.length_adjustment = adjustment;
        self
    }

    pub fn with_initial_bytes_to_strip(mut self, strip: usize) -> Self {
        self.initial_bytes_to_strip = strip;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// whether frames are delimited by input chunks instead of a header
    pub fn is_stream_mode(&self) -> bool {
        self.length_field_length == 0
    }

    /// header bytes preceding the body: skipped bytes plus the length field
    pub fn header_length(&self) -> usize {
        self.length_field_offset + self.length_field_length
    }

    /// check that the options describe a decodable scheme
    pub fn validate(&self) -> Result<()> {
        if self.length_field_length > MAX_LENGTH_FIELD_LENGTH {
            return Err(CodecError::InvalidLengthFieldLength(
                self.length_field_length,
            ));
        }
        if self
            .length_field_offset
            .checked_add(self.length_field_length)
            .is_none()
        {
            return Err(CodecError::InvalidLengthFieldOffset(
                self.length_field_offset,
            ));
        }
        Ok(())
    }
}

/// receiver of decoded frame events
///
/// The decoder does not buffer frames. Bytes are passed through as soon as
/// they arrive, and the handler decides where they go.
pub trait FrameHandler {
    /// called with skipped offset bytes and length field bytes
    fn header_received(&mut self, _data: &[u8]) {}
    /// called with body bytes, possibly several times per frame
    fn data_received(&mut self, data: &[u8]);
    /// called once when the current frame is complete
    fn frame_complete(&mut self);
}

impl<H: FrameHandler + ?Sized> FrameHandler for &mut H {
    fn header_received(&mut self, data: &[u8]) {
        (**self).header_received(data)
    }

    fn data_received(&mut self, data: &[u8]) {
        (**self).data_received(data)
    }

    fn frame_complete(&mut self) {
        (**self).frame_complete()
    }
}
