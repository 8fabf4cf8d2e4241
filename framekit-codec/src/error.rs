//! Codec error type

use thiserror::Error;

/// errors reported by buffers, writers, readers and the frame decoder
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// bounded access past the end of a buffer
    #[error("out of range: offset {offset} + {len} exceeds bound {bound}")]
    OutOfRange {
        offset: usize,
        len: usize,
        bound: usize,
    },

    /// the allocator could not provide the requested capacity
    #[error("failed to allocate {requested} bytes")]
    AllocationFailure { requested: usize },

    /// length field width must be between 0 and 4 bytes
    #[error("invalid length field length {0} (expected 0 to 4)")]
    InvalidLengthFieldLength(usize),

    /// offset plus length field width does not fit in usize
    #[error("invalid length field offset {0}")]
    InvalidLengthFieldOffset(usize),

    /// decoded length plus adjustment went below zero
    #[error("negative frame length {0}")]
    NegativeFrameLength(i64),

    /// decoded length plus adjustment exceeds the configured maximum
    #[error("frame length {length} exceeds maximum {max}")]
    FrameTooLarge { length: i64, max: usize },

    /// decoder was fed input after a fatal decode failure
    #[error("frame decoder already failed, stream must be closed")]
    DecoderFailed,

    /// computed backpatch length does not fit the placeholder
    #[error("length {length} does not fit in a {width} byte field")]
    LengthOverflow { length: usize, width: usize },

    /// variable length integer ran past the width of its type
    #[error("malformed varint")]
    MalformedVarint,
}

impl CodecError {
    /// construct OutOfRange for an access of `len` bytes at `offset`
    pub(crate) fn out_of_range(offset: usize, len: usize, bound: usize) -> CodecError {
        CodecError::OutOfRange { offset, len, bound }
    }

    /// whether the error is fatal for the byte stream being decoded
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CodecError::AllocationFailure { .. }
                | CodecError::InvalidLengthFieldLength(_)
                | CodecError::InvalidLengthFieldOffset(_)
                | CodecError::NegativeFrameLength(_)
                | CodecError::FrameTooLarge { .. }
                | CodecError::DecoderFailed
        )
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
