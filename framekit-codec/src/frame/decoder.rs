//! Incremental length-field frame decoder

use tracing::{debug, trace, warn};

use super::{FrameHandler, FrameOptions, MAX_LENGTH_FIELD_LENGTH};
use crate::error::{CodecError, Result};

/// per-connection frame decoder
///
/// Accepts chunks split at arbitrary offsets and reports frame boundaries to
/// a `FrameHandler`. Only the length field is retained between calls; body
/// bytes are passed straight through.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    options: FrameOptions,
    /// length_field_offset + length_field_length
    max_parsing_offset: usize,
    /// header bytes consumed so far, including skipped offset bytes
    parsing_offset: usize,
    /// raw length field bytes received so far
    length_field: [u8; MAX_LENGTH_FIELD_LENGTH],
    /// resolved body length, valid once the header is parsed
    frame_size: usize,
    /// body bytes consumed so far
    cur_size: usize,
    /// set after a fatal decode failure
    failed: bool,
    /// number of frames completed
    frames_decoded: u64,
}

/// snapshot of decoder progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderState {
    /// header bytes consumed, including skipped offset bytes
    pub parsing_offset: usize,
    /// resolved body length, None while the header is incomplete
    pub frame_size: Option<usize>,
    /// body bytes consumed in the current frame
    pub cur_size: usize,
}

impl FrameDecoder {
    /// create decoder for the given scheme
    pub fn new(options: FrameOptions) -> Result<FrameDecoder> {
        options.validate()?;
        let max_parsing_offset = if options.is_stream_mode() {
            0
        } else {
            options.header_length()
        };
        Ok(FrameDecoder {
            options,
            max_parsing_offset,
            parsing_offset: 0,
            length_field: [0; MAX_LENGTH_FIELD_LENGTH],
            frame_size: 0,
            cur_size: 0,
            failed: false,
            frames_decoded: 0,
        })
    }

    pub fn options(&self) -> &FrameOptions {
        &self.options
    }

    /// number of frames completed so far
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// whether a fatal failure occurred; the stream must be closed
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// whether the decoder sits on a frame boundary
    pub fn is_idle(&self) -> bool {
        self.parsing_offset == 0 && self.cur_size == 0
    }

    pub fn state(&self) -> DecoderState {
        DecoderState {
            parsing_offset: self.parsing_offset,
            frame_size: self.is_size_parsed().then_some(self.frame_size),
            cur_size: self.cur_size,
        }
    }

    fn is_size_parsed(&self) -> bool {
        self.parsing_offset == self.max_parsing_offset
    }

    /// feed a chunk of the byte stream
    ///
    /// May complete any number of frames, and may leave the last one
    /// partially received. An error is fatal: the decoder refuses further
    /// input and the stream should be closed.
    pub fn input<H: FrameHandler + ?Sized>(&mut self, mut data: &[u8], handler: &mut H) -> Result<()> {
        if self.failed {
            return Err(CodecError::DecoderFailed);
        }

        if self.options.is_stream_mode() {
            // every chunk is its own frame
            if !data.is_empty() {
                self.frame_size = data.len();
                self.cur_size = data.len();
                handler.data_received(data);
                self.flush(handler);
            }
            return Ok(());
        }

        while !data.is_empty() {
            if !self.is_size_parsed() {
                data = self.parse_size(data, handler)?;
                if !self.is_size_parsed() {
                    // wait for rest of header
                    debug_assert!(data.is_empty());
                    break;
                }
            }

            let read_size = usize::min(self.frame_size - self.cur_size, data.len());
            if read_size > 0 {
                let (body, rest) = data.split_at(read_size);
                handler.data_received(body);
                self.cur_size += read_size;
                data = rest;
            }

            if self.cur_size == self.frame_size {
                self.flush(handler);
            }
        }

        Ok(())
    }

    /// consume header bytes, returning the remaining input
    fn parse_size<'a, H: FrameHandler + ?Sized>(
        &mut self,
        mut data: &'a [u8],
        handler: &mut H,
    ) -> Result<&'a [u8]> {
        let field_offset = self.options.length_field_offset;
        if self.parsing_offset < field_offset {
            // skip bytes preceding the length field
            let advance = usize::min(field_offset - self.parsing_offset, data.len());
            let (skipped, rest) = data.split_at(advance);
            handler.header_received(skipped);
            self.parsing_offset += advance;
            data = rest;
        }
        if data.is_empty() {
            return Ok(data);
        }

        let read_size = usize::min(self.max_parsing_offset - self.parsing_offset, data.len());
        let start = self.parsing_offset - field_offset;
        let (field, rest) = data.split_at(read_size);
        self.length_field[start..start + read_size].copy_from_slice(field);
        handler.header_received(field);
        self.parsing_offset += read_size;

        if self.is_size_parsed() {
            self.resolve_size()?;
        }
        Ok(rest)
    }

    /// convert the accumulated length field into the body length
    fn resolve_size(&mut self) -> Result<()> {
        let width = self.options.length_field_length;
        let raw = self.options.byte_order.read_uint(&self.length_field[..width]);
        let length = raw as i64 + self.options.length_adjustment as i64;
        if length < 0 {
            return self.fail(CodecError::NegativeFrameLength(length));
        }
        if length as u64 > self.options.max_frame_size as u64 {
            return self.fail(CodecError::FrameTooLarge {
                length,
                max: self.options.max_frame_size,
            });
        }

        self.frame_size = length as usize;
        trace!("frame header parsed: raw length {raw}, body length {length}");
        Ok(())
    }

    /// finish current frame and reset for the next
    fn flush<H: FrameHandler + ?Sized>(&mut self, handler: &mut H) {
        debug!("frame complete ({} bytes)", self.frame_size);
        handler.frame_complete();
        self.frames_decoded += 1;
        self.reset();
    }

    fn reset(&mut self) {
        self.parsing_offset = 0;
        self.length_field = [0; MAX_LENGTH_FIELD_LENGTH];
        self.frame_size = 0;
        self.cur_size = 0;
    }

    fn fail(&mut self, err: CodecError) -> Result<()> {
        warn!("frame decode failed: {err}");
        self.reset();
        self.failed = true;
        Err(err)
    }
}
