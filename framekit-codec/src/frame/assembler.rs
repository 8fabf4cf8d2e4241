//! Collects decoded frames into owned buffers

use std::collections::VecDeque;

use tracing::trace;

use super::{FrameHandler, FrameOptions};
use crate::common::ByteBuffer;

/// frame handler that queues whole frames
///
/// Header and body bytes are accumulated in arrival order. The first
/// `initial_bytes_to_strip` bytes of every frame are dropped before they are
/// stored.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    initial_bytes_to_strip: usize,
    /// bytes of the current frame seen so far, stripped or not
    position: usize,
    current: ByteBuffer,
    frames: VecDeque<ByteBuffer>,
}

impl FrameAssembler {
    pub fn new(initial_bytes_to_strip: usize) -> FrameAssembler {
        FrameAssembler {
            initial_bytes_to_strip,
            ..Default::default()
        }
    }

    /// assembler applying the strip count of `options`
    pub fn from_options(options: &FrameOptions) -> FrameAssembler {
        FrameAssembler::new(options.initial_bytes_to_strip)
    }

    /// take the oldest completed frame
    pub fn pop_frame(&mut self) -> Option<ByteBuffer> {
        self.frames.pop_front()
    }

    /// take all completed frames
    pub fn drain(&mut self) -> impl Iterator<Item = ByteBuffer> + '_ {
        self.frames.drain(..)
    }

    /// iterate completed frames without taking them
    pub fn iter(&self) -> impl Iterator<Item = &ByteBuffer> + '_ {
        self.frames.iter()
    }

    /// number of completed frames waiting
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// bytes of the incomplete frame kept so far
    pub fn pending_len(&self) -> usize {
        self.current.len()
    }

    fn accept(&mut self, data: &[u8]) {
        let skip = self
            .initial_bytes_to_strip
            .saturating_sub(self.position)
            .min(data.len());
        self.position += data.len();
        self.current.extend_from_slice(&data[skip..]);
    }
}

impl FrameHandler for FrameAssembler {
    fn header_received(&mut self, data: &[u8]) {
        self.accept(data);
    }

    fn data_received(&mut self, data: &[u8]) {
        self.accept(data);
    }

    fn frame_complete(&mut self) {
        let frame = self.current.take();
        trace!("assembled frame of {} bytes", frame.len());
        self.frames.push_back(frame);
        self.position = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::test_util::split_at_points;
    use crate::frame::FrameDecoder;

    fn run(options: FrameOptions, stream: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
        let mut decoder = FrameDecoder::new(options.clone()).unwrap();
        let mut assembler = FrameAssembler::from_options(&options);
        for chunk in split_at_points(stream, cuts) {
            decoder.input(chunk, &mut assembler).unwrap();
        }
        assembler.drain().map(Vec::from).collect()
    }

    #[test]
    fn keeps_header_without_strip() {
        let options = FrameOptions::default().with_length_field_length(2);
        let frames = run(options, &[0, 2, b'h', b'i', 0, 0], &[1, 3]);
        assert_eq!(frames, vec![vec![0, 2, b'h', b'i'], vec![0, 0]]);
    }

    #[test]
    fn strips_header() {
        let options = FrameOptions::default()
            .with_length_field_offset(1)
            .with_length_field_length(2)
            .with_initial_bytes_to_strip(3);
        let stream = [0x7f, 0, 3, b'a', b'b', b'c', 0x10, 0, 1, b'z'];
        for cuts in [&[][..], &[1, 2, 4], &[9], &[5, 6, 7, 8]] {
            let frames = run(options.clone(), &stream, cuts);
            assert_eq!(frames, vec![b"abc".to_vec(), b"z".to_vec()]);
        }
    }

    #[test]
    fn strip_into_body() {
        let options = FrameOptions::default()
            .with_length_field_length(1)
            .with_initial_bytes_to_strip(2);
        let frames = run(options, &[3, 1, 2, 3, 0], &[2]);
        assert_eq!(frames, vec![vec![2, 3], vec![]]);
    }

    #[test]
    fn pending_and_pop() {
        let options = FrameOptions::default().with_length_field_length(1);
        let mut decoder = FrameDecoder::new(options).unwrap();
        let mut assembler = FrameAssembler::new(0);

        decoder.input(&[4, 1, 2], &mut assembler).unwrap();
        assert!(assembler.is_empty());
        assert_eq!(assembler.pending_len(), 3);

        decoder.input(&[3, 4], &mut assembler).unwrap();
        assert_eq!(assembler.len(), 1);
        assert_eq!(assembler.pending_len(), 0);
        assert_eq!(assembler.iter().next().unwrap(), &[4, 1, 2, 3, 4]);
        assert_eq!(assembler.pop_frame().unwrap(), [4, 1, 2, 3, 4]);
        assert!(assembler.pop_frame().is_none());
    }
}
