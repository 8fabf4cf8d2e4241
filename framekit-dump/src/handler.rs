use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use eyre::Context;
use framekit_codec::{FrameAssembler, FrameHandler, FrameOptions};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::serialized::FrameRecord;

/// name of the frame index written to the output directory
pub const INDEX_FILE_NAME: &str = "frames.json";

macro_rules! log_error {
    ($result:expr, $what:expr) => {
        if let Err(e) = $result {
            ::tracing::error!(concat!($what, ": {:?}"), e);
        }
    };
}

pub fn dump_as_readable_ascii(out: &mut impl Write, buf: &[u8], newline: bool) -> io::Result<()> {
    let readable: Vec<u8> = buf
        .iter()
        .copied()
        .map(|v| {
            if (b' '..=b'~').contains(&v) || v == b'\n' {
                v
            } else {
                b'.'
            }
        })
        .collect();
    out.write_all(&readable)?;
    if newline {
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// tracks where the current frame starts in the byte stream
#[derive(Default)]
struct StreamPosition {
    offset: u64,
    frame_start: u64,
    frames: u64,
}

impl StreamPosition {
    fn advance(&mut self, len: usize) {
        self.offset += len as u64;
    }

    /// close the current frame, returning (index, start offset, wire length)
    fn finish_frame(&mut self) -> (u64, u64, usize) {
        let out = (
            self.frames,
            self.frame_start,
            (self.offset - self.frame_start) as usize,
        );
        self.frames += 1;
        self.frame_start = self.offset;
        out
    }
}

/// FrameHandler printing each frame as readable text
pub struct DumpHandler<W: Write> {
    pub out: W,
    assembler: FrameAssembler,
    position: StreamPosition,
}

impl<W: Write> DumpHandler<W> {
    pub fn new(out: W, options: &FrameOptions) -> Self {
        DumpHandler {
            out,
            assembler: FrameAssembler::from_options(options),
            position: StreamPosition::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_frame(&mut self) -> io::Result<()> {
        let (index, offset, wire_length) = self.position.finish_frame();
        while let Some(frame) = self.assembler.pop_frame() {
            writeln!(
                self.out,
                "==================== frame {index} (offset {offset}, {wire_length} bytes on wire, {} kept)",
                frame.len()
            )?;
            dump_as_readable_ascii(&mut self.out, &frame, true)?;
        }
        self.out.flush()
    }
}

impl<W: Write> FrameHandler for DumpHandler<W> {
    fn header_received(&mut self, data: &[u8]) {
        self.position.advance(data.len());
        self.assembler.header_received(data);
    }

    fn data_received(&mut self, data: &[u8]) {
        self.position.advance(data.len());
        self.assembler.data_received(data);
    }

    fn frame_complete(&mut self) {
        self.assembler.frame_complete();
        log_error!(self.write_frame(), "failed to write frame");
    }
}

/// shared state for DirectoryOutputHandler
pub struct DirectoryOutputSharedInfoInner {
    pub base_dir: PathBuf,
    pub index_file: Mutex<File>,
}

#[derive(Clone)]
pub struct DirectoryOutputSharedInfo {
    pub inner: Arc<DirectoryOutputSharedInfoInner>,
    pub errors: crossbeam_channel::Sender<eyre::Report>,
}

pub type ErrorReceiver = crossbeam_channel::Receiver<eyre::Report>;

impl DirectoryOutputSharedInfo {
    /// create with output path
    pub fn new(base_dir: PathBuf) -> io::Result<(Self, ErrorReceiver)> {
        let mut index_file = File::create(base_dir.join(INDEX_FILE_NAME))?;
        index_file.write_all(b"[\n")?;
        let (error_tx, error_rx) = crossbeam_channel::unbounded();
        Ok((
            DirectoryOutputSharedInfo {
                inner: Arc::new(DirectoryOutputSharedInfoInner {
                    base_dir,
                    index_file: Mutex::new(index_file),
                }),
                errors: error_tx,
            },
            error_rx,
        ))
    }

    /// append entry to the frame index
    pub fn record_frame(&self, record: &FrameRecord) -> eyre::Result<()> {
        let mut serialized = serde_json::to_string(record).wrap_err("serializing frame record")?;
        serialized += ",\n";
        let mut file = self.inner.index_file.lock();
        file.write_all(serialized.as_bytes())
            .wrap_err("writing frame index")
    }

    /// close frame index file
    pub fn close(self) -> eyre::Result<()> {
        let inner = Arc::into_inner(self.inner)
            .ok_or_else(|| eyre::eyre!("frame index still in use"))?;
        let mut index_file = inner.index_file.into_inner();
        let current_pos = index_file.stream_position()?;
        if current_pos > 2 {
            // overwrite trailing comma and close array
            index_file.seek(SeekFrom::Current(-2))?;
            index_file.write_all(b"\n]\n")?;
        } else {
            // no frames, just close the array
            index_file.write_all(b"]\n")?;
        }
        Ok(())
    }

    /// run a closure, sending errors through the error channel
    pub fn capture_errors<T>(&self, func: impl FnOnce() -> eyre::Result<T>) -> Option<T> {
        match func() {
            Ok(r) => Some(r),
            Err(e) => {
                // receiver gone means nobody is left to report to
                let _ = self.errors.send(e);
                None
            }
        }
    }
}

/// FrameHandler writing each frame to its own file
pub struct DirectoryOutputHandler {
    pub shared_info: DirectoryOutputSharedInfo,
    assembler: FrameAssembler,
    position: StreamPosition,
    written: u64,
}

impl DirectoryOutputHandler {
    pub fn new(shared_info: DirectoryOutputSharedInfo, options: &FrameOptions) -> Self {
        DirectoryOutputHandler {
            shared_info,
            assembler: FrameAssembler::from_options(options),
            position: StreamPosition::default(),
            written: 0,
        }
    }

    pub fn frame_file_name(index: u64) -> String {
        format!("frame-{index:06}.bin")
    }

    fn write_frame(&mut self) -> eyre::Result<()> {
        let (index, offset, wire_length) = self.position.finish_frame();
        let Some(frame) = self.assembler.pop_frame() else {
            return Ok(());
        };
        let file = Self::frame_file_name(index);
        trace!("writing frame {index} to {file}");
        std::fs::write(self.shared_info.inner.base_dir.join(&file), &frame)
            .wrap_err_with(|| format!("writing {file}"))?;
        self.shared_info.record_frame(&FrameRecord {
            index,
            offset,
            wire_length,
            length: frame.len(),
            file,
        })?;
        self.written += 1;
        debug!("frame {index} written ({} bytes)", frame.len());
        Ok(())
    }

    /// frames successfully written and indexed so far
    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl FrameHandler for DirectoryOutputHandler {
    fn header_received(&mut self, data: &[u8]) {
        self.position.advance(data.len());
        self.assembler.header_received(data);
    }

    fn data_received(&mut self, data: &[u8]) {
        self.position.advance(data.len());
        self.assembler.data_received(data);
    }

    fn frame_complete(&mut self) {
        self.assembler.frame_complete();
        let shared_info = self.shared_info.clone();
        shared_info.capture_errors(|| self.write_frame());
    }
}

impl Drop for DirectoryOutputHandler {
    fn drop(&mut self) {
        if self.assembler.pending_len() > 0 {
            info!(
                "discarding incomplete frame ({} bytes buffered)",
                self.assembler.pending_len()
            );
        }
    }
}

#[cfg(test)]
mod test {
    use framekit_codec::FrameDecoder;

    use super::*;

    fn stream() -> Vec<u8> {
        // 1 byte tag, 2 byte length, body
        vec![0xa0, 0, 5, b'h', b'e', b'l', b'l', b'o', 0xa1, 0, 2, 0, 0x7f]
    }

    fn options() -> FrameOptions {
        FrameOptions::default()
            .with_length_field_offset(1)
            .with_length_field_length(2)
            .with_initial_bytes_to_strip(3)
    }

    #[test]
    fn readable_ascii() {
        let mut out = Vec::new();
        dump_as_readable_ascii(&mut out, b"ok\n\x00\xff~", false).unwrap();
        assert_eq!(out, b"ok\n..~");
    }

    #[test]
    fn dump_frames() {
        let options = options();
        let mut decoder = FrameDecoder::new(options.clone()).unwrap();
        let mut handler = DumpHandler::new(Vec::new(), &options);
        for chunk in stream().chunks(4) {
            decoder.input(chunk, &mut handler).unwrap();
        }
        let text = String::from_utf8(handler.into_inner()).unwrap();
        assert_eq!(
            text,
            "==================== frame 0 (offset 0, 8 bytes on wire, 5 kept)\nhello\n\
             ==================== frame 1 (offset 8, 5 bytes on wire, 2 kept)\n..\n"
        );
    }

    #[test]
    fn directory_output() {
        let dir = tempfile::tempdir().unwrap();
        let (shared_info, errors) = DirectoryOutputSharedInfo::new(dir.path().into()).unwrap();
        let options = options();
        let mut decoder = FrameDecoder::new(options.clone()).unwrap();
        let mut handler = DirectoryOutputHandler::new(shared_info.clone(), &options);
        decoder.input(&stream(), &mut handler).unwrap();
        assert_eq!(handler.frames_written(), 2);
        drop(handler);
        shared_info.close().unwrap();
        assert!(errors.try_recv().is_err());

        let first = std::fs::read(dir.path().join("frame-000000.bin")).unwrap();
        assert_eq!(first, b"hello");
        let second = std::fs::read(dir.path().join("frame-000001.bin")).unwrap();
        assert_eq!(second, [0u8, 0x7f]);

        let index = std::fs::read_to_string(dir.path().join(INDEX_FILE_NAME)).unwrap();
        let records: Vec<FrameRecord> = serde_json::from_str(&index).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].offset, 8);
        assert_eq!(records[1].wire_length, 5);
        assert_eq!(records[1].length, 2);
        assert_eq!(records[1].file, "frame-000001.bin");
    }

    #[test]
    fn empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let (shared_info, _errors) = DirectoryOutputSharedInfo::new(dir.path().into()).unwrap();
        shared_info.close().unwrap();
        let index = std::fs::read_to_string(dir.path().join(INDEX_FILE_NAME)).unwrap();
        let records: Vec<FrameRecord> = serde_json::from_str(&index).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn write_errors_are_captured() {
        let dir = tempfile::tempdir().unwrap();
        let (shared_info, errors) = DirectoryOutputSharedInfo::new(dir.path().into()).unwrap();
        let options = FrameOptions::default().with_length_field_length(1);
        let mut decoder = FrameDecoder::new(options.clone()).unwrap();
        let mut handler = DirectoryOutputHandler::new(shared_info, &options);
        // a directory where the frame file should go
        std::fs::create_dir(dir.path().join(DirectoryOutputHandler::frame_file_name(0))).unwrap();
        decoder.input(&[1, 0], &mut handler).unwrap();
        let err = errors.try_recv().unwrap();
        assert!(format!("{err}").contains("frame-000000.bin"));
        assert_eq!(handler.frames_written(), 0);

        decoder.input(&[1, 1], &mut handler).unwrap();
        assert!(errors.try_recv().is_err());
        assert_eq!(handler.frames_written(), 1);
    }
}
