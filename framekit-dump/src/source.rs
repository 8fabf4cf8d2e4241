//! Input sources feeding the frame decoder

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use eyre::Context;
use framekit_codec::{FrameDecoder, FrameHandler};
use tracing::trace;

use crate::handler::ErrorReceiver;

/// chunks buffered between the reader thread and the decoder
const CHANNEL_CAPACITY: usize = 16;

pub enum FileOrStdinReader {
    File(File),
    Stdin,
}

impl FileOrStdinReader {
    /// open `path`, with "-" meaning standard input
    pub fn open(path: &Path) -> io::Result<Self> {
        if path == Path::new("-") {
            Ok(FileOrStdinReader::Stdin)
        } else {
            Ok(FileOrStdinReader::File(File::open(path)?))
        }
    }
}

macro_rules! impl_read_method {
    (fn $name:ident(&mut self $(, $arg_name:ident: $arg_ty:ty)?) -> $ret:ty) => {
        fn $name(&mut self $(, $arg_name: $arg_ty)?) -> $ret {
            match self {
                Self::File(f) => ::std::fs::File::$name(f $(, $arg_name)?),
                Self::Stdin => ::std::io::Stdin::$name(&mut ::std::io::stdin() $(, $arg_name)?)
            }
        }
    };
}

impl Read for FileOrStdinReader {
    impl_read_method!(fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>);
    impl_read_method!(fn read_to_end(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize>);
}

/// chunks read by a background thread, in stream order
pub struct ChunkSource {
    pub chunks: Receiver<io::Result<Vec<u8>>>,
    pub thread: JoinHandle<()>,
}

/// read `reader` on a separate thread in chunks of at most `chunk_size`
pub fn spawn_chunk_reader(mut reader: impl Read + Send + 'static, chunk_size: usize) -> ChunkSource {
    let (tx, rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
    let chunk_size = chunk_size.max(1);
    let thread = thread::spawn(move || loop {
        let mut buf = vec![0u8; chunk_size];
        match reader.read(&mut buf) {
            Ok(0) => {
                trace!("reader reached end of input");
                break;
            }
            Ok(n) => {
                buf.truncate(n);
                if tx.send(Ok(buf)).is_err() {
                    // decoder side went away
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    });
    ChunkSource { chunks: rx, thread }
}

/// feed every chunk to the decoder, returning the number of bytes consumed
///
/// If `errors` is given, the first error a handler reported through it stops
/// decoding after the chunk that caused it.
pub fn decode_chunks<H: FrameHandler + ?Sized>(
    chunks: &Receiver<io::Result<Vec<u8>>>,
    decoder: &mut FrameDecoder,
    handler: &mut H,
    errors: Option<&ErrorReceiver>,
) -> eyre::Result<u64> {
    let mut consumed = 0u64;
    for chunk in chunks.iter() {
        let chunk = chunk.wrap_err("reading input")?;
        decoder
            .input(&chunk, &mut *handler)
            .wrap_err_with(|| format!("decoding stream at offset {consumed}"))?;
        consumed += chunk.len() as u64;
        if let Some(Ok(e)) = errors.map(|rx| rx.try_recv()) {
            return Err(e);
        }
    }
    Ok(consumed)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use framekit_codec::{FrameAssembler, FrameOptions};

    use super::*;

    #[test]
    fn chunked_decode() {
        let stream = vec![0, 3, 1, 2, 3, 0, 0, 0, 2, 9, 9];
        for chunk_size in [1, 2, 5, 64] {
            let source = spawn_chunk_reader(Cursor::new(stream.clone()), chunk_size);
            let options = FrameOptions::default().with_length_field_length(2);
            let mut decoder = FrameDecoder::new(options).unwrap();
            let mut assembler = FrameAssembler::new(2);
            let consumed = decode_chunks(&source.chunks, &mut decoder, &mut assembler, None).unwrap();
            source.thread.join().unwrap();

            assert_eq!(consumed, stream.len() as u64);
            let frames: Vec<Vec<u8>> = assembler.drain().map(Vec::from).collect();
            assert_eq!(frames, vec![vec![1, 2, 3], vec![], vec![9, 9]]);
        }
    }

    #[test]
    fn decode_failure_reports_offset() {
        let stream = vec![0, 1, 7, 0xff, 0xff];
        let source = spawn_chunk_reader(Cursor::new(stream), 3);
        let options = FrameOptions::default()
            .with_length_field_length(2)
            .with_max_frame_size(16);
        let mut decoder = FrameDecoder::new(options).unwrap();
        let mut assembler = FrameAssembler::new(0);
        let err = decode_chunks(&source.chunks, &mut decoder, &mut assembler, None).unwrap_err();
        assert!(format!("{err:#}").contains("offset 3"));
        assert!(decoder.is_failed());
        drop(source.chunks);
        source.thread.join().unwrap();
    }

    #[test]
    fn handler_error_stops_decoding() {
        use crate::handler::{DirectoryOutputHandler, DirectoryOutputSharedInfo, INDEX_FILE_NAME};
        use crate::serialized::FrameRecord;

        let dir = tempfile::tempdir().unwrap();
        let (shared_info, errors) = DirectoryOutputSharedInfo::new(dir.path().into()).unwrap();
        let options = FrameOptions::default().with_length_field_length(2);
        let mut decoder = FrameDecoder::new(options.clone()).unwrap();
        let mut handler = DirectoryOutputHandler::new(shared_info.clone(), &options);
        // first frame file cannot be created
        std::fs::create_dir(dir.path().join(DirectoryOutputHandler::frame_file_name(0))).unwrap();

        let stream = vec![0, 1, b'a', 0, 1, b'b', 0, 1, b'c'];
        let source = spawn_chunk_reader(Cursor::new(stream), 3);
        let err = decode_chunks(&source.chunks, &mut decoder, &mut handler, Some(&errors))
            .unwrap_err();
        assert!(format!("{err}").contains("frame-000000.bin"));
        assert_eq!(handler.frames_written(), 0);
        assert!(!dir.path().join("frame-000001.bin").exists());
        assert!(!dir.path().join("frame-000002.bin").exists());
        drop(source.chunks);
        source.thread.join().unwrap();

        drop(handler);
        shared_info.close().unwrap();
        let index = std::fs::read_to_string(dir.path().join(INDEX_FILE_NAME)).unwrap();
        let records: Vec<FrameRecord> = serde_json::from_str(&index).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn open_file_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        std::fs::write(&path, b"abc").unwrap();
        let mut reader = FileOrStdinReader::open(&path).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
        assert!(FileOrStdinReader::open(&dir.path().join("missing")).is_err());
    }
}
