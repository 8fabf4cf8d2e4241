use std::path::PathBuf;

use clap::Parser as ClapParser;
use eyre::Context;
use framekit_codec::{FrameDecoder, FrameHandler, FrameOptions};
use framekit_dump::handler::{
    DirectoryOutputHandler, DirectoryOutputSharedInfo, DumpHandler, ErrorReceiver,
};
use framekit_dump::initialize_logging;
use framekit_dump::serialized::{ByteOrderName, FrameConfig};
use framekit_dump::source::{decode_chunks, spawn_chunk_reader, FileOrStdinReader};
use tracing::{info, warn};

/// Split a length-prefixed byte stream into frames
#[derive(ClapParser, Debug)]
#[command(about, version)]
struct Args {
    /// Input file, or "-" for stdin
    #[arg(index = 1)]
    input: PathBuf,
    /// Directory to write frames to. If not provided, will dump to stdout.
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,
    /// JSON file with framing options; command line values take precedence
    #[arg(long)]
    options: Option<PathBuf>,
    /// Bytes preceding the length field
    #[arg(long)]
    length_field_offset: Option<usize>,
    /// Width of the length field in bytes (0 to 4, 0 treats every read as a frame)
    #[arg(long)]
    length_field_length: Option<usize>,
    /// Added to the decoded length to get the body length
    #[arg(long, allow_hyphen_values = true)]
    length_adjustment: Option<i32>,
    /// Bytes removed from the start of every frame
    #[arg(long)]
    strip: Option<usize>,
    /// Largest accepted frame body
    #[arg(long)]
    max_frame_size: Option<usize>,
    /// Length field is in host byte order instead of network order
    #[arg(long)]
    host_order: bool,
    /// Read size in bytes
    #[arg(long, default_value_t = 64 << 10)]
    chunk_size: usize,
}

impl Args {
    fn frame_options(&self) -> eyre::Result<FrameOptions> {
        let file_config: FrameConfig = match &self.options {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text).wrap_err("parsing framing options")?
            }
            None => FrameConfig::default(),
        };
        let cli_config = FrameConfig {
            max_frame_size: self.max_frame_size,
            length_field_offset: self.length_field_offset,
            length_field_length: self.length_field_length,
            length_adjustment: self.length_adjustment,
            initial_bytes_to_strip: self.strip,
            byte_order: self.host_order.then_some(ByteOrderName::Host),
        };
        let options = file_config.merge(cli_config).to_options();
        options.validate().wrap_err("invalid framing options")?;
        Ok(options)
    }
}

fn main() -> eyre::Result<()> {
    initialize_logging();
    let args = Args::parse();
    let options = args.frame_options()?;
    info!("framing options: {options:?}");

    let input = FileOrStdinReader::open(&args.input).wrap_err("cannot open input")?;
    let source = spawn_chunk_reader(input, args.chunk_size);
    let mut decoder = FrameDecoder::new(options.clone())?;

    if let Some(out_dir) = args.output_dir {
        std::fs::create_dir_all(&out_dir).wrap_err("creating output directory")?;
        let (shared_info, errors_rx) = DirectoryOutputSharedInfo::new(out_dir)
            .wrap_err("writing frame index file")?;
        let mut handler = DirectoryOutputHandler::new(shared_info.clone(), &options);
        let result = run(&source.chunks, &mut decoder, &mut handler, Some(&errors_rx));
        info!("{} frames written", handler.frames_written());
        drop(handler);
        // index stays valid json even when the run was aborted
        let closed = shared_info.close();
        result?;
        closed?;
    } else {
        let stdout = std::io::stdout().lock();
        let mut handler = DumpHandler::new(stdout, &options);
        run(&source.chunks, &mut decoder, &mut handler, None)?;
    }

    drop(source.chunks);
    if source.thread.join().is_err() {
        warn!("input reader thread panicked");
    }
    Ok(())
}

fn run(
    chunks: &crossbeam_channel::Receiver<std::io::Result<Vec<u8>>>,
    decoder: &mut FrameDecoder,
    handler: &mut impl FrameHandler,
    errors: Option<&ErrorReceiver>,
) -> eyre::Result<()> {
    let consumed = decode_chunks(chunks, decoder, handler, errors)?;
    info!(
        "read {consumed} bytes, {} frames decoded",
        decoder.frames_decoded()
    );
    if !decoder.is_idle() {
        warn!("input ended inside a frame");
    }
    Ok(())
}
