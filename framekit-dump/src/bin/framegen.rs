use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use clap::Parser as ClapParser;
use eyre::Context;
use framekit_codec::{HostOrder, NetworkOrder};
use framekit_dump::source::FileOrStdinReader;
use framekit_dump::{encode_frames, initialize_logging};
use tracing::info;

/// Encode each line of the input as one length-prefixed frame
#[derive(ClapParser, Debug)]
#[command(about, version)]
struct Args {
    /// Input text file, or "-" for stdin
    #[arg(index = 1)]
    input: PathBuf,
    /// File to write the framed stream to
    #[arg(short = 'o', long)]
    output: PathBuf,
    /// Width of the length field in bytes (1 to 4)
    #[arg(long, default_value_t = 4)]
    length_field_length: usize,
    /// Write the length field in host byte order
    #[arg(long)]
    host_order: bool,
}

fn main() -> eyre::Result<()> {
    initialize_logging();
    let args = Args::parse();
    if !(1..=4).contains(&args.length_field_length) {
        eyre::bail!(
            "length field length must be 1 to 4, got {}",
            args.length_field_length
        );
    }

    let input = FileOrStdinReader::open(&args.input).wrap_err("cannot open input")?;
    let lines = BufReader::new(input)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .wrap_err("reading input")?;

    let width = args.length_field_length;
    if args.host_order {
        let writer = encode_frames::<HostOrder, _>(&lines, width)?;
        writer.save(&args.output).wrap_err("writing output")?;
        info!("wrote {} frames ({} bytes)", lines.len(), writer.len());
    } else {
        let writer = encode_frames::<NetworkOrder, _>(&lines, width)?;
        writer.save(&args.output).wrap_err("writing output")?;
        info!("wrote {} frames ({} bytes)", lines.len(), writer.len());
    }
    Ok(())
}
