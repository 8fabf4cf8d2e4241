use framekit_codec::common::{ByteBuffer, Endian};
use framekit_codec::writer::{BinaryWriter, LengthWidth};
use framekit_codec::CodecError;

pub mod handler;
pub mod serialized;
pub mod source;

/// encode payloads as consecutive frames with a length field of `width` bytes
pub fn encode_frames<E: Endian, P: AsRef<[u8]>>(
    payloads: impl IntoIterator<Item = P>,
    width: usize,
) -> Result<BinaryWriter<ByteBuffer, E>, CodecError> {
    let width = LengthWidth::Bytes(width);
    let mut writer = BinaryWriter::<ByteBuffer, E>::new();
    for payload in payloads {
        writer.prefixed(width, |w| w.write_bytes(payload.as_ref()))?;
    }
    Ok(writer)
}

pub fn setup_log_handlers() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    color_eyre::install().unwrap();

    let fmt_layer = fmt::layer().with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

pub fn initialize_logging() {
    use parking_lot::Once;

    static INITIALIZE: Once = Once::new();
    INITIALIZE.call_once(setup_log_handlers);
}
