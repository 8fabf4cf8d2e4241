//! Utility functions for testing

/// split `data` into chunks ending at each (sorted, deduplicated) cut point
pub fn split_at_points<'a>(data: &'a [u8], cuts: &[usize]) -> Vec<&'a [u8]> {
    let mut cuts: Vec<usize> = cuts.iter().map(|&c| c.min(data.len())).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        chunks.push(&data[start..cut]);
        start = cut;
    }
    chunks.push(&data[start..]);
    chunks
}

/// install log handlers for tests, once per process
pub fn setup_test_logging() {
    use parking_lot::Once;
    use tracing_error::ErrorLayer;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    static INITIALIZE: Once = Once::new();
    INITIALIZE.call_once(|| {
        let _ = color_eyre::install();
        let filter_layer = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("warn"))
            .unwrap();
        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().with_test_writer())
            .with(ErrorLayer::default())
            .try_init();
    });
}
