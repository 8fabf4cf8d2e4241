pub use framekit_codec as codec;
pub use framekit_codec::*;
