use serde::{Deserialize, Serialize};

use framekit_codec::{ByteOrder, FrameOptions};

/// byte order as written in configuration files
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrderName {
    #[default]
    Network,
    Host,
}

impl From<ByteOrderName> for ByteOrder {
    fn from(name: ByteOrderName) -> Self {
        match name {
            ByteOrderName::Network => ByteOrder::Network,
            ByteOrderName::Host => ByteOrder::Host,
        }
    }
}

/// framing scheme loaded from a JSON file
///
/// Missing fields take the `FrameOptions` defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameConfig {
    pub max_frame_size: Option<usize>,
    pub length_field_offset: Option<usize>,
    pub length_field_length: Option<usize>,
    pub length_adjustment: Option<i32>,
    pub initial_bytes_to_strip: Option<usize>,
    pub byte_order: Option<ByteOrderName>,
}

impl FrameConfig {
    /// values set in `other` replace ours
    pub fn merge(self, other: FrameConfig) -> FrameConfig {
        FrameConfig {
            max_frame_size: other.max_frame_size.or(self.max_frame_size),
            length_field_offset: other.length_field_offset.or(self.length_field_offset),
            length_field_length: other.length_field_length.or(self.length_field_length),
            length_adjustment: other.length_adjustment.or(self.length_adjustment),
            initial_bytes_to_strip: other.initial_bytes_to_strip.or(self.initial_bytes_to_strip),
            byte_order: other.byte_order.or(self.byte_order),
        }
    }

    pub fn to_options(&self) -> FrameOptions {
        let defaults = FrameOptions::default();
        FrameOptions {
            max_frame_size: self.max_frame_size.unwrap_or(defaults.max_frame_size),
            length_field_offset: self
                .length_field_offset
                .unwrap_or(defaults.length_field_offset),
            length_field_length: self
                .length_field_length
                .unwrap_or(defaults.length_field_length),
            length_adjustment: self.length_adjustment.unwrap_or(defaults.length_adjustment),
            initial_bytes_to_strip: self
                .initial_bytes_to_strip
                .unwrap_or(defaults.initial_bytes_to_strip),
            byte_order: self.byte_order.map_or(defaults.byte_order, Into::into),
        }
    }
}

/// entry in the frame index written next to extracted frames
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// frame number, starting at 0
    pub index: u64,
    /// stream offset of the first header byte
    pub offset: u64,
    /// bytes occupied on the wire, header included
    pub wire_length: usize,
    /// bytes kept after stripping
    pub length: usize,
    /// file holding the kept bytes, relative to the output directory
    pub file: String,
}
