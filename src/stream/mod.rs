//! Decoding of the `data: <json>` framed conversation stream.

pub mod decoder;

pub use decoder::{
    DONE_SENTINEL, EVENT_PREFIX, LineDecoder, decode_lines, decode_messages, strip_field_prefix,
};
