//! Wire protocol of the `/ask` answer stream.
//!
//! The body is newline-delimited JSON: one `{type, data?}` object per line.
//! `frame` turns arbitrary byte chunks into lines, `event` turns lines into
//! typed events.
mod event;
mod frame;
#[cfg(test)]
mod proptests;

pub use event::{StreamEvent, decode_frame, event_stream, parse_frame};
pub use frame::{FrameDecoder, frame_stream};
