use futures::stream;
use tracing::{debug, warn};

use crate::errors::{ProtocolError, StreamFailure};
use crate::transport::ByteStream;

use super::frame::FrameReader;

/// Typed interpretation of one stream frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Source references backing the answer.
    Sources(Vec<String>),
    /// Incremental answer text.
    Content(String),
    /// Producer finished the answer.
    Done,
    /// Producer failed; carries its message.
    Error(String),
}

#[derive(serde::Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Parses one non-blank frame into a `StreamEvent`.
pub fn parse_frame(frame: &str) -> Result<StreamEvent, ProtocolError> {
    let raw: RawFrame =
        serde_json::from_str(frame).map_err(|e| ProtocolError::malformed(e.to_string()))?;
    match raw.event_type.as_str() {
        "sources" => {
            let data = raw
                .data
                .ok_or_else(|| ProtocolError::malformed("sources frame without data"))?;
            serde_json::from_value::<Vec<String>>(data)
                .map(StreamEvent::Sources)
                .map_err(|e| ProtocolError::malformed(format!("sources data: {e}")))
        }
        "content" => match raw.data {
            Some(serde_json::Value::String(text)) => Ok(StreamEvent::Content(text)),
            _ => Err(ProtocolError::malformed("content data must be a string")),
        },
        "done" => Ok(StreamEvent::Done),
        // A failure signal is kept even when its payload is odd.
        "error" => Ok(StreamEvent::Error(match raw.data {
            Some(serde_json::Value::String(message)) => message,
            None | Some(serde_json::Value::Null) => "answer stream reported an error".to_string(),
            Some(other) => other.to_string(),
        })),
        other => Err(ProtocolError::UnknownType {
            event_type: other.to_string(),
        }),
    }
}

/// Parses a frame, reporting and skipping it on failure.
pub fn decode_frame(frame: &str) -> Option<StreamEvent> {
    match parse_frame(frame) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, frame = %preview(frame), "skipping stream frame");
            None
        }
    }
}

fn preview(frame: &str) -> &str {
    const MAX: usize = 120;
    match frame.char_indices().nth(MAX) {
        Some((idx, _)) => &frame[..idx],
        None => frame,
    }
}

/// Lazy sequence of events decoded from a newline-delimited JSON body.
///
/// Malformed frames are skipped. A body that ends while a frame is still
/// buffered yields a terminal transport failure.
pub fn event_stream(
    bytes: ByteStream,
) -> impl futures::Stream<Item = Result<StreamEvent, StreamFailure>> + Send {
    struct State {
        reader: FrameReader,
        skipped: usize,
    }

    stream::try_unfold(
        State {
            reader: FrameReader::new(bytes),
            skipped: 0,
        },
        |mut state| async move {
            loop {
                let Some(frame) = state.reader.next_frame().await? else {
                    if state.reader.dropped_partial() {
                        return Err(StreamFailure::transport(
                            "answer stream ended in the middle of a frame",
                        ));
                    }
                    if state.skipped > 0 {
                        debug!(skipped = state.skipped, "answer stream ended with skipped frames");
                    }
                    return Ok(None);
                };
                match decode_frame(&frame) {
                    Some(event) => return Ok(Some((event, state))),
                    None => state.skipped += 1,
                }
            }
        },
    )
}
