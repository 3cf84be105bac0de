//! Request seam between sessions and the analysis service.
//!
//! Sessions only see `AskTransport`; `HttpTransport` is the reqwest-backed
//! implementation that also carries the collaborator requests.
mod config;
#[cfg(test)]
pub(crate) mod fake;
mod http;

use std::pin::Pin;

pub use config::ClientConfig;
pub use http::HttpTransport;

use crate::api::{AskAnswer, AskRequest};
use crate::errors::StreamFailure;

/// Raw response body chunks, sized and split arbitrarily.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, StreamFailure>> + Send + 'static>>;

/// Shape of a successful `/ask` response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyShape {
    /// Newline-delimited event frames.
    EventStream,
    /// One `{answer, sources}` object delivered when the exchange completes.
    SingleAnswer,
}

impl BodyShape {
    /// Decides the body shape from the response `Content-Type`.
    ///
    /// Only an exact `application/json` media type selects the single-answer
    /// form; anything else, including a missing header, is read as frames.
    pub fn sniff(content_type: Option<&str>) -> Self {
        let media_type = content_type
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase());
        match media_type.as_deref() {
            Some("application/json") => Self::SingleAnswer,
            _ => Self::EventStream,
        }
    }
}

/// Successful `/ask` response, decided once per exchange.
pub enum AskBody {
    EventStream(ByteStream),
    SingleAnswer(AskAnswer),
}

impl std::fmt::Debug for AskBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventStream(_) => f.write_str("AskBody::EventStream(..)"),
            Self::SingleAnswer(answer) => f.debug_tuple("AskBody::SingleAnswer").field(answer).finish(),
        }
    }
}

/// Issues `/ask` requests for stream sessions.
#[async_trait::async_trait]
pub trait AskTransport: Send + Sync {
    /// Sends the question and returns once the response status is known.
    ///
    /// Non-success statuses and connection failures are returned as errors
    /// before any body is read.
    async fn ask(&self, request: AskRequest) -> Result<AskBody, StreamFailure>;
}
