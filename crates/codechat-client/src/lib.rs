//! Streaming answer client for a codebase question-answering service.
//!
//! A question about an indexed repository is sent to `POST /ask`; the answer
//! arrives as newline-delimited JSON events (`sources`, `content`, `done`,
//! `error`). This crate decodes that stream incrementally, runs each exchange
//! as a cancellable [`StreamSession`], and folds the events into an ordered
//! [`Transcript`] through a [`Conversation`].
//!
//! # Asking a question
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use codechat_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ChatError> {
//! let transport = Arc::new(HttpTransport::new(ClientConfig::new("http://localhost:8000"))?);
//! let mut chat = Conversation::new(transport, Repository::ready("my-repo"));
//!
//! chat.submit("What does main do?").await?;
//! while let Some(update) = chat.next_update().await {
//!     if let TranscriptUpdate::Delta { delta, .. } = update {
//!         print!("{delta}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Wire types of the service endpoints.
pub mod api;
/// Reconciles session events into a transcript.
pub mod conversation;
/// Public error types.
pub mod errors;
/// Transcript messages and aggregated answers.
pub mod message;
/// Repository identity, status and session options.
pub mod model;
/// Tracing subscriber setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Frame decoding and event parsing for answer streams.
pub mod protocol;
/// Single question/answer exchange with cancellation.
pub mod session;
/// Ordered conversation history.
pub mod transcript;
/// HTTP transport and the seam sessions are driven through.
pub mod transport;

pub use api::{AnalyzeResponse, AskAnswer, AskRequest, DeleteResponse};
pub use conversation::{Conversation, TranscriptUpdate};
pub use errors::{ChatError, ProtocolError, StreamFailure};
pub use message::{Answer, Message, MessageId, MessageStatus, Role};
pub use model::{Repository, RepositoryId, RepositoryStatus, SessionOptions};
pub use observability::init_observability;
pub use protocol::{FrameDecoder, StreamEvent};
pub use session::{AbortHandle, SessionEvent, SessionState, SessionStream, StreamSession};
pub use transcript::Transcript;
pub use transport::{AskBody, AskTransport, ClientConfig, HttpTransport};
