//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, Answer, AskTransport, ChatError, ClientConfig, Conversation, HttpTransport,
    Message, MessageStatus, Repository, RepositoryStatus, Role, SessionEvent, SessionOptions,
    StreamFailure, StreamSession, TranscriptUpdate,
};
