use crate::model::{RepositoryId, RepositoryStatus};

/// Reason a single stream frame was skipped by the event parser.
///
/// These never reach callers of the session API; they are logged and the
/// stream continues with the next frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Frame was not a JSON object, lacked a `type`, or carried `data` of the
    /// wrong shape for its type.
    #[error("malformed frame: {reason}")]
    Malformed { reason: String },
    /// Frame declared a `type` outside `sources|content|done|error`.
    #[error("unknown event type `{event_type}`")]
    UnknownType { event_type: String },
}

impl ProtocolError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Terminal failure of a stream session (and of collaborator requests).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum StreamFailure {
    /// Connection failed, the body could not be read, or it ended mid-frame.
    #[error("transport failure: {message}")]
    Transport { message: String },
    /// Non-success HTTP status or an in-band `error` event.
    #[error("server error: {message}")]
    Server {
        status_code: Option<u16>,
        message: String,
    },
    /// The caller cancelled the exchange.
    #[error("exchange cancelled")]
    Cancelled,
}

impl StreamFailure {
    /// Creates a transport-level failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a server-reported failure.
    pub fn server(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self::Server {
            status_code,
            message: message.into(),
        }
    }

    /// Returns the text suitable for showing to a user.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message } | Self::Server { message, .. } => message,
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns the HTTP status that caused the failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Server { status_code, .. } => *status_code,
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input (blank question, zero buffer capacity, ...).
    #[error("validation error: {0}")]
    Validation(String),
    /// `submit` was called while an exchange is still streaming.
    #[error("an exchange is already in progress")]
    ExchangeInProgress,
    /// The repository backing the conversation cannot answer questions yet.
    #[error("repository {repo_id} is not ready (status: {status})")]
    RepositoryNotReady {
        repo_id: RepositoryId,
        status: RepositoryStatus,
    },
    /// A request or exchange ended in a terminal failure.
    #[error(transparent)]
    Failed(StreamFailure),
    /// Internal invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ChatError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<StreamFailure> for ChatError {
    fn from(value: StreamFailure) -> Self {
        ChatError::Failed(value)
    }
}
