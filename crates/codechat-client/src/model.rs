use std::fmt;
use std::time::Duration;

/// Identifier of an indexed repository on the analysis service.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RepositoryId(pub String);

impl RepositoryId {
    /// Creates a repository id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the repository id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepositoryId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RepositoryId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Indexing status reported by the analysis service.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryStatus {
    /// Clone and indexing still running.
    Cloning,
    /// Indexed; questions can be asked.
    Ready,
    /// Indexing failed.
    Error,
}

impl fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cloning => "cloning",
            Self::Ready => "ready",
            Self::Error => "error",
        })
    }
}

/// Repository a conversation asks questions about.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub status: RepositoryStatus,
    /// Failure detail when `status` is `error`.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Repository {
    pub fn new(id: impl Into<RepositoryId>, status: RepositoryStatus) -> Self {
        Self {
            id: id.into(),
            status,
            error_message: None,
        }
    }

    /// Shorthand for a repository that is already indexed.
    pub fn ready(id: impl Into<RepositoryId>) -> Self {
        Self::new(id, RepositoryStatus::Ready)
    }

    pub fn is_ready(&self) -> bool {
        self.status == RepositoryStatus::Ready
    }
}

/// Per-session behavior options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SessionOptions {
    /// Bounded buffer between the session task and its consumer.
    pub event_buffer_capacity: usize,
    /// Cancels the session once elapsed. The core imposes no deadline itself.
    pub deadline: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            event_buffer_capacity: 128,
            deadline: None,
        }
    }
}

impl SessionOptions {
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn event_buffer_capacity(mut self, capacity: usize) -> Self {
        self.event_buffer_capacity = capacity;
        self
    }
}
