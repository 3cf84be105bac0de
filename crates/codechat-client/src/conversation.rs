//! Folds session events into a transcript.
//!
//! A [`Conversation`] owns the transcript of one repository and runs at most
//! one exchange at a time. Each call to [`Conversation::next_update`] applies
//! one session event and reports what changed.

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::ChatError;
use crate::message::{Message, MessageId, MessageStatus};
use crate::model::{Repository, RepositoryStatus, SessionOptions};
use crate::session::{AbortHandle, SessionEvent, SessionStream, StreamSession};
use crate::transcript::Transcript;
use crate::transport::AskTransport;

/// Change applied to the transcript by one session event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptUpdate {
    /// The service accepted the question.
    Streaming,
    Sources { message_id: MessageId },
    Delta { message_id: MessageId, delta: String },
    Completed { message_id: MessageId },
    /// The exchange failed. When `rolled_back` is false the partial reply was
    /// kept and marked failed.
    Failed { error: String, rolled_back: bool },
    /// The exchange was cancelled and removed from the transcript.
    Cancelled,
}

impl TranscriptUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }
}

pub struct Conversation {
    transport: Arc<dyn AskTransport>,
    repository: Repository,
    transcript: Transcript,
    options: SessionOptions,
    active: Option<SessionStream>,
    last_error: Option<String>,
}

impl Conversation {
    pub fn new(transport: Arc<dyn AskTransport>, repository: Repository) -> Self {
        Self {
            transport,
            repository,
            transcript: Transcript::new(),
            options: SessionOptions::default(),
            active: None,
            last_error: None,
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Updates the repository status, e.g. after polling the service.
    pub fn set_repository_status(&mut self, status: RepositoryStatus, error_message: Option<String>) {
        self.repository.status = status;
        self.repository.error_message = error_message;
    }

    /// Message of the last failed exchange, until dismissed or a new
    /// exchange starts.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn abort_handle(&self) -> Option<AbortHandle> {
        self.active.as_ref().map(SessionStream::abort_handle)
    }

    /// Starts an exchange for `question` and returns the id of the assistant
    /// reply that will receive the answer.
    ///
    /// Rejected without touching the transcript while another exchange is in
    /// flight, when the repository is not ready, or when the question is blank.
    pub async fn submit(&mut self, question: impl Into<String>) -> Result<MessageId, ChatError> {
        if self.active.is_some() || self.transcript.has_pending() {
            return Err(ChatError::ExchangeInProgress);
        }
        if !self.repository.is_ready() {
            return Err(ChatError::RepositoryNotReady {
                repo_id: self.repository.id.clone(),
                status: self.repository.status,
            });
        }
        let question = question.into();
        if question.trim().is_empty() {
            return Err(ChatError::Validation("question must not be empty".into()));
        }

        let session = StreamSession::new(
            self.transport.clone(),
            self.repository.id.clone(),
            question.clone(),
        )
        .options(self.options.clone())
        .start()
        .await?;

        let reply = Message::assistant_placeholder();
        let reply_id = reply.id;
        self.transcript.begin(Message::user(question), reply)?;
        self.last_error = None;
        info!(session_id = %session.session_id(), reply_id = %reply_id, "question submitted");
        self.active = Some(session);
        Ok(reply_id)
    }

    /// Applies the next session event to the transcript. Returns `None` when
    /// no exchange is in flight.
    pub async fn next_update(&mut self) -> Option<TranscriptUpdate> {
        let session = self.active.as_mut()?;
        let event = match session.next_event().await {
            Some(event) => event,
            None => {
                self.active = None;
                self.transcript.rollback();
                return None;
            }
        };

        let update = match event {
            SessionEvent::Streaming => TranscriptUpdate::Streaming,
            SessionEvent::Sources(sources) => {
                let message_id = self.transcript.set_in_flight_sources(sources)?;
                TranscriptUpdate::Sources { message_id }
            }
            SessionEvent::Content { delta, .. } => {
                let message_id = self.transcript.append_in_flight(&delta)?;
                TranscriptUpdate::Delta { message_id, delta }
            }
            SessionEvent::Completed(_) => {
                self.active = None;
                let message_id = self.transcript.commit(MessageStatus::Complete)?;
                TranscriptUpdate::Completed { message_id }
            }
            SessionEvent::Failed {
                error,
                content_events,
            } => {
                self.active = None;
                let rolled_back = content_events == 0;
                if rolled_back {
                    self.transcript.rollback();
                } else {
                    self.transcript.commit(MessageStatus::Failed);
                }
                let message = error.message().to_string();
                info!(error = %message, rolled_back, "exchange failed");
                self.last_error = Some(message.clone());
                TranscriptUpdate::Failed {
                    error: message,
                    rolled_back,
                }
            }
            SessionEvent::Cancelled => {
                self.active = None;
                self.transcript.rollback();
                TranscriptUpdate::Cancelled
            }
        };
        debug!(update = ?update, "transcript updated");
        Some(update)
    }

    /// Drives the in-flight exchange to its terminal update.
    pub async fn finish_exchange(&mut self) -> Option<TranscriptUpdate> {
        while let Some(update) = self.next_update().await {
            if update.is_terminal() {
                return Some(update);
            }
        }
        None
    }

    /// Cancels the in-flight exchange and discards it from the transcript.
    /// Returns `false` when nothing was in flight.
    pub fn cancel(&mut self) -> bool {
        let Some(mut session) = self.active.take() else {
            return false;
        };
        session.cancel();
        self.transcript.rollback();
        true
    }
}
