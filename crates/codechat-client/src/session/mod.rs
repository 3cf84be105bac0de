//! One question/answer exchange with the analysis service.
//!
//! A session runs as a spawned task that owns the response body and the frame
//! decoder. Events reach the consumer in frame order through a bounded
//! channel; cancellation is checked before every delivered event.
#[cfg(test)]
mod proptests;
mod state;

use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt as _;
use futures::stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use state::{InvalidTransition, SessionState, Transition};

use crate::api::{AskAnswer, AskRequest};
use crate::errors::{ChatError, StreamFailure};
use crate::message::Answer;
use crate::model::{RepositoryId, SessionOptions};
use crate::protocol::{StreamEvent, event_stream};
use crate::transport::{AskBody, AskTransport};

type EventStream =
    Pin<Box<dyn futures::Stream<Item = Result<StreamEvent, StreamFailure>> + Send + 'static>>;

/// Handle used to request cancellation of a session.
///
/// Cloneable and usable from any task; it does not keep the session alive.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Requests cancellation. No event is delivered after this returns.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Event delivered by a running session, in stream order.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The response arrived with a success status.
    Streaming,
    /// Source list for the answer; a later one replaces an earlier one.
    Sources(Vec<String>),
    /// Answer text to append.
    Content { seq: u64, delta: String },
    /// Terminal success with the aggregated answer.
    Completed(Answer),
    /// Terminal failure. `content_events == 0` means no partial answer exists.
    Failed {
        error: StreamFailure,
        content_events: u64,
    },
    /// Terminal cancellation.
    Cancelled,
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::Failed { .. } | Self::Cancelled
        )
    }
}

/// Builder for a single question/answer exchange.
pub struct StreamSession {
    transport: Arc<dyn AskTransport>,
    repo_id: RepositoryId,
    question: String,
    options: SessionOptions,
}

impl StreamSession {
    pub fn new(
        transport: Arc<dyn AskTransport>,
        repo_id: impl Into<RepositoryId>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            repo_id: repo_id.into(),
            question: question.into(),
            options: SessionOptions::default(),
        }
    }

    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the builder, issues the request and returns the consumer
    /// side of the session in the `Requesting` state.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(self) -> Result<SessionStream, ChatError> {
        if self.repo_id.as_str().trim().is_empty() {
            return Err(ChatError::Validation("repo_id must not be empty".into()));
        }
        if self.question.trim().is_empty() {
            return Err(ChatError::Validation("question must not be empty".into()));
        }
        if self.options.event_buffer_capacity == 0 {
            return Err(ChatError::Validation(
                "event_buffer_capacity must be greater than 0".into(),
            ));
        }

        let session_id = uuid::Uuid::new_v4();
        let state = SessionState::Idle
            .apply(Transition::Start)
            .map_err(|e| ChatError::protocol_msg(e.to_string()))?;
        let (tx, rx) = mpsc::channel(self.options.event_buffer_capacity);
        let abort_handle = AbortHandle::new();
        let request = AskRequest {
            repo_id: self.repo_id,
            question: self.question,
        };
        info!(session_id = %session_id, repo_id = %request.repo_id, "starting answer stream");

        let task = tokio::spawn(session_task(
            session_id,
            self.transport,
            request,
            self.options,
            tx,
            abort_handle.clone(),
        ));
        let abort_rx = abort_handle.subscribe();

        Ok(SessionStream {
            session_id,
            state,
            rx: Some(rx),
            abort_rx,
            abort_handle,
            task: Some(task),
            content_events: 0,
        })
    }

    /// Runs the exchange to completion and returns the aggregated answer.
    pub async fn collect_answer(self) -> Result<Answer, ChatError> {
        self.start().await?.finish().await
    }
}

/// Consumer side of a running session.
pub struct SessionStream {
    session_id: uuid::Uuid,
    state: SessionState,
    rx: Option<mpsc::Receiver<SessionEvent>>,
    abort_rx: watch::Receiver<bool>,
    abort_handle: AbortHandle,
    task: Option<JoinHandle<()>>,
    content_events: u64,
}

enum Pulled {
    Aborted,
    Event(Option<SessionEvent>),
}

impl SessionStream {
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of `content` events delivered so far.
    pub fn content_events(&self) -> u64 {
        self.content_events
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next event. Returns `None` once a terminal event has
    /// been delivered.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.state.is_terminal() {
            return None;
        }
        if self.abort_handle.is_aborted() {
            return Some(self.close_cancelled());
        }

        let pulled = {
            let rx = self.rx.as_mut()?;
            let abort_rx = &mut self.abort_rx;
            tokio::select! {
                biased;
                _ = aborted(abort_rx) => Pulled::Aborted,
                event = rx.recv() => Pulled::Event(event),
            }
        };

        match pulled {
            Pulled::Aborted => Some(self.close_cancelled()),
            Pulled::Event(_) if self.abort_handle.is_aborted() => Some(self.close_cancelled()),
            Pulled::Event(Some(event)) => {
                self.observe(&event);
                Some(event)
            }
            Pulled::Event(None) => {
                let error = StreamFailure::transport("session task ended without a terminal event");
                self.advance(Transition::Fail);
                self.release();
                Some(SessionEvent::Failed {
                    error,
                    content_events: self.content_events,
                })
            }
        }
    }

    /// Cancels the session synchronously: the task is aborted and the
    /// response body dropped. Returns `false` if it had already ended.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.abort_handle.abort();
        self.close_cancelled();
        true
    }

    /// Drains the session and returns the terminal result.
    pub async fn finish(mut self) -> Result<Answer, ChatError> {
        while let Some(event) = self.next_event().await {
            match event {
                SessionEvent::Completed(answer) => return Ok(answer),
                SessionEvent::Failed { error, .. } => return Err(ChatError::Failed(error)),
                SessionEvent::Cancelled => return Err(ChatError::Failed(StreamFailure::Cancelled)),
                _ => {}
            }
        }
        Err(ChatError::protocol_msg(format!(
            "session {} already ended (state: {})",
            self.session_id, self.state
        )))
    }

    fn observe(&mut self, event: &SessionEvent) {
        let input = match event {
            SessionEvent::Streaming => Transition::ResponseAccepted,
            SessionEvent::Sources(_) => Transition::Event,
            SessionEvent::Content { .. } => {
                self.content_events += 1;
                Transition::Event
            }
            SessionEvent::Completed(_) => Transition::Finish,
            SessionEvent::Failed { .. } => Transition::Fail,
            SessionEvent::Cancelled => Transition::Cancel,
        };
        self.advance(input);
        if event.is_terminal() {
            self.release();
        }
    }

    fn close_cancelled(&mut self) -> SessionEvent {
        self.release();
        self.advance(Transition::Cancel);
        info!(session_id = %self.session_id, "answer stream cancelled");
        SessionEvent::Cancelled
    }

    fn advance(&mut self, input: Transition) {
        match self.state.apply(input) {
            Ok(next) => self.state = next,
            Err(err) => warn!(session_id = %self.session_id, error = %err, "ignoring session transition"),
        }
    }

    /// Drops the receiver and aborts the task, releasing the connection.
    fn release(&mut self) {
        self.rx = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn aborted(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn deadline_elapsed(deadline: Option<std::time::Duration>) {
    match deadline {
        Some(deadline) => tokio::time::sleep(deadline).await,
        None => std::future::pending().await,
    }
}

enum Step<T> {
    Aborted,
    DeadlineElapsed,
    Ready(T),
}

/// Cancellation sources every await of a session task is raced against.
struct Interrupts {
    session_id: uuid::Uuid,
    abort_handle: AbortHandle,
    abort_rx: watch::Receiver<bool>,
    deadline: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl Interrupts {
    /// Polls `fut` unless the session is aborted or its deadline passes
    /// first. `None` means the task must stop; an elapsed deadline also
    /// raises the abort flag so the consumer reports `Cancelled`.
    async fn race<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        let step = tokio::select! {
            biased;
            _ = aborted(&mut self.abort_rx) => Step::Aborted,
            _ = &mut self.deadline => Step::DeadlineElapsed,
            out = fut => Step::Ready(out),
        };
        match step {
            Step::Ready(out) => Some(out),
            Step::Aborted => None,
            Step::DeadlineElapsed => {
                info!(session_id = %self.session_id, "session deadline elapsed");
                self.abort_handle.abort();
                None
            }
        }
    }

    /// Delivers `event`, waiting for buffer space. Returns `false` when the
    /// task must stop.
    async fn send(&mut self, tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) -> bool {
        matches!(self.race(tx.send(event)).await, Some(Ok(())))
    }
}

async fn session_task(
    session_id: uuid::Uuid,
    transport: Arc<dyn AskTransport>,
    request: AskRequest,
    options: SessionOptions,
    tx: mpsc::Sender<SessionEvent>,
    abort_handle: AbortHandle,
) {
    let mut interrupts = Interrupts {
        session_id,
        abort_rx: abort_handle.subscribe(),
        abort_handle,
        deadline: Box::pin(deadline_elapsed(options.deadline)),
    };

    let Some(opened) = interrupts.race(transport.ask(request)).await else {
        return;
    };
    let body = match opened {
        Ok(body) => body,
        Err(error) => {
            info!(session_id = %session_id, error = %error, "answer request failed");
            let failed = SessionEvent::Failed {
                error,
                content_events: 0,
            };
            interrupts.send(&tx, failed).await;
            return;
        }
    };

    // Returning drops `events` and with it the response body.
    let mut events: EventStream = match body {
        AskBody::EventStream(bytes) => Box::pin(event_stream(bytes)),
        AskBody::SingleAnswer(answer) => single_answer_events(answer),
    };
    if !interrupts.send(&tx, SessionEvent::Streaming).await {
        return;
    }

    let mut seq = 0_u64;
    let mut answer = Answer::default();
    loop {
        let Some(next) = interrupts.race(events.next()).await else {
            return;
        };

        let (event, terminal) = match next {
            Some(Ok(StreamEvent::Sources(sources))) => {
                answer.sources = sources.clone();
                (SessionEvent::Sources(sources), false)
            }
            Some(Ok(StreamEvent::Content(delta))) => {
                if delta.is_empty() {
                    continue;
                }
                debug!(session_id = %session_id, seq, len = delta.len(), "answer delta");
                answer.text.push_str(&delta);
                let event = SessionEvent::Content { seq, delta };
                seq = seq.saturating_add(1);
                (event, false)
            }
            Some(Ok(StreamEvent::Done)) | None => {
                info!(session_id = %session_id, deltas = seq, "answer stream completed");
                (SessionEvent::Completed(std::mem::take(&mut answer)), true)
            }
            Some(Ok(StreamEvent::Error(message))) => {
                info!(session_id = %session_id, error = %message, "answer stream reported an error");
                let error = StreamFailure::server(None, message);
                (SessionEvent::Failed { error, content_events: seq }, true)
            }
            Some(Err(error)) => {
                info!(session_id = %session_id, error = %error, "answer stream failed");
                (SessionEvent::Failed { error, content_events: seq }, true)
            }
        };
        if !interrupts.send(&tx, event).await || terminal {
            return;
        }
    }
}

/// Normalises the single-answer fallback into the event sequence of a stream.
fn single_answer_events(answer: AskAnswer) -> EventStream {
    let events = vec![
        Ok(StreamEvent::Sources(answer.sources)),
        Ok(StreamEvent::Content(answer.answer)),
        Ok(StreamEvent::Done),
    ];
    Box::pin(stream::iter(events))
}
