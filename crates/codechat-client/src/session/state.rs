use std::fmt;

/// Lifecycle of a stream session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SessionState {
    Idle,
    /// Request sent, response status not known yet.
    Requesting,
    /// Response accepted, events arriving.
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

/// Input driving a `SessionState` transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    /// `start(question)` issued the request.
    Start,
    /// The response arrived with a success status.
    ResponseAccepted,
    /// A `sources` or `content` event was delivered.
    Event,
    /// `done` event or a clean end of the body.
    Finish,
    /// Server error, in-band `error` event, or transport failure.
    Fail,
    /// Caller cancellation.
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition {input:?} from {from}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub input: Transition,
}

impl SessionState {
    /// Completed, Failed and Cancelled never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a request is outstanding and cancellation still applies.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Requesting | Self::Streaming)
    }

    /// Pure transition function of the session state machine.
    pub fn apply(self, input: Transition) -> Result<SessionState, InvalidTransition> {
        use SessionState::*;
        use Transition::*;

        let next = match (self, input) {
            (Idle, Start) => Requesting,
            (Requesting, ResponseAccepted) => Streaming,
            (Requesting, Fail) => Failed,
            (Streaming, Event) => Streaming,
            (Streaming, Finish) => Completed,
            (Streaming, Fail) => Failed,
            (Requesting | Streaming, Cancel) => Cancelled,
            (from, input) => return Err(InvalidTransition { from, input }),
        };
        Ok(next)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}
