//! Ordered conversation history with at most one exchange in flight.

use tracing::debug;

use crate::errors::ChatError;
use crate::message::{Message, MessageId, MessageStatus};

#[derive(Clone, Debug)]
struct PendingExchange {
    user: Message,
    reply: Message,
}

/// Committed messages plus the user/assistant pair of the in-flight exchange.
///
/// Committed messages are never reordered or removed; the pending pair is
/// either committed at its tail or discarded as a unit.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    committed: Vec<Message>,
    pending: Option<PendingExchange>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.committed.len() + if self.pending.is_some() { 2 } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages in display order, including the in-flight pair.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.committed.iter().chain(
            self.pending
                .iter()
                .flat_map(|pending| [&pending.user, &pending.reply]),
        )
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.iter().find(|message| message.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        match &self.pending {
            Some(pending) => Some(&pending.reply),
            None => self.committed.last(),
        }
    }

    /// The assistant reply currently receiving content.
    pub fn in_flight(&self) -> Option<&Message> {
        self.pending.as_ref().map(|pending| &pending.reply)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Appends a user message and its empty assistant reply.
    pub(crate) fn begin(&mut self, user: Message, reply: Message) -> Result<(), ChatError> {
        if self.pending.is_some() {
            return Err(ChatError::ExchangeInProgress);
        }
        if user.id == reply.id || self.committed.iter().any(|m| m.id == user.id || m.id == reply.id) {
            return Err(ChatError::protocol_msg("message id already present in transcript"));
        }
        debug!(user_id = %user.id, reply_id = %reply.id, "exchange started");
        self.pending = Some(PendingExchange { user, reply });
        Ok(())
    }

    /// Appends `delta` to the in-flight reply. Returns its id, or `None` when
    /// nothing is in flight.
    pub(crate) fn append_in_flight(&mut self, delta: &str) -> Option<MessageId> {
        let pending = self.pending.as_mut()?;
        pending.reply.append(delta);
        Some(pending.reply.id)
    }

    /// Replaces the sources of the in-flight reply.
    pub(crate) fn set_in_flight_sources(&mut self, sources: Vec<String>) -> Option<MessageId> {
        let pending = self.pending.as_mut()?;
        pending.reply.set_sources(sources);
        Some(pending.reply.id)
    }

    /// Freezes the in-flight reply with `status` and moves the pair into the
    /// committed history.
    pub(crate) fn commit(&mut self, status: MessageStatus) -> Option<MessageId> {
        let PendingExchange { user, mut reply } = self.pending.take()?;
        reply.freeze(status);
        let id = reply.id;
        self.committed.push(user);
        self.committed.push(reply);
        debug!(reply_id = %id, status = ?status, "exchange committed");
        Some(id)
    }

    /// Discards the in-flight pair. Returns whether one existed.
    pub(crate) fn rollback(&mut self) -> bool {
        let rolled_back = self.pending.take().is_some();
        if rolled_back {
            debug!("exchange rolled back");
        }
        rolled_back
    }
}
