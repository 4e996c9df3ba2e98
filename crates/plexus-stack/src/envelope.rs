//! Inbound messages and the consumer-visible queue

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A message received from a remote, as handed to the node's consumer
///
/// The payload is opaque at this layer. `kind` is the message type tag the
/// sender attached, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Name of the sending node
    pub sender: String,
    /// Message type tag
    pub kind: Option<String>,
    /// Opaque message body
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Untagged message from `sender`
    pub fn new(sender: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            sender: sender.into(),
            kind: None,
            payload: payload.into(),
        }
    }

    /// Tag the message with a kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// FIFO of received messages read by the node's consumer
///
/// The queue remembers how many messages at its tail arrived since the last
/// [`InboundQueue::take_fresh`]. Stack implementations add arrivals with
/// [`InboundQueue::push`]; anything an interceptor puts back is not fresh and
/// is never classified twice.
#[derive(Debug, Clone, Default)]
pub struct InboundQueue {
    items: VecDeque<Envelope>,
    fresh: usize,
}

impl InboundQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message that just arrived from the wire
    pub fn push(&mut self, envelope: Envelope) {
        self.items.push_back(envelope);
        self.fresh += 1;
    }

    /// Append a message that has already been classified
    ///
    /// Goes after every classified message but ahead of unclassified
    /// arrivals, which always stay at the tail.
    pub fn push_classified(&mut self, envelope: Envelope) {
        let at = self.items.len() - self.fresh;
        self.items.insert(at, envelope);
    }

    /// Put released messages at the head of the queue, keeping their order
    pub fn push_front_released<I>(&mut self, released: I)
    where
        I: IntoIterator<Item = Envelope>,
        I::IntoIter: DoubleEndedIterator,
    {
        for envelope in released.into_iter().rev() {
            self.items.push_front(envelope);
        }
    }

    /// Remove and return the messages that arrived since the last call
    pub fn take_fresh(&mut self) -> Vec<Envelope> {
        let split = self.items.len() - self.fresh;
        self.fresh = 0;
        self.items.split_off(split).into()
    }

    /// Number of arrivals not yet seen by [`InboundQueue::take_fresh`]
    pub fn fresh_len(&self) -> usize {
        self.fresh
    }

    /// Consume the next message
    pub fn pop(&mut self) -> Option<Envelope> {
        let envelope = self.items.pop_front()?;
        // Fresh items sit at the tail; a pop can only reach them once the
        // classified prefix is gone.
        self.fresh = self.fresh.min(self.items.len());
        Some(envelope)
    }

    /// Consume every queued message
    pub fn drain(&mut self) -> Vec<Envelope> {
        self.fresh = 0;
        self.items.drain(..).collect()
    }

    /// Queued messages, head first
    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.items.iter()
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
