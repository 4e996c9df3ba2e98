//! Inbound message stasher
//!
//! Sits between a stack and its consumer. Each tick it classifies the
//! messages that arrived on the inbound queue: messages without a delay stay
//! in place, delayed ones are held back and put at the head of the queue at
//! the first tick on or after their release deadline. A message's deadline is
//! fixed when it is classified and never moves. A delay too large to be
//! represented as a deadline holds the message until it is released
//! explicitly.

use crate::delay::DelayHandle;
use plexus_stack::{Envelope, InboundQueue};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// A message held back by the stasher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// The held message
    pub envelope: Envelope,
    /// When the message was classified
    pub arrived_at: Instant,
    /// Earliest release; `None` holds the message until [`Stasher::release_all`]
    pub release_after: Option<Instant>,
}

impl PendingMessage {
    /// Whether the message may be released at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.release_after.is_some_and(|deadline| deadline <= now)
    }
}

/// Delay interceptor for one stack's inbound queue
#[derive(Debug)]
pub struct Stasher {
    name: String,
    rules: DelayHandle,
    held: VecDeque<PendingMessage>,
}

impl Stasher {
    /// Stasher with no delay rules
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: DelayHandle::new(),
            held: VecDeque::new(),
        }
    }

    /// Name used in log events
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to this stasher's delay rules
    pub fn delays(&self) -> DelayHandle {
        self.rules.clone()
    }

    /// Delay messages from `sender`, optionally only those of `kind`
    pub fn set_delay(&mut self, sender: impl Into<String>, delay: Duration, kind: Option<&str>) {
        self.rules.set_delay(sender, delay, kind);
    }

    /// Drop every delay rule; messages already held keep their deadlines
    pub fn reset_delays(&mut self) {
        debug!(stasher = %self.name, "resetting delays");
        self.rules.clear_delays();
    }

    /// Classify one arriving message
    ///
    /// Unclassified arrivals already on `queue` are classified first, so
    /// `envelope` is ordered after them.
    pub fn on_message_arrived(&mut self, envelope: Envelope, now: Instant, queue: &mut InboundQueue) {
        self.classify_fresh(now, queue);
        self.classify(envelope, now, queue);
    }

    fn classify_fresh(&mut self, now: Instant, queue: &mut InboundQueue) {
        for envelope in queue.take_fresh() {
            self.classify(envelope, now, queue);
        }
    }

    fn classify(&mut self, envelope: Envelope, now: Instant, queue: &mut InboundQueue) {
        let delay = self.rules.delay_for_envelope(&envelope);
        if delay.is_zero() {
            queue.push_classified(envelope);
            return;
        }

        debug!(
            stasher = %self.name,
            sender = %envelope.sender,
            kind = envelope.kind.as_deref().unwrap_or("-"),
            delay_ms = delay.as_millis() as u64,
            "stashing message"
        );
        self.held.push_back(PendingMessage {
            envelope,
            arrived_at: now,
            release_after: now.checked_add(delay),
        });
    }

    /// Classify fresh arrivals, then release everything that is due
    ///
    /// Runs to completion without suspending.
    pub fn tick(&mut self, now: Instant, queue: &mut InboundQueue) {
        self.classify_fresh(now, queue);
        self.release_due(now, queue);
    }

    fn release_due(&mut self, now: Instant, queue: &mut InboundQueue) {
        if self.held.is_empty() {
            return;
        }

        let (due, waiting): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut self.held)
            .into_iter()
            .partition(|pending| pending.is_due(now));
        self.held = waiting;

        if !due.is_empty() {
            trace!(stasher = %self.name, released = due.len(), held = self.held.len(), "releasing messages");
            queue.push_front_released(due.into_iter().map(|pending| pending.envelope).collect::<Vec<_>>());
        }
    }

    /// Release every held message regardless of its deadline
    pub fn release_all(&mut self, queue: &mut InboundQueue) -> usize {
        let released: Vec<_> = self.held.drain(..).map(|pending| pending.envelope).collect();
        let count = released.len();
        queue.push_front_released(released);
        count
    }

    /// Drop held messages from `sender` without delivering them
    pub fn discard_from(&mut self, sender: &str) -> usize {
        let before = self.held.len();
        self.held.retain(|pending| pending.envelope.sender != sender);
        let discarded = before - self.held.len();
        if discarded > 0 {
            debug!(stasher = %self.name, %sender, discarded, "discarded held messages");
        }
        discarded
    }

    /// Messages currently held, in arrival order
    pub fn held(&self) -> impl Iterator<Item = &PendingMessage> {
        self.held.iter()
    }

    /// Number of messages currently held
    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}
