//! Stack wrapper carrying a stasher
//!
//! [`Instrumented`] implements [`NetworkStack`] by delegating to the wrapped
//! stack. Its service tick runs the inner tick first, so messages that
//! arrive during the tick are classified in that same tick, and then lets
//! the stasher release whatever is due before the consumer reads the queue.

use crate::delay::DelayHandle;
use crate::stasher::Stasher;
use async_trait::async_trait;
use plexus_stack::{InboundQueue, NetworkStack, Remote, StackResult};
use std::time::Duration;
use tokio::time::Instant;

/// A stack with delay injection on its inbound queue
#[derive(Debug)]
pub struct Instrumented<S> {
    inner: S,
    stasher: Stasher,
}

impl<S: NetworkStack> Instrumented<S> {
    /// Wrap `inner` with an empty set of delay rules
    pub fn new(inner: S) -> Self {
        let stasher = Stasher::new(format!("TestStack~{}", inner.name()));
        Self { inner, stasher }
    }

    /// Delay messages from `sender`, optionally only those of `kind`
    pub fn set_delay(&mut self, sender: impl Into<String>, delay: Duration, kind: Option<&str>) {
        self.stasher.set_delay(sender, delay, kind);
    }

    /// Drop every delay rule
    pub fn reset_delays(&mut self) {
        self.stasher.reset_delays();
    }

    /// Handle for changing delays after the stack has been handed off
    pub fn delays(&self) -> DelayHandle {
        self.stasher.delays()
    }

    /// The interceptor state
    pub fn stasher(&self) -> &Stasher {
        &self.stasher
    }

    /// Mutable interceptor state
    pub fn stasher_mut(&mut self) -> &mut Stasher {
        &mut self.stasher
    }

    /// Deliver every held message at the next read
    pub fn release_all(&mut self) -> usize {
        self.stasher.release_all(self.inner.inbound_mut())
    }

    /// The wrapped stack
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The wrapped stack, mutably
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap, dropping any held messages
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: NetworkStack> NetworkStack for Instrumented<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn service(&mut self, now: Instant) -> StackResult<usize> {
        let received = self.inner.service(now).await?;
        self.stasher.tick(now, self.inner.inbound_mut());
        Ok(received)
    }

    fn inbound(&self) -> &InboundQueue {
        self.inner.inbound()
    }

    fn inbound_mut(&mut self) -> &mut InboundQueue {
        self.inner.inbound_mut()
    }

    fn remotes(&self) -> Vec<&Remote> {
        self.inner.remotes()
    }

    fn remote(&self, name: &str) -> Option<&Remote> {
        self.inner.remote(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_stack::{Envelope, MemoryStack, TransportVariant};

    #[tokio::test(start_paused = true)]
    async fn test_service_classifies_in_arrival_tick() {
        let stack = MemoryStack::new("Alpha", TransportVariant::Handshake);
        let link = stack.link();
        let mut stack = Instrumented::new(stack);
        stack.set_delay("Beta", Duration::from_secs(1), Some("PREPARE"));

        link.deliver(Envelope::new("Beta", vec![1]).with_kind("PREPARE")).unwrap();
        link.deliver(Envelope::new("Beta", vec![2]).with_kind("COMMIT")).unwrap();
        let start = Instant::now();
        assert_eq!(stack.service(start).await.unwrap(), 2);

        assert_eq!(stack.inbound().len(), 1);
        assert_eq!(stack.inbound().fresh_len(), 0);
        assert_eq!(stack.stasher().held_count(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        stack.service(Instant::now()).await.unwrap();
        let kinds: Vec<_> = stack
            .inbound_mut()
            .drain()
            .into_iter()
            .filter_map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec!["PREPARE".to_string(), "COMMIT".to_string()]);
    }

    #[tokio::test]
    async fn test_stasher_named_after_stack() {
        let stack = Instrumented::new(MemoryStack::new("Alpha", TransportVariant::Socket));
        assert_eq!(stack.stasher().name(), "TestStack~Alpha");
        assert_eq!(stack.name(), "Alpha");
    }

    #[tokio::test]
    async fn test_delay_handle_reaches_stasher() {
        let stack = MemoryStack::new("Alpha", TransportVariant::Handshake);
        let link = stack.link();
        let mut stack = Instrumented::new(stack);
        let delays = stack.delays();

        delays.set_delay("Gamma", Duration::from_secs(30), None);
        link.deliver(Envelope::new("Gamma", vec![1])).unwrap();
        stack.service(Instant::now()).await.unwrap();
        assert_eq!(stack.stasher().held_count(), 1);

        assert_eq!(stack.release_all(), 1);
        assert_eq!(stack.inbound().len(), 1);
    }
}
