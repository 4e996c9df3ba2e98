//! In-memory stack implementation
//!
//! Messages are delivered through a [`MemoryLink`] and become visible on the
//! inbound queue at the next service tick, the way a socket-backed stack
//! picks up buffered reads. Remotes are managed directly by the test.

use crate::address::HostAddress;
use crate::envelope::{Envelope, InboundQueue};
use crate::error::{StackError, StackResult};
use crate::remote::{LinkStatus, Remote, TransportVariant};
use crate::stack::NetworkStack;
use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

/// Sending side of a [`MemoryStack`]'s wire
#[derive(Debug, Clone)]
pub struct MemoryLink {
    stack: String,
    sender: mpsc::UnboundedSender<Envelope>,
}

impl MemoryLink {
    /// Put a message on the wire; it is picked up at the next service tick
    pub fn deliver(&self, envelope: Envelope) -> StackResult<()> {
        self.sender.send(envelope).map_err(|_| StackError::Closed {
            stack: self.stack.clone(),
        })
    }
}

/// Stack with an in-process wire and a test-managed remote table
#[derive(Debug)]
pub struct MemoryStack {
    name: String,
    variant: TransportVariant,
    inbound: InboundQueue,
    remotes: BTreeMap<String, Remote>,
    sender: mpsc::UnboundedSender<Envelope>,
    wire: mpsc::UnboundedReceiver<Envelope>,
    closed: bool,
}

impl MemoryStack {
    /// Open stack with no remotes
    pub fn new(name: impl Into<String>, variant: TransportVariant) -> Self {
        let (sender, wire) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            variant,
            inbound: InboundQueue::new(),
            remotes: BTreeMap::new(),
            sender,
            wire,
            closed: false,
        }
    }

    /// Transport whose link attributes the remotes carry
    pub fn variant(&self) -> TransportVariant {
        self.variant
    }

    /// Handle for delivering messages to this stack
    pub fn link(&self) -> MemoryLink {
        MemoryLink {
            stack: self.name.clone(),
            sender: self.sender.clone(),
        }
    }

    /// Track a remote with no link attributes reported yet
    pub fn add_remote(&mut self, name: impl Into<String>, address: HostAddress) -> &mut Remote {
        let name = name.into();
        let remote = Remote::new(name.clone(), address, LinkStatus::unknown(self.variant));
        match self.remotes.entry(name) {
            Entry::Occupied(mut entry) => {
                entry.insert(remote);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(remote),
        }
    }

    /// Insert or replace a remote
    pub fn upsert_remote(&mut self, remote: Remote) {
        self.remotes.insert(remote.name.clone(), remote);
    }

    /// Mutable access to a tracked remote
    pub fn remote_mut(&mut self, name: &str) -> Option<&mut Remote> {
        self.remotes.get_mut(name)
    }

    /// Stop tracking a remote
    pub fn remove_remote(&mut self, name: &str) -> Option<Remote> {
        self.remotes.remove(name)
    }

    /// Stop servicing; later ticks fail with [`StackError::Closed`]
    pub fn shutdown(&mut self) {
        self.closed = true;
        self.wire.close();
    }
}

#[async_trait]
impl NetworkStack for MemoryStack {
    fn name(&self) -> &str {
        &self.name
    }

    async fn service(&mut self, _now: Instant) -> StackResult<usize> {
        if self.closed {
            return Err(StackError::Closed {
                stack: self.name.clone(),
            });
        }

        let mut received = 0;
        while let Ok(envelope) = self.wire.try_recv() {
            trace!(stack = %self.name, sender = %envelope.sender, "received message");
            self.inbound.push(envelope);
            received += 1;
        }
        Ok(received)
    }

    fn inbound(&self) -> &InboundQueue {
        &self.inbound
    }

    fn inbound_mut(&mut self) -> &mut InboundQueue {
        &mut self.inbound
    }

    fn remotes(&self) -> Vec<&Remote> {
        self.remotes.values().collect()
    }

    fn remote(&self, name: &str) -> Option<&Remote> {
        self.remotes.get(name)
    }
}
