//! Stack capability trait

use crate::envelope::InboundQueue;
use crate::error::StackResult;
use crate::remote::Remote;
use async_trait::async_trait;
use tokio::time::Instant;

/// Network stack of one node, driven by an external scheduler
///
/// The scheduler calls [`NetworkStack::service`] once per tick. A service
/// call may suspend on I/O; everything else is synchronous and reads the
/// stack's current view.
#[async_trait]
pub trait NetworkStack: Send + Sync {
    /// Name of the node owning this stack
    fn name(&self) -> &str;

    /// Perform one unit of periodic work at `now`
    ///
    /// Returns the number of messages moved onto the inbound queue.
    async fn service(&mut self, now: Instant) -> StackResult<usize>;

    /// Messages waiting for the node's consumer
    fn inbound(&self) -> &InboundQueue;

    /// Mutable access for interceptors and the consumer
    fn inbound_mut(&mut self) -> &mut InboundQueue;

    /// Every remote the stack currently tracks
    fn remotes(&self) -> Vec<&Remote>;

    /// Look up a remote by name
    fn remote(&self, name: &str) -> Option<&Remote> {
        self.remotes().into_iter().find(|remote| remote.name == name)
    }
}

#[async_trait]
impl<S: NetworkStack + ?Sized> NetworkStack for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn service(&mut self, now: Instant) -> StackResult<usize> {
        (**self).service(now).await
    }

    fn inbound(&self) -> &InboundQueue {
        (**self).inbound()
    }

    fn inbound_mut(&mut self) -> &mut InboundQueue {
        (**self).inbound_mut()
    }

    fn remotes(&self) -> Vec<&Remote> {
        (**self).remotes()
    }

    fn remote(&self, name: &str) -> Option<&Remote> {
        (**self).remote(name)
    }
}
