//! Plexus network stack interface
//!
//! Capability surface of a node's network stack as seen by test
//! instrumentation: the periodic service routine, the inbound message queue,
//! the remote-peer table and the node registry. Connection establishment and
//! wire encoding live in the concrete transports and are not part of this
//! crate.
//!
//! [`MemoryStack`] is an in-process implementation with no networking, used
//! to drive the instrumentation in tests.

pub mod address;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod remote;
pub mod stack;

pub use address::{HostAddress, NodeRegistry};
pub use envelope::{Envelope, InboundQueue};
pub use error::{StackError, StackResult};
pub use memory::{MemoryLink, MemoryStack};
pub use remote::{LinkStatus, Remote, StateField, TransportVariant};
pub use stack::NetworkStack;
