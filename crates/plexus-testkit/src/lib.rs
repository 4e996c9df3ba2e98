//! Plexus Test Instrumentation
//!
//! Tooling for tests that run several plexus nodes in one process:
//!
//! - a delay interceptor ([`Instrumented`], [`Stasher`]) that holds back
//!   inbound messages by sender and kind and releases them once their delay
//!   has passed
//! - stack composition ([`StackBlueprint`], [`attach_interceptor`]) that
//!   places the interceptor directly above the base transport of an existing
//!   layer chain
//! - connectivity states and checks ([`ConnectivityState`], [`check_state`],
//!   [`StackTester`]) that poll until a node has converged on its peers
//!
//! # Usage
//!
//! ```rust,no_run
//! use plexus_testkit::*;
//! use std::time::Duration;
//! use tokio::sync::RwLock;
//!
//! # async fn demo() -> TestkitResult<()> {
//! init_test_logging();
//! let registry: NodeRegistry = [
//!     ("Alpha", HostAddress::new("host1", 7001)),
//!     ("Beta", HostAddress::new("host2", 7002)),
//! ]
//! .into_iter()
//! .collect();
//!
//! let mut stack = Instrumented::new(MemoryStack::new("Alpha", active_transport()));
//! stack.set_delay("Beta", Duration::from_secs(2), Some("PREPARE"));
//!
//! let stack = RwLock::new(stack);
//! StackTester::new(registry)
//!     .ensure_connected_to_nodes(&stack, None)
//!     .await
//! # }
//! ```

pub mod blueprint;
pub mod config;
pub mod delay;
pub mod error;
pub mod instrumented;
pub mod logging;
pub mod poll;
pub mod stasher;
pub mod state;
pub mod tester;

pub use blueprint::{attach_interceptor, AssembledStack, Layer, StackBlueprint};
pub use config::{active, active_transport, install, TesterConfig, TRANSPORT_ENV};
pub use delay::{DelayHandle, DelayRules};
pub use error::{FieldMismatch, TestkitError, TestkitResult};
pub use instrumented::Instrumented;
pub use logging::{init_test_logging, LOG_ENV};
pub use poll::{eventually, PollPolicy};
pub use stasher::{PendingMessage, Stasher};
pub use state::{canonical, check_remote_exists, check_state, ConnectivityState, Expectation};
pub use tester::StackTester;

// Stack interface used throughout the instrumentation
pub use plexus_stack::{
    Envelope, HostAddress, InboundQueue, LinkStatus, MemoryLink, MemoryStack, NetworkStack,
    NodeRegistry, Remote, StackError, TransportVariant,
};
