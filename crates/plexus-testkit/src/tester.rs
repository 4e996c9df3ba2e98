//! Connectivity convergence checks
//!
//! [`StackTester`] compares a stack's remote table with the node registry.
//! A registry node counts as connected when some remote at its exact address
//! reports the connected state of the active transport. Each remote is
//! credited to at most one registry entry.

use crate::config::{self, TesterConfig};
use crate::error::{TestkitError, TestkitResult};
use crate::poll::{eventually, PollPolicy};
use crate::state::ConnectivityState;
use plexus_stack::{NetworkStack, NodeRegistry};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Connectivity assertions for one node against its registry
#[derive(Debug, Clone)]
pub struct StackTester {
    registry: NodeRegistry,
    config: TesterConfig,
}

impl StackTester {
    /// Tester using the process-wide configuration
    pub fn new(registry: NodeRegistry) -> Self {
        Self::with_config(registry, config::active().clone())
    }

    /// Tester with an explicit configuration
    pub fn with_config(registry: NodeRegistry, config: TesterConfig) -> Self {
        Self { registry, config }
    }

    /// Nodes the stack is expected to reach
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Polling and transport settings in use
    pub fn config(&self) -> &TesterConfig {
        &self.config
    }

    /// Check how many registry nodes `stack` is connected to
    ///
    /// With `expected` unset every registry node must be connected; an empty
    /// registry passes. With `expected` set the connected count must equal it
    /// exactly, which with `Some(0)` asserts full disconnection.
    pub fn check_if_connected_to<S>(&self, stack: &S, expected: Option<usize>) -> TestkitResult<()>
    where
        S: NetworkStack + ?Sized,
    {
        let connected_state = ConnectivityState::connected(self.config.transport);
        let remotes = stack.remotes();
        let mut credited = vec![false; remotes.len()];
        let mut connected = Vec::new();
        let mut missing = Vec::new();

        for (name, address) in self.registry.iter() {
            let hit = (0..remotes.len()).find(|&i| {
                let remote = remotes[i];
                !credited[i] && remote.address == *address && connected_state.matches(&remote.link)
            });
            match hit {
                Some(i) => {
                    credited[i] = true;
                    connected.push(name.to_string());
                }
                None => missing.push(name.to_string()),
            }
        }

        let stack_name = stack.name().to_string();
        match expected {
            None if connected.is_empty() && !missing.is_empty() => {
                Err(TestkitError::NotConnectedToAny {
                    stack: stack_name,
                    missing,
                })
            }
            None if !missing.is_empty() => Err(TestkitError::NotFullyConnected {
                stack: stack_name,
                connected,
                missing,
            }),
            None => Ok(()),
            Some(count) if connected.len() == count => Ok(()),
            Some(count) => Err(TestkitError::ConnectivityMismatch {
                subject: stack_name,
                detail: format!(
                    "expected {count} connected nodes, found {}: [{}]",
                    connected.len(),
                    connected.join(", ")
                ),
                fields: Vec::new(),
            }),
        }
    }

    /// Wait until `stack` is connected to every registry node
    ///
    /// Without a timeout the wait scales with the registry size. The stack
    /// is read-locked only while a check runs.
    pub async fn ensure_connected_to_nodes<S>(
        &self,
        stack: &RwLock<S>,
        timeout: Option<Duration>,
    ) -> TestkitResult<()>
    where
        S: NetworkStack,
    {
        let wait = timeout.unwrap_or_else(|| self.config.expected_wait(self.registry.len()));
        debug!(
            wait_ms = wait.as_millis() as u64,
            nodes = self.registry.len(),
            "waiting for connections to nodes"
        );
        self.poll(stack, None, wait).await
    }

    /// Wait until `stack` is connected to none of the registry nodes
    pub async fn ensure_disconnected_from_nodes<S>(
        &self,
        stack: &RwLock<S>,
        timeout: Duration,
    ) -> TestkitResult<()>
    where
        S: NetworkStack,
    {
        self.poll(stack, Some(0), timeout).await
    }

    async fn poll<S>(&self, stack: &RwLock<S>, expected: Option<usize>, timeout: Duration) -> TestkitResult<()>
    where
        S: NetworkStack,
    {
        let policy = PollPolicy::new(self.config.retry_wait(), timeout);
        let tester = self;
        eventually(policy, move || async move {
            let stack = stack.read().await;
            tester.check_if_connected_to(&*stack, expected)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_stack::{HostAddress, LinkStatus, MemoryStack, Remote, TransportVariant};

    const HANDSHAKE: TransportVariant = TransportVariant::Handshake;

    fn registry(nodes: &[(&str, &str, u16)]) -> NodeRegistry {
        nodes
            .iter()
            .map(|(name, host, port)| (*name, HostAddress::new(*host, *port)))
            .collect()
    }

    fn tester(nodes: &[(&str, &str, u16)]) -> StackTester {
        StackTester::with_config(registry(nodes), TesterConfig::for_transport(HANDSHAKE))
    }

    fn connect(stack: &mut MemoryStack, name: &str, host: &str, port: u16) {
        stack.upsert_remote(Remote::new(
            name,
            HostAddress::new(host, port),
            LinkStatus::established(HANDSHAKE),
        ));
    }

    const NODES: [(&str, &str, u16); 3] = [
        ("Beta", "host2", 7002),
        ("Gamma", "host3", 7003),
        ("Delta", "host4", 7004),
    ];

    #[test]
    fn test_fully_connected_passes() {
        let tester = tester(&NODES);
        let mut stack = MemoryStack::new("Alpha", HANDSHAKE);
        for (name, host, port) in NODES {
            connect(&mut stack, name, host, port);
        }
        assert!(tester.check_if_connected_to(&stack, None).is_ok());
        assert!(tester.check_if_connected_to(&stack, Some(3)).is_ok());
    }

    #[test]
    fn test_no_connections() {
        let tester = tester(&NODES);
        let stack = MemoryStack::new("Alpha", HANDSHAKE);

        let err = tester.check_if_connected_to(&stack, None).unwrap_err();
        assert!(matches!(err, TestkitError::NotConnectedToAny { ref missing, .. } if missing.len() == 3));
        assert!(tester.check_if_connected_to(&stack, Some(0)).is_ok());
    }

    #[test]
    fn test_partial_connections() {
        let tester = tester(&NODES);
        let mut stack = MemoryStack::new("Alpha", HANDSHAKE);
        connect(&mut stack, "Gamma", "host3", 7003);
        stack.add_remote("Beta", HostAddress::new("host2", 7002));

        let err = tester.check_if_connected_to(&stack, None).unwrap_err();
        assert_eq!(
            err,
            TestkitError::NotFullyConnected {
                stack: "Alpha".into(),
                connected: vec!["Gamma".into()],
                missing: vec!["Beta".into(), "Delta".into()],
            }
        );
        assert!(matches!(
            tester.check_if_connected_to(&stack, Some(0)),
            Err(TestkitError::ConnectivityMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_registry_passes() {
        let tester = tester(&[]);
        let stack = MemoryStack::new("Alpha", HANDSHAKE);
        assert!(tester.check_if_connected_to(&stack, None).is_ok());
    }

    #[test]
    fn test_address_must_match_exactly() {
        let tester = tester(&[("Beta", "host2", 7002)]);
        let mut stack = MemoryStack::new("Alpha", HANDSHAKE);
        connect(&mut stack, "Beta", "host2", 7102);
        assert!(tester.check_if_connected_to(&stack, None).is_err());
    }

    /// Two registry names sharing one address need two connected remotes.
    /// A single remote is never counted for both names.
    #[test]
    fn test_shared_address_needs_one_remote_per_registry_name() {
        let tester = tester(&[("Beta", "host2", 7002), ("BetaAlias", "host2", 7002)]);
        let mut stack = MemoryStack::new("Alpha", HANDSHAKE);
        connect(&mut stack, "Beta", "host2", 7002);

        let err = tester.check_if_connected_to(&stack, None).unwrap_err();
        assert!(matches!(err, TestkitError::NotFullyConnected { ref connected, .. } if connected.len() == 1));
    }

    #[test]
    fn test_half_open_link_is_not_connected() {
        let tester = tester(&[("Beta", "host2", 7002)]);
        let mut stack = MemoryStack::new("Alpha", HANDSHAKE);
        stack.upsert_remote(Remote::new(
            "Beta",
            HostAddress::new("host2", 7002),
            LinkStatus::Handshake {
                joined: Some(true),
                allowed: Some(true),
                alive: None,
            },
        ));
        assert!(tester.check_if_connected_to(&stack, None).is_err());
    }

    const SOCKET: TransportVariant = TransportVariant::Socket;

    fn socket_tester() -> StackTester {
        StackTester::with_config(registry(&NODES), TesterConfig::for_transport(SOCKET))
    }

    fn socket_remote(name: &str, host: &str, port: u16, is_connected: Option<bool>) -> Remote {
        Remote::new(name, HostAddress::new(host, port), LinkStatus::Socket { is_connected })
    }

    #[test]
    fn test_socket_fully_connected_passes() {
        let mut stack = MemoryStack::new("Alpha", SOCKET);
        for (name, host, port) in NODES {
            stack.upsert_remote(socket_remote(name, host, port, Some(true)));
        }
        assert!(socket_tester().check_if_connected_to(&stack, None).is_ok());
        assert!(socket_tester().check_if_connected_to(&stack, Some(3)).is_ok());
    }

    #[test]
    fn test_socket_partial_connections() {
        let mut stack = MemoryStack::new("Alpha", SOCKET);
        stack.upsert_remote(socket_remote("Beta", "host2", 7002, Some(true)));
        stack.upsert_remote(socket_remote("Gamma", "host3", 7003, Some(false)));
        stack.upsert_remote(socket_remote("Delta", "host4", 7004, None));

        let err = socket_tester().check_if_connected_to(&stack, None).unwrap_err();
        assert_eq!(
            err,
            TestkitError::NotFullyConnected {
                stack: "Alpha".into(),
                connected: vec!["Beta".into()],
                missing: vec!["Delta".into(), "Gamma".into()],
            }
        );
        assert!(socket_tester().check_if_connected_to(&stack, Some(1)).is_ok());
    }

    #[test]
    fn test_socket_disconnected_matches_zero() {
        let mut stack = MemoryStack::new("Alpha", SOCKET);
        for (name, host, port) in NODES {
            stack.upsert_remote(socket_remote(name, host, port, Some(false)));
        }
        assert!(socket_tester().check_if_connected_to(&stack, Some(0)).is_ok());
        assert!(matches!(
            socket_tester().check_if_connected_to(&stack, None),
            Err(TestkitError::NotConnectedToAny { .. })
        ));
    }

    #[test]
    fn test_handshake_remotes_never_count_under_socket() {
        let mut stack = MemoryStack::new("Alpha", HANDSHAKE);
        for (name, host, port) in NODES {
            connect(&mut stack, name, host, port);
        }
        assert!(socket_tester().check_if_connected_to(&stack, Some(0)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_disconnect_wait() {
        let mut stack = MemoryStack::new("Alpha", SOCKET);
        stack.upsert_remote(socket_remote("Beta", "host2", 7002, Some(true)));
        let stack = std::sync::Arc::new(RwLock::new(stack));

        let partition = {
            let stack = stack.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                stack.write().await.remove_remote("Beta");
            })
        };

        socket_tester()
            .ensure_disconnected_from_nodes(&*stack, Duration::MAX)
            .await
            .unwrap();
        partition.await.unwrap();
    }
}
