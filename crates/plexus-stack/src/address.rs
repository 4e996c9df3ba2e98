//! Host addresses and the node registry

use crate::error::StackError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Host and port of a node endpoint
///
/// Equality is exact on both parts; no name resolution is performed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostAddress {
    /// Host name or IP literal
    pub host: String,
    /// TCP/UDP port
    pub port: u16,
}

impl HostAddress {
    /// Address from its parts
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for HostAddress {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StackError::InvalidAddress {
            input: s.to_string(),
        };
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

impl From<(&str, u16)> for HostAddress {
    fn from((host, port): (&str, u16)) -> Self {
        Self::new(host, port)
    }
}

/// Mapping from node name to the address its stack listens on
///
/// The registry is populated by the node setup and read by the
/// instrumentation; nothing here mutates it after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, HostAddress>,
}

impl NodeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, replacing any previous address for the same name
    pub fn insert(&mut self, name: impl Into<String>, address: HostAddress) -> Option<HostAddress> {
        self.nodes.insert(name.into(), address)
    }

    /// Address of the node called `name`
    pub fn get(&self, name: &str) -> Option<&HostAddress> {
        self.nodes.get(name)
    }

    /// Nodes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostAddress)> {
        self.nodes.iter().map(|(name, addr)| (name.as_str(), addr))
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node is registered
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, HostAddress)> for NodeRegistry {
    fn from_iter<T: IntoIterator<Item = (N, HostAddress)>>(iter: T) -> Self {
        Self {
            nodes: iter
                .into_iter()
                .map(|(name, addr)| (name.into(), addr))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_address() {
        let addr: HostAddress = "10.0.0.7:9701".parse().unwrap();
        assert_eq!(addr, HostAddress::new("10.0.0.7", 9701));
        assert_eq!(addr.to_string(), "10.0.0.7:9701");
    }

    #[test]
    fn test_parse_rejects_missing_port() {
        assert!("localhost".parse::<HostAddress>().is_err());
        assert!("localhost:http".parse::<HostAddress>().is_err());
        assert!(":9701".parse::<HostAddress>().is_err());
    }

    #[test]
    fn test_registry_replaces_address() {
        let mut registry = NodeRegistry::new();
        assert!(registry.insert("Alpha", HostAddress::new("host1", 7001)).is_none());
        let previous = registry.insert("Alpha", HostAddress::new("host1", 7101));
        assert_eq!(previous, Some(HostAddress::new("host1", 7001)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Alpha").unwrap().port, 7101);
    }
}
