//! Remote peer handles
//!
//! A stack tracks one [`Remote`] per peer endpoint it knows about. Which link
//! attributes a remote exposes depends on the transport the process runs:
//! the handshake transport reports `joined`, `allowed` and `alive`, the
//! socket transport reports a single `is_connected` flag. The two shapes are
//! never mixed inside one process.

use crate::address::HostAddress;
use crate::error::StackError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transport family active for the whole process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportVariant {
    /// Three-phase handshake transport (joined / allowed / alive)
    #[default]
    Handshake,
    /// Socket transport with a single connected flag
    Socket,
}

impl TransportVariant {
    /// Link attributes exposed by remotes of this transport
    pub fn fields(self) -> &'static [StateField] {
        match self {
            TransportVariant::Handshake => {
                &[StateField::Joined, StateField::Allowed, StateField::Alive]
            }
            TransportVariant::Socket => &[StateField::IsConnected],
        }
    }
}

impl fmt::Display for TransportVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportVariant::Handshake => f.write_str("handshake"),
            TransportVariant::Socket => f.write_str("socket"),
        }
    }
}

impl FromStr for TransportVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "handshake" => Ok(TransportVariant::Handshake),
            "socket" => Ok(TransportVariant::Socket),
            other => Err(format!("unknown transport variant: {other}")),
        }
    }
}

/// Named link attribute on a remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateField {
    /// Handshake: the peer completed the join phase
    Joined,
    /// Handshake: the peer passed authorisation
    Allowed,
    /// Handshake: the peer answered the last liveness probe
    Alive,
    /// Socket: the connection is open
    IsConnected,
}

impl StateField {
    /// Attribute name as reported in mismatches
    pub fn as_str(self) -> &'static str {
        match self {
            StateField::Joined => "joined",
            StateField::Allowed => "allowed",
            StateField::Alive => "alive",
            StateField::IsConnected => "is_connected",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live link attributes of a remote, tagged by transport
///
/// `None` means the transport has not reported the attribute yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    /// Attributes of a handshake-transport remote
    Handshake {
        /// Join phase completed
        joined: Option<bool>,
        /// Authorisation granted
        allowed: Option<bool>,
        /// Liveness confirmed
        alive: Option<bool>,
    },
    /// Attributes of a socket-transport remote
    Socket {
        /// Connection open
        is_connected: Option<bool>,
    },
}

impl LinkStatus {
    /// Fresh link with nothing reported
    pub fn unknown(variant: TransportVariant) -> Self {
        match variant {
            TransportVariant::Handshake => LinkStatus::Handshake {
                joined: None,
                allowed: None,
                alive: None,
            },
            TransportVariant::Socket => LinkStatus::Socket { is_connected: None },
        }
    }

    /// Link with every attribute reporting `true`
    pub fn established(variant: TransportVariant) -> Self {
        match variant {
            TransportVariant::Handshake => LinkStatus::Handshake {
                joined: Some(true),
                allowed: Some(true),
                alive: Some(true),
            },
            TransportVariant::Socket => LinkStatus::Socket {
                is_connected: Some(true),
            },
        }
    }

    /// Transport this status belongs to
    pub fn variant(&self) -> TransportVariant {
        match self {
            LinkStatus::Handshake { .. } => TransportVariant::Handshake,
            LinkStatus::Socket { .. } => TransportVariant::Socket,
        }
    }

    /// Read an attribute; `None` if this transport has no such attribute
    pub fn field(&self, field: StateField) -> Option<Option<bool>> {
        match (self, field) {
            (LinkStatus::Handshake { joined, .. }, StateField::Joined) => Some(*joined),
            (LinkStatus::Handshake { allowed, .. }, StateField::Allowed) => Some(*allowed),
            (LinkStatus::Handshake { alive, .. }, StateField::Alive) => Some(*alive),
            (LinkStatus::Socket { is_connected }, StateField::IsConnected) => Some(*is_connected),
            _ => None,
        }
    }
}

/// Handle for one peer endpoint, owned by the stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    /// Name of the peer node
    pub name: String,
    /// Endpoint the stack talks to
    pub address: HostAddress,
    /// Current link attributes
    pub link: LinkStatus,
}

impl Remote {
    /// Remote with the given link attributes
    pub fn new(name: impl Into<String>, address: HostAddress, link: LinkStatus) -> Self {
        Self {
            name: name.into(),
            address,
            link,
        }
    }

    /// Set a link attribute, rejecting attributes the transport does not have
    pub fn set_field(&mut self, field: StateField, value: Option<bool>) -> Result<(), StackError> {
        let slot = match (&mut self.link, field) {
            (LinkStatus::Handshake { joined, .. }, StateField::Joined) => joined,
            (LinkStatus::Handshake { allowed, .. }, StateField::Allowed) => allowed,
            (LinkStatus::Handshake { alive, .. }, StateField::Alive) => alive,
            (LinkStatus::Socket { is_connected }, StateField::IsConnected) => is_connected,
            _ => {
                return Err(StackError::UnknownAttribute {
                    remote: self.name.clone(),
                    field: field.as_str(),
                })
            }
        };
        *slot = value;
        Ok(())
    }
}
