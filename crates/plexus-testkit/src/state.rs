//! Expected connectivity states and the state comparator
//!
//! A [`ConnectivityState`] describes what a remote's link attributes should
//! read. It is tagged with the transport it belongs to and only ever compared
//! against remotes of that transport. Fields set to
//! [`Expectation::DontCare`] are skipped.

use crate::error::{FieldMismatch, TestkitError, TestkitResult};
use plexus_stack::{LinkStatus, NetworkStack, Remote, StateField, TransportVariant};

/// Expected value of one link attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// The attribute must read exactly this value
    Is(Option<bool>),
    /// The attribute is not compared
    DontCare,
}

impl Expectation {
    /// Attribute must read `true`
    pub const TRUE: Expectation = Expectation::Is(Some(true));
    /// Attribute must read `false`
    pub const FALSE: Expectation = Expectation::Is(Some(false));
    /// Attribute must not be reported yet
    pub const UNSET: Expectation = Expectation::Is(None);
}

/// Symbolic connectivity state of a remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// Expectations for a handshake-transport remote
    Handshake {
        /// Expected `joined`
        joined: Expectation,
        /// Expected `allowed`
        allowed: Expectation,
        /// Expected `alive`
        alive: Expectation,
    },
    /// Expectations for a socket-transport remote
    Socket {
        /// Expected `is_connected`
        is_connected: Expectation,
    },
}

impl ConnectivityState {
    /// Link fully established
    pub fn connected(variant: TransportVariant) -> Self {
        match variant {
            TransportVariant::Handshake => ConnectivityState::Handshake {
                joined: Expectation::TRUE,
                allowed: Expectation::TRUE,
                alive: Expectation::TRUE,
            },
            TransportVariant::Socket => ConnectivityState::Socket {
                is_connected: Expectation::TRUE,
            },
        }
    }

    /// Nothing established
    pub fn not_connected(variant: TransportVariant) -> Self {
        match variant {
            TransportVariant::Handshake => ConnectivityState::Handshake {
                joined: Expectation::UNSET,
                allowed: Expectation::UNSET,
                alive: Expectation::UNSET,
            },
            TransportVariant::Socket => ConnectivityState::Socket {
                is_connected: Expectation::FALSE,
            },
        }
    }

    /// Joined but not yet allowed
    ///
    /// The socket transport has no join phase and reports not connected.
    pub fn joined_not_allowed(variant: TransportVariant) -> Self {
        match variant {
            TransportVariant::Handshake => ConnectivityState::Handshake {
                joined: Expectation::TRUE,
                allowed: Expectation::UNSET,
                alive: Expectation::UNSET,
            },
            TransportVariant::Socket => ConnectivityState::Socket {
                is_connected: Expectation::FALSE,
            },
        }
    }

    /// Joined, with allowance and liveness not compared
    pub fn joined(variant: TransportVariant) -> Self {
        match variant {
            TransportVariant::Handshake => ConnectivityState::Handshake {
                joined: Expectation::TRUE,
                allowed: Expectation::DontCare,
                alive: Expectation::DontCare,
            },
            TransportVariant::Socket => ConnectivityState::Socket {
                is_connected: Expectation::FALSE,
            },
        }
    }

    /// Transport this state applies to
    pub fn variant(&self) -> TransportVariant {
        match self {
            ConnectivityState::Handshake { .. } => TransportVariant::Handshake,
            ConnectivityState::Socket { .. } => TransportVariant::Socket,
        }
    }

    /// Expectations in field order
    pub fn expectations(&self) -> Vec<(StateField, Expectation)> {
        match *self {
            ConnectivityState::Handshake {
                joined,
                allowed,
                alive,
            } => vec![
                (StateField::Joined, joined),
                (StateField::Allowed, allowed),
                (StateField::Alive, alive),
            ],
            ConnectivityState::Socket { is_connected } => {
                vec![(StateField::IsConnected, is_connected)]
            }
        }
    }

    /// Whether `link` satisfies this state
    pub fn matches(&self, link: &LinkStatus) -> bool {
        self.mismatches(link).is_some_and(|fields| fields.is_empty())
    }

    /// Fields of `link` differing from this state; `None` on a shape mismatch
    fn mismatches(&self, link: &LinkStatus) -> Option<Vec<FieldMismatch>> {
        if link.variant() != self.variant() {
            return None;
        }
        let mut fields = Vec::new();
        for (field, expectation) in self.expectations() {
            let Expectation::Is(expected) = expectation else {
                continue;
            };
            let actual = link.field(field)?;
            if actual != expected {
                fields.push(FieldMismatch {
                    field: field.as_str(),
                    expected,
                    actual,
                });
            }
        }
        Some(fields)
    }
}

/// Canonical states for the process-wide transport
pub mod canonical {
    use super::ConnectivityState;
    use crate::config::active_transport;

    /// [`ConnectivityState::connected`] for the active transport
    pub fn connected() -> ConnectivityState {
        ConnectivityState::connected(active_transport())
    }

    /// [`ConnectivityState::not_connected`] for the active transport
    pub fn not_connected() -> ConnectivityState {
        ConnectivityState::not_connected(active_transport())
    }

    /// [`ConnectivityState::joined_not_allowed`] for the active transport
    pub fn joined_not_allowed() -> ConnectivityState {
        ConnectivityState::joined_not_allowed(active_transport())
    }

    /// [`ConnectivityState::joined`] for the active transport
    pub fn joined() -> ConnectivityState {
        ConnectivityState::joined(active_transport())
    }
}

/// Assert that `remote` is in `expected` state
///
/// Reports every differing attribute. No retry; wrap in a polling helper to
/// wait for a state.
pub fn check_state(expected: &ConnectivityState, remote: &Remote) -> TestkitResult<()> {
    let subject = format!("remote {}", remote.name);
    let fields = expected
        .mismatches(&remote.link)
        .ok_or(TestkitError::ShapeMismatch {
            subject: subject.clone(),
            expected: expected.variant(),
            observed: remote.link.variant(),
        })?;
    if fields.is_empty() {
        return Ok(());
    }

    let detail = fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(TestkitError::ConnectivityMismatch {
        subject,
        detail,
        fields,
    })
}

/// Assert that `from` tracks a remote named `to`, optionally in a given state
pub fn check_remote_exists<S>(
    from: &S,
    to: &str,
    expected: Option<&ConnectivityState>,
) -> TestkitResult<()>
where
    S: NetworkStack + ?Sized,
{
    let remote = from.remote(to).ok_or_else(|| TestkitError::UnknownRemote {
        stack: from.name().to_string(),
        remote: to.to_string(),
    })?;
    match expected {
        Some(state) => check_state(state, remote).map_err(|err| match err {
            TestkitError::ConnectivityMismatch { detail, fields, .. } => {
                TestkitError::ConnectivityMismatch {
                    subject: format!("{}'s remote {}", from.name(), to),
                    detail,
                    fields,
                }
            }
            other => other,
        }),
        None => Ok(()),
    }
}
