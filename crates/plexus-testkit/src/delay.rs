//! Delay rules for inbound messages
//!
//! A rule keyed by sender applies to every message from that sender; a rule
//! keyed by sender and kind applies only to that kind and wins over the
//! sender-wide rule. Custom delayers cover anything the keys cannot express
//! and are consulted only when no keyed rule matches.

use parking_lot::Mutex;
use plexus_stack::Envelope;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type Delayer = Arc<dyn Fn(&Envelope) -> Option<Duration> + Send + Sync>;

/// Delay policy of one instrumented stack
#[derive(Clone, Default)]
pub struct DelayRules {
    keyed: HashMap<(String, Option<String>), Duration>,
    delayers: Vec<Delayer>,
}

impl fmt::Debug for DelayRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayRules")
            .field("keyed", &self.keyed)
            .field("delayers", &self.delayers.len())
            .finish()
    }
}

impl DelayRules {
    /// Rules that delay nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay messages from `sender`, optionally only those of `kind`
    ///
    /// Replaces any rule registered for the same sender and kind.
    pub fn set_delay(&mut self, sender: impl Into<String>, delay: Duration, kind: Option<&str>) {
        self.keyed
            .insert((sender.into(), kind.map(str::to_owned)), delay);
    }

    /// Register a predicate computing the delay of a message
    pub fn add_delayer<F>(&mut self, delayer: F)
    where
        F: Fn(&Envelope) -> Option<Duration> + Send + Sync + 'static,
    {
        self.delayers.push(Arc::new(delayer));
    }

    /// Remove every rule and delayer
    pub fn clear_delays(&mut self) {
        self.keyed.clear();
        self.delayers.clear();
    }

    /// Delay applying to a message from `sender` of `kind`
    pub fn delay_for(&self, sender: &str, kind: Option<&str>) -> Duration {
        if let Some(kind) = kind {
            if let Some(delay) = self.keyed.get(&(sender.to_owned(), Some(kind.to_owned()))) {
                return *delay;
            }
        }
        self.keyed
            .get(&(sender.to_owned(), None))
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Delay applying to `envelope`, custom delayers included
    pub fn delay_for_envelope(&self, envelope: &Envelope) -> Duration {
        let keyed = self.delay_for(&envelope.sender, envelope.kind.as_deref());
        if !keyed.is_zero() {
            return keyed;
        }
        self.delayers
            .iter()
            .rev()
            .find_map(|delayer| delayer(envelope))
            .unwrap_or(Duration::ZERO)
    }

    /// Number of keyed rules and delayers
    pub fn len(&self) -> usize {
        self.keyed.len() + self.delayers.len()
    }

    /// Whether no rule or delayer is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared handle to one stack's delay rules
///
/// Lets a test change delays while the stack itself is owned by the task
/// servicing it. The lock is only held for the duration of a single call.
#[derive(Debug, Clone, Default)]
pub struct DelayHandle {
    rules: Arc<Mutex<DelayRules>>,
}

impl DelayHandle {
    /// Handle to a fresh, empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`DelayRules::set_delay`]
    pub fn set_delay(&self, sender: impl Into<String>, delay: Duration, kind: Option<&str>) {
        self.rules.lock().set_delay(sender, delay, kind);
    }

    /// See [`DelayRules::add_delayer`]
    pub fn add_delayer<F>(&self, delayer: F)
    where
        F: Fn(&Envelope) -> Option<Duration> + Send + Sync + 'static,
    {
        self.rules.lock().add_delayer(delayer);
    }

    /// See [`DelayRules::clear_delays`]
    pub fn clear_delays(&self) {
        self.rules.lock().clear_delays();
    }

    /// See [`DelayRules::delay_for`]
    pub fn delay_for(&self, sender: &str, kind: Option<&str>) -> Duration {
        self.rules.lock().delay_for(sender, kind)
    }

    /// See [`DelayRules::delay_for_envelope`]
    pub fn delay_for_envelope(&self, envelope: &Envelope) -> Duration {
        self.rules.lock().delay_for_envelope(envelope)
    }

    /// Copy of the current rules
    pub fn snapshot(&self) -> DelayRules {
        self.rules.lock().clone()
    }
}
