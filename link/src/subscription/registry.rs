//! Destination-keyed handler registry.
//!
//! Handlers for one destination run in registration order. Dispatch works on
//! a snapshot, so a handler may add or remove subscriptions (including its
//! own) without disturbing the delivery in progress.

use std::fmt;
use std::sync::Arc;

use crate::stomp::Frame;

/// Callback invoked with each MESSAGE frame delivered to its destination.
pub type MessageHandler = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Identifies one registration; unique for the life of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(pub u64);

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of removing a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub destination: String,
    /// No handlers remain for `destination`.
    pub destination_empty: bool,
}

struct Entry {
    token: SubscriptionToken,
    destination: String,
    handler: MessageHandler,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Entry>,
    next_token: u64,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("destinations", &self.destinations())
            .field("len", &self.entries.len())
            .finish()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, destination: impl Into<String>, handler: MessageHandler) -> SubscriptionToken {
        self.next_token += 1;
        let token = SubscriptionToken(self.next_token);
        self.entries.push(Entry {
            token,
            destination: destination.into(),
            handler,
        });
        token
    }

    /// `None` when the token is unknown (already removed or cleared).
    pub fn remove(&mut self, token: SubscriptionToken) -> Option<Removal> {
        let index = self.entries.iter().position(|e| e.token == token)?;
        let entry = self.entries.remove(index);
        let destination_empty = !self.contains_destination(&entry.destination);
        Some(Removal {
            destination: entry.destination,
            destination_empty,
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Deliver `message` to every handler registered for exactly
    /// `destination`. Returns how many handlers ran.
    pub fn dispatch(&self, destination: &str, message: &Frame) -> usize {
        let handlers: Vec<MessageHandler> = self
            .entries
            .iter()
            .filter(|e| e.destination == destination)
            .map(|e| e.handler.clone())
            .collect();
        for handler in &handlers {
            handler(message);
        }
        handlers.len()
    }

    /// Distinct destinations in first-registration order.
    pub fn destinations(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !seen.iter().any(|d| d == &entry.destination) {
                seen.push(entry.destination.clone());
            }
        }
        seen
    }

    pub fn contains_destination(&self, destination: &str) -> bool {
        self.entries.iter().any(|e| e.destination == destination)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
