//! Maps owning UI identities to their client instances.
//!
//! There is deliberately no ambient global client: each window (or other
//! UI surface) owns at most one connection, looked up through an explicit
//! registry the embedding tool holds on to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::client::Client;
use crate::sync::lock;

/// An opaque identity for the UI surface owning a connection.
pub type OwnerId = u64;

/// Registry of live clients keyed by owner.
#[derive(Debug, Default)]
pub struct Registry {
    clients: Mutex<HashMap<OwnerId, Arc<Client>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a client with an owner, halting any client the owner
    /// previously held.
    pub fn register(&self, owner: OwnerId, client: Arc<Client>) {
        let previous = lock(&self.clients).insert(owner, client);
        if let Some(previous) = previous {
            previous.halt();
        }
    }

    /// Looks up the client for an owner.
    #[must_use]
    pub fn get(&self, owner: OwnerId) -> Option<Arc<Client>> {
        lock(&self.clients).get(&owner).cloned()
    }

    /// Removes and halts the client for an owner. Returns false when the
    /// owner held no client.
    pub fn forget(&self, owner: OwnerId) -> bool {
        match lock(&self.clients).remove(&owner) {
            Some(client) => {
                client.halt();
                true
            }
            None => false,
        }
    }

    /// Halts and forgets every registered client.
    pub fn halt_all(&self) {
        let clients: Vec<Arc<Client>> = lock(&self.clients).drain().map(|(_, client)| client).collect();
        for client in clients {
            client.halt();
        }
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.clients).len()
    }

    /// True when no client is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.clients).is_empty()
    }
}
