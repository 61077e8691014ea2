//! Registry actor commands, errors, and statistics.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RegistryStats`: Snapshot of registry occupancy

use std::collections::BTreeMap;

use thiserror::Error;
use tokio::sync::oneshot;

use coeus_core::ClassSessionId;

use super::Scope;
use crate::connection::{ConnectionId, Outbound, Payload};

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Registration changes carry a oneshot channel so the caller can wait
/// until the change is applied. Broadcasts carry none: the caller never
/// waits on delivery.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Add a connection to a scope. Idempotent.
    ///
    /// Registering under a second class session moves the connection, so
    /// it is never in more than one session bucket.
    Register {
        scope: Scope,
        connection: Outbound,
        respond_to: oneshot::Sender<()>,
    },

    /// Remove a connection from a scope. Idempotent; responds with whether
    /// the connection was present.
    Unregister {
        scope: Scope,
        id: ConnectionId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Enqueue a payload on every connection in a scope without waiting.
    ///
    /// Connections whose queue is full or closed are evicted.
    Broadcast { scope: Scope, payload: Payload },

    /// Report registry occupancy.
    Stats {
        respond_to: oneshot::Sender<RegistryStats>,
    },

    /// Close and forget every registered connection (server shutdown).
    ///
    /// Responds with the number of distinct connections closed.
    CloseAll { respond_to: oneshot::Sender<usize> },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The actor has stopped and the command could not be applied.
    #[error("registry channel closed")]
    ChannelClosed,
}

// ============================================================================
// Registry Stats
// ============================================================================

/// Snapshot of how many connections each scope holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Connections in the global scope
    pub global: usize,
    /// Connections per class session (only non-empty sessions appear)
    pub sessions: BTreeMap<ClassSessionId, usize>,
    /// Distinct connections across all scopes
    pub connections: usize,
}

impl RegistryStats {
    /// Connections registered under `session` (0 if none).
    pub fn session(&self, session: ClassSessionId) -> usize {
        self.sessions.get(&session).copied().unwrap_or(0)
    }

    /// Connections registered in `scope`.
    pub fn scope(&self, scope: Scope) -> usize {
        match scope {
            Scope::Global => self.global,
            Scope::Session(id) => self.session(id),
        }
    }
}
