//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` is a cheap-to-clone interface for sending commands
//! to the registry actor. It is constructed once at startup and passed to
//! request handlers and upgrade endpoints.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use coeus_core::ClassSessionId;

use super::commands::{RegistryCommand, RegistryError, RegistryStats};
use super::Scope;
use crate::connection::{ConnectionId, Outbound, Payload};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// Registration methods are async and resolve once the actor has applied
/// the change. Broadcast methods return immediately: they only queue the
/// fanout, which the actor performs with non-blocking enqueues. A broadcast
/// that finds the command channel full is dropped.
///
/// # Usage
///
/// ```ignore
/// let handle = registry_handle.clone();
///
/// handle.register_session(class_session, outbound).await?;
/// handle.broadcast_session(class_session, payload);
/// handle.unregister_session(class_session, id).await?;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Add a connection to `scope`. Idempotent.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(&self, scope: Scope, connection: Outbound) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                scope,
                connection,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Add a connection to the global scope.
    pub async fn register_global(&self, connection: Outbound) -> Result<(), RegistryError> {
        self.register(Scope::Global, connection).await
    }

    /// Add a connection to a class session's scope.
    pub async fn register_session(
        &self,
        class_session: ClassSessionId,
        connection: Outbound,
    ) -> Result<(), RegistryError> {
        self.register(Scope::Session(class_session), connection).await
    }

    /// Remove a connection from `scope`. Idempotent.
    ///
    /// Returns whether the connection was registered there.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn unregister(&self, scope: Scope, id: ConnectionId) -> Result<bool, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Unregister {
                scope,
                id,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Remove a connection from the global scope.
    pub async fn unregister_global(&self, id: ConnectionId) -> Result<bool, RegistryError> {
        self.unregister(Scope::Global, id).await
    }

    /// Remove a connection from a class session's scope.
    pub async fn unregister_session(
        &self,
        class_session: ClassSessionId,
        id: ConnectionId,
    ) -> Result<bool, RegistryError> {
        self.unregister(Scope::Session(class_session), id).await
    }

    /// Fan `payload` out to every connection in `scope`.
    ///
    /// Fire-and-forget: returns without waiting for delivery. Broadcasting
    /// to a scope with no connections is a no-op. If the registry is
    /// backlogged the broadcast is dropped.
    pub fn broadcast(&self, scope: Scope, payload: Payload) {
        match self
            .sender
            .try_send(RegistryCommand::Broadcast { scope, payload })
        {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(scope = %scope, "Registry backlogged, broadcast dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(scope = %scope, "Registry stopped, broadcast dropped");
            }
        }
    }

    /// Fan `payload` out to every global connection.
    pub fn broadcast_global(&self, payload: Payload) {
        self.broadcast(Scope::Global, payload);
    }

    /// Fan `payload` out to every connection in a class session.
    pub fn broadcast_session(&self, class_session: ClassSessionId, payload: Payload) {
        self.broadcast(Scope::Session(class_session), payload);
    }

    /// Snapshot of registry occupancy.
    ///
    /// Because commands are applied in order, the snapshot reflects every
    /// broadcast and registration issued through this handle beforehand.
    /// Returns empty stats if the actor has stopped.
    pub async fn stats(&self) -> RegistryStats {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Stats { respond_to: tx })
            .await
            .is_err()
        {
            return RegistryStats::default();
        }

        rx.await.unwrap_or_default()
    }

    /// Close every registered connection and empty all scopes.
    ///
    /// Returns the number of connections closed (0 if the actor has stopped).
    pub async fn close_all(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::CloseAll { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
