//! Registry actor - owns every scope set and processes commands.
//!
//! The RegistryActor is the only code that reads or writes the scope sets.
//! It receives commands via an mpsc channel and applies them one at a time,
//! which makes iterate-while-mutate impossible by construction.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Responder send failures are ignored (the caller stopped waiting)

use std::collections::{BTreeMap, HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use coeus_core::ClassSessionId;

use super::commands::{RegistryCommand, RegistryStats};
use super::Scope;
use crate::connection::{ConnectionId, Delivery, Outbound, Payload};

type Bucket = HashMap<ConnectionId, Outbound>;

/// The registry actor - owns all connection scopes.
///
/// # Ownership
///
/// The actor owns:
/// - `global`: connections registered for system-wide events
/// - `by_session`: one bucket per class session with at least one connection
/// - `session_of`: reverse index, connection → its (single) session bucket
///
/// Empty session buckets are pruned as soon as their last connection leaves.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Global scope
    global: Bucket,

    /// Session scopes, keyed by class session
    by_session: HashMap<ClassSessionId, Bucket>,

    /// Which session bucket each session-scoped connection is in
    session_of: HashMap<ConnectionId, ClassSessionId>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            global: HashMap::new(),
            by_session: HashMap::new(),
            session_of: HashMap::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            connections = self.connection_count(),
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                scope,
                connection,
                respond_to,
            } => {
                self.handle_register(scope, connection);
                let _ = respond_to.send(());
            }
            RegistryCommand::Unregister {
                scope,
                id,
                respond_to,
            } => {
                let removed = self.handle_unregister(scope, id);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Broadcast { scope, payload } => {
                self.handle_broadcast(scope, &payload);
            }
            RegistryCommand::Stats { respond_to } => {
                let _ = respond_to.send(self.handle_stats());
            }
            RegistryCommand::CloseAll { respond_to } => {
                let closed = self.handle_close_all();
                let _ = respond_to.send(closed);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_register(&mut self, scope: Scope, connection: Outbound) {
        let id = connection.id();
        match scope {
            Scope::Global => {
                self.global.insert(id, connection);
            }
            Scope::Session(session) => {
                if let Some(previous) = self.session_of.insert(id, session) {
                    if previous != session {
                        self.remove_from_bucket(previous, id);
                        debug!(
                            connection = %id,
                            from = %previous,
                            to = %session,
                            "Connection moved between class sessions"
                        );
                    }
                }
                self.by_session
                    .entry(session)
                    .or_default()
                    .insert(id, connection);
            }
        }

        debug!(
            connection = %id,
            scope = %scope,
            total = self.connection_count(),
            "Connection registered"
        );
    }

    fn handle_unregister(&mut self, scope: Scope, id: ConnectionId) -> bool {
        let removed = match scope {
            Scope::Global => self.global.remove(&id).is_some(),
            Scope::Session(session) => match self.session_of.get(&id) {
                Some(current) if *current == session => {
                    self.session_of.remove(&id);
                    self.remove_from_bucket(session, id)
                }
                _ => false,
            },
        };

        if removed {
            debug!(connection = %id, scope = %scope, "Connection unregistered");
        }
        removed
    }

    /// Non-blocking fanout. A full or closed queue gets its connection evicted
    /// from every scope; it is not retried.
    fn handle_broadcast(&mut self, scope: Scope, payload: &Payload) {
        let targets = match scope {
            Scope::Global => Some(&self.global),
            Scope::Session(session) => self.by_session.get(&session),
        };

        let Some(targets) = targets else {
            trace!(scope = %scope, "Broadcast to empty scope");
            return;
        };

        let mut delivered = 0usize;
        let mut dead = Vec::new();

        for (id, connection) in targets {
            match connection.try_deliver(payload) {
                Delivery::Delivered => delivered += 1,
                Delivery::Full => {
                    warn!(
                        connection = %id,
                        scope = %scope,
                        "Outbound queue full, evicting slow connection"
                    );
                    dead.push(*id);
                }
                Delivery::Closed => {
                    debug!(connection = %id, scope = %scope, "Outbound queue closed, evicting");
                    dead.push(*id);
                }
            }
        }

        let evicted = dead.len();
        for id in dead {
            self.evict(id);
        }

        trace!(scope = %scope, delivered, evicted, "Broadcast fanned out");
    }

    fn handle_stats(&self) -> RegistryStats {
        RegistryStats {
            global: self.global.len(),
            sessions: self
                .by_session
                .iter()
                .map(|(session, bucket)| (*session, bucket.len()))
                .collect::<BTreeMap<_, _>>(),
            connections: self.connection_count(),
        }
    }

    fn handle_close_all(&mut self) -> usize {
        let closed = self.connection_count();

        for connection in self.global.values() {
            connection.close();
        }
        for connection in self.by_session.values().flat_map(|bucket| bucket.values()) {
            connection.close();
        }

        self.global.clear();
        self.by_session.clear();
        self.session_of.clear();

        info!(closed, "Closed all live connections");
        closed
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Removes a dead connection from every scope and closes its queue.
    fn evict(&mut self, id: ConnectionId) {
        if let Some(connection) = self.global.remove(&id) {
            connection.close();
        }
        if let Some(session) = self.session_of.remove(&id) {
            if let Some(bucket) = self.by_session.get(&session) {
                if let Some(connection) = bucket.get(&id) {
                    connection.close();
                }
            }
            self.remove_from_bucket(session, id);
        }
    }

    /// Removes `id` from a session bucket, pruning the bucket once empty.
    fn remove_from_bucket(&mut self, session: ClassSessionId, id: ConnectionId) -> bool {
        let Some(bucket) = self.by_session.get_mut(&session) else {
            return false;
        };
        let removed = bucket.remove(&id).is_some();
        if bucket.is_empty() {
            self.by_session.remove(&session);
            debug!(class_session = %session, "Pruned empty class session scope");
        }
        removed
    }

    /// Distinct connections across all scopes.
    fn connection_count(&self) -> usize {
        self.global
            .keys()
            .chain(self.session_of.keys())
            .collect::<HashSet<_>>()
            .len()
    }
}
