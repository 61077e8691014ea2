//! Connection registry using Actor pattern.
//!
//! The registry is the single owner of every live connection's outbound
//! queue. Connections are partitioned into a global scope (system-wide
//! events) and one scope per class session.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                      ┌──────────────────────────────┐
//! │ Request handler │──broadcast (no wait)─▶│        RegistryActor         │
//! │   / Dispatcher  │                      │                              │
//! └─────────────────┘                      │ global:    {conn, conn, ..}  │
//! ┌─────────────────┐                      │ by_session: 10 → {conn, ..}  │
//! │ Upgrade handler │──register/unregister─▶│             11 → {conn}      │
//! └─────────────────┘   (acknowledged)     └──────────────┬───────────────┘
//!                                                         │ try_send
//!                                                         ▼
//!                                               per-connection outbound queues
//! ```
//!
//! All register, unregister, and broadcast operations travel through one
//! command queue and are applied in order, so a connection removed before a
//! broadcast is never delivered that broadcast.
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use std::fmt;

use tokio::sync::mpsc;

use coeus_core::ClassSessionId;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError, RegistryStats};
pub use handle::RegistryHandle;

/// Capacity of the registry command channel.
///
/// Broadcasts that arrive while the channel is full are dropped rather than
/// queued; registration changes wait for a free slot.
pub const COMMAND_BUFFER: usize = 1024;

/// Which audience a connection is registered in, or a broadcast targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every client connected to the unscoped endpoint
    Global,
    /// Clients connected to one class session
    Session(ClassSessionId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Session(id) => write!(f, "session:{id}"),
        }
    }
}

/// Spawn the registry actor and return a handle for interaction.
///
/// This function:
/// 1. Creates the bounded command channel
/// 2. Spawns the RegistryActor on a tokio task
/// 3. Returns a RegistryHandle for request handlers and upgrade endpoints
///
/// The actor stops when every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use coeusd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///
///     // Use handle to interact with registry
///     let stats = handle.stats().await;
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
