//! Coeus live-update daemon - connection registry and broadcast fanout
//!
//! This crate provides the real-time layer of the classroom server:
//! - `registry` - Registry actor owning every live connection, by scope
//! - `connection` - Per-connection outbound queue and I/O pumps
//! - `dispatch` - Builds classroom event envelopes and fans them out
//! - `server` - WebSocket upgrade endpoints
//! - `config` - Daemon configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         coeusd                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   LiveServer    │────▶│       RegistryActor         │    │
//! │  │ (/ws, /ws/:id)  │     │ (global + per-session sets) │    │
//! │  └────────┬────────┘     └──────────────▲──────────────┘    │
//! │           │                             │                   │
//! │           │ upgrades                    │ broadcasts        │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐    │
//! │  │serve_connection │     │         Dispatcher          │    │
//! │  │ (two pumps each)│     │   (vote-up, new-question..) │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod registry;
pub mod server;
