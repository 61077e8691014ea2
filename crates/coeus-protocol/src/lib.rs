//! Coeus Protocol - Wire envelopes for live classroom updates
//!
//! This crate provides the canonical event envelope pushed to connected
//! clients, and validation for the (otherwise ignored) messages clients
//! send back.

pub mod event;
pub mod inbound;

pub use event::{EventKind, LiveEvent};
pub use inbound::{validate_inbound, InboundError, MAX_INBOUND_SIZE};
