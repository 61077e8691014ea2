//! Coeus Core - Shared types for live classroom updates
//!
//! This crate provides the domain identifiers and records shared between
//! the wire protocol (coeus-protocol) and the live-update daemon (coeusd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod ids;
pub mod question;

// Re-exports for convenience
pub use error::DomainError;
pub use ids::{AttendanceId, ClassSessionId, QuestionId, SectionId, UserId};
pub use question::{format_clock_time, Question, CLOCK_TIME_FORMAT};
