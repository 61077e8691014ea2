//! Validation of client-to-server messages.
//!
//! Clients do not send commands today. Whatever they send must still be a
//! well-formed JSON object (or `null`, which decodes as an empty object);
//! anything else is treated as a broken client and the connection's read
//! side is closed.

use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum accepted inbound message size (1 MB)
pub const MAX_INBOUND_SIZE: usize = 1_048_576;

/// Reasons an inbound message is rejected.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("Message too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Checks that `payload` is a JSON object or `null`, then discards it.
pub fn validate_inbound(payload: &[u8]) -> Result<(), InboundError> {
    if payload.len() > MAX_INBOUND_SIZE {
        return Err(InboundError::TooLarge {
            size: payload.len(),
            max: MAX_INBOUND_SIZE,
        });
    }

    let _: Option<Map<String, Value>> = serde_json::from_slice(payload)?;
    Ok(())
}
