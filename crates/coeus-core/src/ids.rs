//! Type-safe identifiers for store records.
//!
//! Every id is assigned by the relational store and is a non-negative
//! integer. The newtypes keep a question id from being passed where a
//! class session id is expected; on the wire they serialize as bare numbers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

macro_rules! store_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw store id.
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw store id.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| DomainError::InvalidId {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }
    };
}

store_id!(
    /// One live occurrence of a course section meeting.
    ///
    /// The unit of scoping for most broadcasts.
    ClassSessionId,
    "class session id"
);

store_id!(
    /// A student or instructor account.
    UserId,
    "user id"
);

store_id!(
    /// A question posted during a class session.
    QuestionId,
    "question id"
);

store_id!(
    /// A course section; class sessions are started for a section.
    SectionId,
    "section id"
);

store_id!(
    /// The attendance record created when a class session starts.
    AttendanceId,
    "attendance id"
);
