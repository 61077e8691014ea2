//! Question record as read back from the store.

use chrono::{DateTime, Utc};

use crate::{ClassSessionId, QuestionId, UserId};

/// Layout of a question's posting time as shown to clients: 24-hour
/// `HH:MM` in UTC. Clients convert it to local 12-hour time themselves.
pub const CLOCK_TIME_FORMAT: &str = "%H:%M";

/// A question posted during a class session.
///
/// Only the columns that the live `new-question` event carries are kept here;
/// per-viewer state such as "has this user voted" never leaves the store layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub session_id: ClassSessionId,
    pub user_id: UserId,
    pub text: String,
    pub votes: u32,
    pub answered: bool,
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// A freshly posted question: no votes, not answered.
    pub fn posted(
        id: QuestionId,
        session_id: ClassSessionId,
        user_id: UserId,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            session_id,
            user_id,
            text: text.into(),
            votes: 0,
            answered: false,
            created_at,
        }
    }
}

/// Formats a posting time for the wire (`HH:MM`, UTC).
pub fn format_clock_time(ts: &DateTime<Utc>) -> String {
    ts.format(CLOCK_TIME_FORMAT).to_string()
}
