//! Live event envelopes pushed to clients.
//!
//! Every envelope is a flat JSON object whose `action` field is the
//! discriminant:
//!
//! ```text
//! {"action":"vote-up","userID":1,"questionID":5,"votes":3}
//! ```
//!
//! The registry never looks inside an envelope; it only forwards the
//! serialized text produced by [`LiveEvent::to_json`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use coeus_core::{AttendanceId, ClassSessionId, Question, QuestionId, SectionId, UserId};

/// One broadcastable occurrence in a live class session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum LiveEvent {
    /// A student up-voted a question
    VoteUp {
        #[serde(rename = "userID")]
        user_id: UserId,
        #[serde(rename = "questionID")]
        question_id: QuestionId,
        /// Total vote count after this vote
        votes: u32,
    },

    /// A question was posted
    NewQuestion {
        #[serde(rename = "userID")]
        user_id: UserId,
        #[serde(rename = "questionID")]
        question_id: QuestionId,
        #[serde(rename = "sessionID")]
        session_id: ClassSessionId,
        text: String,
        votes: u32,
        answered: bool,
        #[serde(rename = "createdAt", serialize_with = "clock_time")]
        created_at: DateTime<Utc>,
    },

    /// The instructor marked a question as answered
    MarkQuestion {
        #[serde(rename = "questionID")]
        question_id: QuestionId,
        answered: bool,
    },

    /// A class session started for a section
    StartSession {
        #[serde(rename = "sectionID")]
        section_id: SectionId,
        #[serde(rename = "attendanceID")]
        attendance_id: AttendanceId,
    },

    /// A class session ended
    EndSession {
        #[serde(rename = "sectionID")]
        section_id: SectionId,
    },

    /// Someone joined the class session
    ParticipantJoined {
        /// Participant count after the join
        count: u32,
    },
}

/// Discriminant of a [`LiveEvent`], for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    VoteUp,
    NewQuestion,
    MarkQuestion,
    StartSession,
    EndSession,
    ParticipantJoined,
}

impl EventKind {
    /// The wire value of the `action` field.
    pub fn action(self) -> &'static str {
        match self {
            Self::VoteUp => "vote-up",
            Self::NewQuestion => "new-question",
            Self::MarkQuestion => "mark-question",
            Self::StartSession => "start-session",
            Self::EndSession => "end-session",
            Self::ParticipantJoined => "participant-joined",
        }
    }

    /// Whether the event is also pushed to global (unscoped) listeners.
    pub fn is_global(self) -> bool {
        matches!(self, Self::StartSession | Self::EndSession)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.action())
    }
}

impl LiveEvent {
    /// Creates a vote-up event.
    pub fn vote_up(user_id: UserId, question_id: QuestionId, votes: u32) -> Self {
        Self::VoteUp {
            user_id,
            question_id,
            votes,
        }
    }

    /// Creates a new-question event from the stored question.
    pub fn new_question(question: &Question) -> Self {
        Self::NewQuestion {
            user_id: question.user_id,
            question_id: question.id,
            session_id: question.session_id,
            text: question.text.clone(),
            votes: question.votes,
            answered: question.answered,
            created_at: question.created_at,
        }
    }

    /// Creates a mark-question event. Marking always means "answered".
    pub fn mark_question(question_id: QuestionId) -> Self {
        Self::MarkQuestion {
            question_id,
            answered: true,
        }
    }

    /// Creates a start-session event.
    pub fn start_session(section_id: SectionId, attendance_id: AttendanceId) -> Self {
        Self::StartSession {
            section_id,
            attendance_id,
        }
    }

    /// Creates an end-session event.
    pub fn end_session(section_id: SectionId) -> Self {
        Self::EndSession { section_id }
    }

    /// Creates a participant-joined event.
    pub fn participant_joined(count: u32) -> Self {
        Self::ParticipantJoined { count }
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::VoteUp { .. } => EventKind::VoteUp,
            Self::NewQuestion { .. } => EventKind::NewQuestion,
            Self::MarkQuestion { .. } => EventKind::MarkQuestion,
            Self::StartSession { .. } => EventKind::StartSession,
            Self::EndSession { .. } => EventKind::EndSession,
            Self::ParticipantJoined { .. } => EventKind::ParticipantJoined,
        }
    }

    /// Serializes the envelope to its wire text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// `createdAt` travels as a bare `HH:MM` (UTC), the only part clients show.
fn clock_time<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&coeus_core::format_clock_time(ts))
}
