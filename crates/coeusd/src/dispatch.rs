//! Turns classroom occurrences into live envelopes and fans them out.
//!
//! Request handlers call these after the store has recorded the change.
//! Every method returns immediately and never fails: live delivery is best
//! effort and must not fail the request that triggered it.

use std::sync::Arc;

use tracing::{debug, error};

use coeus_core::{AttendanceId, ClassSessionId, Question, QuestionId, SectionId, UserId};
use coeus_protocol::LiveEvent;

use crate::connection::Payload;
use crate::registry::{RegistryHandle, Scope};

/// Builds envelopes for classroom events and submits them to the registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: RegistryHandle,
}

impl Dispatcher {
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// A vote was recorded; `votes` is the question's new total.
    pub fn vote_up(
        &self,
        class_session: ClassSessionId,
        user_id: UserId,
        question_id: QuestionId,
        votes: u32,
    ) {
        self.publish(class_session, &LiveEvent::vote_up(user_id, question_id, votes));
    }

    /// A question was posted.
    pub fn new_question(&self, class_session: ClassSessionId, question: &Question) {
        self.publish(class_session, &LiveEvent::new_question(question));
    }

    /// The instructor marked a question as answered.
    pub fn mark_question(&self, class_session: ClassSessionId, question_id: QuestionId) {
        self.publish(class_session, &LiveEvent::mark_question(question_id));
    }

    /// A class session started. Announced globally (so dashboards can show
    /// the session as live) and to the session itself.
    pub fn start_session(
        &self,
        class_session: ClassSessionId,
        section_id: SectionId,
        attendance_id: AttendanceId,
    ) {
        self.publish(class_session, &LiveEvent::start_session(section_id, attendance_id));
    }

    /// A class session ended. Announced globally and to the session itself.
    pub fn end_session(&self, class_session: ClassSessionId, section_id: SectionId) {
        self.publish(class_session, &LiveEvent::end_session(section_id));
    }

    /// Someone joined; `count` is the session's participant count after the join.
    pub fn participant_joined(&self, class_session: ClassSessionId, count: u32) {
        self.publish(class_session, &LiveEvent::participant_joined(count));
    }

    /// Serializes once and broadcasts the same payload to the session and,
    /// for lifecycle events, to global listeners.
    fn publish(&self, class_session: ClassSessionId, event: &LiveEvent) {
        let payload: Payload = match event.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!(action = %event.kind(), error = %e, "Failed to serialize live event");
                return;
            }
        };

        let kind = event.kind();
        debug!(action = %kind, class_session = %class_session, "Broadcasting live event");

        if kind.is_global() {
            self.registry.broadcast(Scope::Global, Arc::clone(&payload));
        }
        self.registry.broadcast(Scope::Session(class_session), payload);
    }
}
