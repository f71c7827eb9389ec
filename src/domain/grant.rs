use crate::domain::{CourseKey, LessonId, Reference, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Permanent record that a student paid for, or was enrolled free in, a lesson.
///
/// The price is captured at grant time; later price edits never touch it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseGrant {
    pub student_id: UserId,
    pub course_key: CourseKey,
    pub lesson_id: LessonId,
    pub amount_paid: u64,
    pub reference: Reference,
    pub granted_at: DateTime<Utc>,
}

impl PurchaseGrant {
    pub fn key(&self) -> GrantKey {
        GrantKey::new(&self.student_id, &self.course_key, &self.lesson_id)
    }
}

/// The (student, course, lesson) triple a grant is unique on.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct GrantKey {
    pub student_id: UserId,
    pub course_key: CourseKey,
    pub lesson_id: LessonId,
}

impl GrantKey {
    pub fn new(student_id: &str, course_key: &str, lesson_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            course_key: course_key.to_string(),
            lesson_id: lesson_id.to_string(),
        }
    }

    /// Flat byte key for ordered key-value backends.
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "{}\u{1f}{}\u{1f}{}",
            self.student_id, self.course_key, self.lesson_id
        )
        .into_bytes()
    }
}

/// Result of recording a grant. A repeat is a success, not an error.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum GrantOutcome {
    Created(PurchaseGrant),
    AlreadyGranted(PurchaseGrant),
}

impl GrantOutcome {
    pub fn grant(&self) -> &PurchaseGrant {
        match self {
            GrantOutcome::Created(grant) | GrantOutcome::AlreadyGranted(grant) => grant,
        }
    }

    pub fn into_grant(self) -> PurchaseGrant {
        match self {
            GrantOutcome::Created(grant) | GrantOutcome::AlreadyGranted(grant) => grant,
        }
    }
}
