use crate::domain::catalog::{Course, Lesson};
use crate::domain::grant::{GrantKey, GrantOutcome, PurchaseGrant};
use crate::domain::ports::{CourseStoreHandle, GrantStoreHandle};
use crate::error::{PaymentError, Result};
use chrono::Utc;
use tracing::{info, warn};

/// Answers "may this student open this lesson" and owns the grant records.
pub struct EntitlementLedger {
    courses: CourseStoreHandle,
    grants: GrantStoreHandle,
}

impl EntitlementLedger {
    pub fn new(courses: CourseStoreHandle, grants: GrantStoreHandle) -> Self {
        Self { courses, grants }
    }

    /// Free lessons are open to everyone; paid ones need a grant for the exact triple.
    pub async fn has_access(&self, student_id: &str, course_key: &str, lesson_id: &str) -> Result<bool> {
        let (_, lesson) = self.lesson(course_key, lesson_id).await?;
        if lesson.is_free {
            return Ok(true);
        }
        let key = GrantKey::new(student_id, course_key, lesson_id);
        Ok(self.grants.get(&key).await?.is_some())
    }

    /// Records a grant once per triple. Repeats hand back the stored grant untouched.
    pub async fn record_grant(
        &self,
        student_id: &str,
        course_key: &str,
        lesson_id: &str,
        amount_paid: u64,
        reference: &str,
    ) -> Result<GrantOutcome> {
        let (_, lesson) = self.lesson(course_key, lesson_id).await?;
        if amount_paid != lesson.price {
            warn!(
                student = student_id,
                course = course_key,
                lesson = lesson_id,
                amount_paid,
                price = lesson.price,
                "Grant amount differs from current lesson price"
            );
        }

        let grant = PurchaseGrant {
            student_id: student_id.to_string(),
            course_key: course_key.to_string(),
            lesson_id: lesson_id.to_string(),
            amount_paid,
            reference: reference.to_string(),
            granted_at: Utc::now(),
        };

        match self.grants.insert_if_absent(grant.clone()).await? {
            Some(existing) => {
                info!(
                    student = student_id,
                    course = course_key,
                    lesson = lesson_id,
                    reference,
                    existing_reference = %existing.reference,
                    "Lesson already granted"
                );
                Ok(GrantOutcome::AlreadyGranted(existing))
            }
            None => {
                info!(
                    student = student_id,
                    course = course_key,
                    lesson = lesson_id,
                    reference,
                    amount_paid,
                    "Lesson granted"
                );
                Ok(GrantOutcome::Created(grant))
            }
        }
    }

    pub async fn grant(&self, student_id: &str, course_key: &str, lesson_id: &str) -> Result<Option<PurchaseGrant>> {
        self.grants
            .get(&GrantKey::new(student_id, course_key, lesson_id))
            .await
    }

    pub async fn grants_for_student(&self, student_id: &str) -> Result<Vec<PurchaseGrant>> {
        self.grants.for_student(student_id).await
    }

    pub(crate) async fn lesson(&self, course_key: &str, lesson_id: &str) -> Result<(Course, Lesson)> {
        let course = self
            .courses
            .get(course_key)
            .await?
            .ok_or_else(|| PaymentError::not_found("course", course_key))?;
        let lesson = course
            .lesson(lesson_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("lesson", format!("{course_key}/{lesson_id}")))?;
        Ok((course, lesson))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Course, Lesson};
    use crate::infrastructure::in_memory::{InMemoryCourseStore, InMemoryGrantStore};
    use std::sync::Arc;

    async fn ledger() -> EntitlementLedger {
        let courses = Arc::new(InMemoryCourseStore::new());
        let mut course = Course::new("math101", "t1");
        course.upsert_lesson(Lesson::free("intro")).unwrap();
        course.upsert_lesson(Lesson::paid("vectors", 1500)).unwrap();
        crate::domain::ports::CourseStore::store(courses.as_ref(), course)
            .await
            .unwrap();
        EntitlementLedger::new(courses, Arc::new(InMemoryGrantStore::new()))
    }

    #[tokio::test]
    async fn test_free_lesson_open_to_all() {
        let ledger = ledger().await;
        assert!(ledger.has_access("anyone", "math101", "intro").await.unwrap());
    }

    #[tokio::test]
    async fn test_paid_lesson_needs_grant() {
        let ledger = ledger().await;
        assert!(!ledger.has_access("s1", "math101", "vectors").await.unwrap());

        let outcome = ledger
            .record_grant("s1", "math101", "vectors", 1500, "r1")
            .await
            .unwrap();
        assert!(matches!(outcome, GrantOutcome::Created(_)));
        assert!(ledger.has_access("s1", "math101", "vectors").await.unwrap());
        assert!(!ledger.has_access("s2", "math101", "vectors").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_grant_is_noop() {
        let ledger = ledger().await;
        ledger
            .record_grant("s1", "math101", "vectors", 1500, "r1")
            .await
            .unwrap();
        let outcome = ledger
            .record_grant("s1", "math101", "vectors", 1500, "r2")
            .await
            .unwrap();

        match outcome {
            GrantOutcome::AlreadyGranted(existing) => assert_eq!(existing.reference, "r1"),
            other => panic!("expected AlreadyGranted, got {other:?}"),
        }
        assert_eq!(ledger.grants_for_student("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_price_mismatch_still_grants() {
        let ledger = ledger().await;
        let outcome = ledger
            .record_grant("s1", "math101", "vectors", 1200, "r1")
            .await
            .unwrap();
        assert_eq!(outcome.grant().amount_paid, 1200);
    }

    #[tokio::test]
    async fn test_unknown_lesson() {
        let ledger = ledger().await;
        assert!(matches!(
            ledger.record_grant("s1", "math101", "nope", 0, "r1").await,
            Err(PaymentError::NotFound { .. })
        ));
        assert!(matches!(
            ledger.has_access("s1", "bio", "intro").await,
            Err(PaymentError::NotFound { .. })
        ));
    }
}
