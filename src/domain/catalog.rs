use crate::domain::{CourseKey, LessonId, TeacherId};
use crate::error::{PaymentError, Result};
use serde::{Deserialize, Serialize};

/// A priced unit of a course. Prices are whole Naira.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    #[serde(default)]
    pub title: String,
    pub price: u64,
    pub is_free: bool,
}

impl Lesson {
    pub fn free(id: impl Into<LessonId>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            price: 0,
            is_free: true,
        }
    }

    pub fn paid(id: impl Into<LessonId>, price: u64) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            price,
            is_free: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "lesson id must not be empty".to_string(),
            ));
        }
        match (self.is_free, self.price) {
            (true, 0) => Ok(()),
            (false, price) if price > 0 => Ok(()),
            (true, price) => Err(PaymentError::ValidationError(format!(
                "free lesson {} cannot carry a price of {price}",
                self.id
            ))),
            (false, _) => Err(PaymentError::ValidationError(format!(
                "paid lesson {} needs a positive price",
                self.id
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub key: CourseKey,
    #[serde(default)]
    pub title: String,
    pub teacher_id: TeacherId,
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn new(key: impl Into<CourseKey>, teacher_id: impl Into<TeacherId>) -> Self {
        Self {
            key: key.into(),
            title: String::new(),
            teacher_id: teacher_id.into(),
            lessons: Vec::new(),
        }
    }

    pub fn lesson(&self, lesson_id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == lesson_id)
    }

    /// Inserts the lesson, replacing any lesson with the same id in place.
    pub fn upsert_lesson(&mut self, lesson: Lesson) -> Result<()> {
        lesson.validate()?;
        match self.lessons.iter_mut().find(|l| l.id == lesson.id) {
            Some(existing) => *existing = lesson,
            None => self.lessons.push(lesson),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "course key must not be empty".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for lesson in &self.lessons {
            lesson.validate()?;
            if !seen.insert(lesson.id.as_str()) {
                return Err(PaymentError::ValidationError(format!(
                    "lesson {} appears twice in course {}",
                    lesson.id, self.key
                )));
            }
        }
        Ok(())
    }
}
