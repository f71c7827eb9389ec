use crate::domain::catalog::{Course, Lesson};
use crate::domain::ports::{CourseStoreHandle, UserStoreHandle};
use crate::domain::user::User;
use crate::error::{PaymentError, Result};
use tracing::info;

/// Course publishing for teachers. Grants are never touched here.
pub struct CatalogService {
    users: UserStoreHandle,
    courses: CourseStoreHandle,
}

impl CatalogService {
    pub fn new(users: UserStoreHandle, courses: CourseStoreHandle) -> Self {
        Self { users, courses }
    }

    pub async fn publish_course(&self, actor_id: &str, key: &str, title: &str) -> Result<Course> {
        let teacher = self.actor(actor_id).await?;
        if !teacher.is_approved_teacher() {
            return Err(PaymentError::Unauthorized(format!(
                "user {actor_id} is not an approved teacher"
            )));
        }
        let key = key.trim();
        if key.is_empty() {
            return Err(PaymentError::ValidationError("course key is required".to_string()));
        }
        if self.courses.get(key).await?.is_some() {
            return Err(PaymentError::ValidationError(format!(
                "course {key} already exists"
            )));
        }

        let mut course = Course::new(key, &teacher.id);
        course.title = title.trim().to_string();
        self.courses.store(course.clone()).await?;
        info!(course = key, teacher = %teacher.id, "Course published");
        Ok(course)
    }

    /// Adds a lesson or replaces the one with the same id. Existing grants keep their paid price.
    pub async fn put_lesson(&self, actor_id: &str, course_key: &str, lesson: Lesson) -> Result<Course> {
        let mut course = self.course(course_key).await?;
        if course.teacher_id != actor_id {
            return Err(PaymentError::Unauthorized(format!(
                "user {actor_id} does not own course {course_key}"
            )));
        }
        let lesson_id = lesson.id.clone();
        let price = lesson.price;
        course.upsert_lesson(lesson)?;
        self.courses.store(course.clone()).await?;
        info!(course = course_key, lesson = %lesson_id, price, "Lesson saved");
        Ok(course)
    }

    pub async fn remove_course(&self, actor_id: &str, course_key: &str) -> Result<()> {
        let actor = self.actor(actor_id).await?;
        let course = self.course(course_key).await?;
        if course.teacher_id != actor.id && !actor.is_admin() {
            return Err(PaymentError::Unauthorized(format!(
                "user {actor_id} may not remove course {course_key}"
            )));
        }
        self.courses.remove(course_key).await?;
        info!(course = course_key, actor = actor_id, "Course removed");
        Ok(())
    }

    pub async fn course(&self, key: &str) -> Result<Course> {
        self.courses
            .get(key)
            .await?
            .ok_or_else(|| PaymentError::not_found("course", key))
    }

    pub async fn courses(&self) -> Result<Vec<Course>> {
        self.courses.get_all().await
    }

    async fn actor(&self, actor_id: &str) -> Result<User> {
        self.users
            .get(actor_id)
            .await?
            .ok_or_else(|| PaymentError::Unauthorized(format!("unknown user {actor_id}")))
    }
}
