//! Domain entities, value objects and the ports the application layer talks through.

pub mod catalog;
pub mod grant;
pub mod payment;
pub mod ports;
pub mod user;
pub mod wallet;

pub type UserId = String;
pub type TeacherId = String;
pub type CourseKey = String;
pub type LessonId = String;
/// Idempotency key shared by initiate, verify and settle.
pub type Reference = String;
