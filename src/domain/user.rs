use crate::domain::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TeacherProfile {
    pub is_approved: bool,
    pub whatsapp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Fixed at registration.
    pub role: Role,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub credential_hash: String,
    pub email_confirmed: bool,
    pub teacher: Option<TeacherProfile>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_approved_teacher(&self) -> bool {
        self.role == Role::Teacher && self.teacher.as_ref().is_some_and(|t| t.is_approved)
    }

    /// Copy safe to hand to callers outside the service layer.
    pub fn public_view(&self) -> User {
        User {
            credential_hash: String::new(),
            ..self.clone()
        }
    }
}
