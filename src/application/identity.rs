use crate::domain::ports::{CredentialCheckHandle, TokenServiceHandle, UserStoreHandle};
use crate::domain::user::{Role, TeacherProfile, User};
use crate::error::{PaymentError, Result};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub role: Role,
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub whatsapp: Option<String>,
}

/// Registration, email confirmation and credential checks.
pub struct IdentityService {
    users: UserStoreHandle,
    tokens: TokenServiceHandle,
    credentials: CredentialCheckHandle,
    max_conflict_retries: usize,
}

impl IdentityService {
    pub fn new(
        users: UserStoreHandle,
        tokens: TokenServiceHandle,
        credentials: CredentialCheckHandle,
        max_conflict_retries: usize,
    ) -> Self {
        Self {
            users,
            tokens,
            credentials,
            max_conflict_retries,
        }
    }

    /// Creates the account and issues its confirmation token. Teachers start unapproved.
    pub async fn register(&self, new_user: NewUser) -> Result<(User, String)> {
        let email = new_user.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(PaymentError::ValidationError(format!(
                "invalid email address: {}",
                new_user.email
            )));
        }
        if new_user.name.trim().is_empty() {
            return Err(PaymentError::ValidationError("name is required".to_string()));
        }
        if new_user.password.is_empty() {
            return Err(PaymentError::ValidationError("password is required".to_string()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            role: new_user.role,
            email: email.clone(),
            name: new_user.name.trim().to_string(),
            credential_hash: self.credentials.hash(&new_user.password),
            email_confirmed: false,
            teacher: (new_user.role == Role::Teacher).then(|| TeacherProfile {
                is_approved: false,
                whatsapp: new_user.whatsapp,
            }),
            created_at: Utc::now(),
            version: 1,
        };

        if !self.users.insert(user.clone()).await? {
            return Err(PaymentError::ValidationError(format!(
                "email {email} is already registered"
            )));
        }
        let token = self.tokens.issue(&user.id).await?;
        info!(user = %user.id, role = ?user.role, "User registered");
        Ok((user.public_view(), token))
    }

    pub async fn confirm_email(&self, token: &str) -> Result<User> {
        let user_id = self.tokens.redeem(token).await?;

        for _ in 0..=self.max_conflict_retries {
            let current = self.user(&user_id).await?;
            if current.email_confirmed {
                return Ok(current.public_view());
            }
            let mut next = current.clone();
            next.email_confirmed = true;
            next.version = current.version + 1;
            if self.users.compare_and_swap(current.version, next.clone()).await? {
                info!(user = %user_id, "Email confirmed");
                return Ok(next.public_view());
            }
        }
        Err(PaymentError::Conflict {
            entity: "user",
            key: user_id,
        })
    }

    pub async fn check_credentials(&self, email: &str, password: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .filter(|user| self.credentials.verify(password, &user.credential_hash))
            .ok_or_else(|| PaymentError::Unauthorized("invalid email or password".to_string()))?;
        if !user.email_confirmed {
            return Err(PaymentError::Unauthorized(
                "email address is not confirmed".to_string(),
            ));
        }
        Ok(user.public_view())
    }

    pub async fn user(&self, id: &str) -> Result<User> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::not_found("user", id))
    }
}
