use crate::domain::UserId;
use crate::domain::ports::TokenService;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Single-use confirmation tokens held in memory.
#[derive(Clone)]
pub struct InMemoryTokenService {
    ttl: Duration,
    tokens: Arc<RwLock<HashMap<String, (UserId, DateTime<Utc>)>>>,
}

impl InMemoryTokenService {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl TokenService for InMemoryTokenService {
    async fn issue(&self, user_id: &str) -> Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens
            .write()
            .await
            .insert(token.clone(), (user_id.to_string(), Utc::now()));
        Ok(token)
    }

    async fn redeem(&self, token: &str) -> Result<UserId> {
        let (user_id, issued_at) = self
            .tokens
            .write()
            .await
            .remove(token)
            .ok_or_else(|| PaymentError::Unauthorized("unknown confirmation token".to_string()))?;

        let age = Utc::now().signed_duration_since(issued_at);
        if age.to_std().is_ok_and(|age| age > self.ttl) {
            return Err(PaymentError::Unauthorized(
                "confirmation token expired".to_string(),
            ));
        }
        Ok(user_id)
    }
}
