use super::catalog::Course;
use super::grant::{GrantKey, PurchaseGrant};
use super::payment::{Gateway, PaymentAttempt};
use super::user::User;
use super::wallet::{TeacherWallet, WalletTransaction};
use super::{Reference, UserId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Every `compare_and_swap` takes the version the caller read (`None` for
/// "must not exist yet") and returns `false` when someone else wrote first.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts unless the id or the email is taken.
    async fn insert(&self, user: User) -> Result<bool>;
    async fn get(&self, id: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn compare_and_swap(&self, expected_version: u64, user: User) -> Result<bool>;
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn store(&self, course: Course) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Course>>;
    async fn remove(&self, key: &str) -> Result<bool>;
    async fn get_all(&self) -> Result<Vec<Course>>;
}

#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Returns the grant already holding the triple, or `None` once inserted.
    async fn insert_if_absent(&self, grant: PurchaseGrant) -> Result<Option<PurchaseGrant>>;
    async fn get(&self, key: &GrantKey) -> Result<Option<PurchaseGrant>>;
    async fn for_student(&self, student_id: &str) -> Result<Vec<PurchaseGrant>>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get(&self, teacher_id: &str) -> Result<Option<TeacherWallet>>;
    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        wallet: TeacherWallet,
    ) -> Result<bool>;
    async fn get_all(&self) -> Result<Vec<TeacherWallet>>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn get(&self, reference: &str) -> Result<Option<PaymentAttempt>>;
    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        attempt: PaymentAttempt,
    ) -> Result<bool>;
    /// Open attempts (initiated or awaiting confirmation) for one purchase.
    async fn find_open(&self, key: &GrantKey) -> Result<Vec<PaymentAttempt>>;
    /// Every attempt that is not settled or failed.
    async fn unresolved(&self) -> Result<Vec<PaymentAttempt>>;
}

/// What the coordinator asks a gateway to charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub reference: Reference,
    pub email: String,
    pub amount: u64,
    pub student_id: UserId,
    pub course_key: String,
    pub lesson_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    pub reference: Reference,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayVerification {
    Paid {
        amount_paid: u64,
        paid_at: DateTime<Utc>,
    },
    Pending,
    Declined {
        reason: String,
    },
}

/// A payment provider: initialize, redirect the customer, verify by reference.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> Gateway;
    async fn initialize(&self, request: CheckoutRequest) -> Result<Checkout>;
    async fn verify(&self, reference: &str) -> Result<GatewayVerification>;
}

/// Issues and redeems single-use email confirmation tokens.
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn issue(&self, user_id: &str) -> Result<String>;
    /// Consumes the token. Unknown or expired tokens are `Unauthorized`.
    async fn redeem(&self, token: &str) -> Result<UserId>;
}

pub trait CredentialCheck: Send + Sync {
    fn hash(&self, password: &str) -> String;
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Executes the bank transfer for an approved withdrawal.
#[async_trait]
pub trait PayoutDispatcher: Send + Sync {
    async fn dispatch(&self, teacher: &User, transaction: &WalletTransaction) -> Result<()>;
}

pub type UserStoreHandle = Arc<dyn UserStore>;
pub type CourseStoreHandle = Arc<dyn CourseStore>;
pub type GrantStoreHandle = Arc<dyn GrantStore>;
pub type WalletStoreHandle = Arc<dyn WalletStore>;
pub type AttemptStoreHandle = Arc<dyn AttemptStore>;
pub type GatewayHandle = Arc<dyn PaymentGateway>;
pub type TokenServiceHandle = Arc<dyn TokenService>;
pub type CredentialCheckHandle = Arc<dyn CredentialCheck>;
pub type PayoutHandle = Arc<dyn PayoutDispatcher>;

/// The full set of persistent collections one backend provides.
#[derive(Clone)]
pub struct Stores {
    pub users: UserStoreHandle,
    pub courses: CourseStoreHandle,
    pub grants: GrantStoreHandle,
    pub wallets: WalletStoreHandle,
    pub attempts: AttemptStoreHandle,
}
