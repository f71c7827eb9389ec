use crate::domain::catalog::Course;
use crate::domain::grant::{GrantKey, PurchaseGrant};
use crate::domain::payment::PaymentAttempt;
use crate::domain::ports::{
    AttemptStore, CourseStore, GrantStore, Stores, UserStore, WalletStore,
};
use crate::domain::user::User;
use crate::domain::wallet::TeacherWallet;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Applies a versioned write to a map while the caller holds its write lock.
fn swap_versioned<T: Clone>(
    map: &mut HashMap<String, T>,
    key: String,
    expected_version: Option<u64>,
    current_version: impl Fn(&T) -> u64,
    value: T,
) -> bool {
    let matches = match (map.get(&key), expected_version) {
        (None, None) => true,
        (Some(existing), Some(expected)) => current_version(existing) == expected,
        _ => false,
    };
    if matches {
        map.insert(key, value);
    }
    matches
}

/// In-memory users keyed by id.
#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: User) -> Result<bool> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) || users.values().any(|u| u.email == user.email) {
            return Ok(false);
        }
        users.insert(user.id.clone(), user);
        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn compare_and_swap(&self, expected_version: u64, user: User) -> Result<bool> {
        let mut users = self.users.write().await;
        Ok(swap_versioned(
            &mut users,
            user.id.clone(),
            Some(expected_version),
            |u| u.version,
            user,
        ))
    }
}

/// In-memory course catalog keyed by course key.
#[derive(Default, Clone)]
pub struct InMemoryCourseStore {
    courses: Arc<RwLock<HashMap<String, Course>>>,
}

impl InMemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CourseStore for InMemoryCourseStore {
    async fn store(&self, course: Course) -> Result<()> {
        let mut courses = self.courses.write().await;
        courses.insert(course.key.clone(), course);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Course>> {
        let courses = self.courses.read().await;
        Ok(courses.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut courses = self.courses.write().await;
        Ok(courses.remove(key).is_some())
    }

    async fn get_all(&self) -> Result<Vec<Course>> {
        let courses = self.courses.read().await;
        let mut all: Vec<Course> = courses.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }
}

/// In-memory grants; the map key is the uniqueness constraint.
#[derive(Default, Clone)]
pub struct InMemoryGrantStore {
    grants: Arc<RwLock<HashMap<GrantKey, PurchaseGrant>>>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn insert_if_absent(&self, grant: PurchaseGrant) -> Result<Option<PurchaseGrant>> {
        let mut grants = self.grants.write().await;
        let key = grant.key();
        if let Some(existing) = grants.get(&key) {
            return Ok(Some(existing.clone()));
        }
        grants.insert(key, grant);
        Ok(None)
    }

    async fn get(&self, key: &GrantKey) -> Result<Option<PurchaseGrant>> {
        let grants = self.grants.read().await;
        Ok(grants.get(key).cloned())
    }

    async fn for_student(&self, student_id: &str) -> Result<Vec<PurchaseGrant>> {
        let grants = self.grants.read().await;
        let mut owned: Vec<PurchaseGrant> = grants
            .values()
            .filter(|g| g.student_id == student_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.granted_at.cmp(&b.granted_at));
        Ok(owned)
    }
}

/// In-memory teacher wallets keyed by teacher id.
#[derive(Default, Clone)]
pub struct InMemoryWalletStore {
    wallets: Arc<RwLock<HashMap<String, TeacherWallet>>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn get(&self, teacher_id: &str) -> Result<Option<TeacherWallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets.get(teacher_id).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        wallet: TeacherWallet,
    ) -> Result<bool> {
        let mut wallets = self.wallets.write().await;
        Ok(swap_versioned(
            &mut wallets,
            wallet.teacher_id.clone(),
            expected_version,
            |w| w.version,
            wallet,
        ))
    }

    async fn get_all(&self) -> Result<Vec<TeacherWallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets.values().cloned().collect())
    }
}

/// In-memory payment attempts keyed by reference.
#[derive(Default, Clone)]
pub struct InMemoryAttemptStore {
    attempts: Arc<RwLock<HashMap<String, PaymentAttempt>>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn get(&self, reference: &str) -> Result<Option<PaymentAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts.get(reference).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        attempt: PaymentAttempt,
    ) -> Result<bool> {
        let mut attempts = self.attempts.write().await;
        Ok(swap_versioned(
            &mut attempts,
            attempt.reference.clone(),
            expected_version,
            |a| a.version,
            attempt,
        ))
    }

    async fn find_open(&self, key: &GrantKey) -> Result<Vec<PaymentAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .values()
            .filter(|a| {
                a.is_open()
                    && a.student_id == key.student_id
                    && a.course_key == key.course_key
                    && a.lesson_id == key.lesson_id
            })
            .cloned()
            .collect())
    }

    async fn unresolved(&self) -> Result<Vec<PaymentAttempt>> {
        let attempts = self.attempts.read().await;
        let mut pending: Vec<PaymentAttempt> = attempts
            .values()
            .filter(|a| !a.is_terminal())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }
}

impl Stores {
    /// Fresh, empty in-memory collections.
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserStore::new()),
            courses: Arc::new(InMemoryCourseStore::new()),
            grants: Arc::new(InMemoryGrantStore::new()),
            wallets: Arc::new(InMemoryWalletStore::new()),
            attempts: Arc::new(InMemoryAttemptStore::new()),
        }
    }
}
