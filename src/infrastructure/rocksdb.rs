use crate::domain::catalog::Course;
use crate::domain::grant::{GrantKey, PurchaseGrant};
use crate::domain::payment::PaymentAttempt;
use crate::domain::ports::{
    AttemptStore, CourseStore, GrantStore, Stores, UserStore, WalletStore,
};
use crate::domain::user::User;
use crate::domain::wallet::TeacherWallet;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_USERS: &str = "users";
pub const CF_COURSES: &str = "courses";
pub const CF_GRANTS: &str = "grants";
pub const CF_WALLETS: &str = "wallets";
pub const CF_ATTEMPTS: &str = "attempts";

const COLUMN_FAMILIES: [&str; 5] = [CF_USERS, CF_COURSES, CF_GRANTS, CF_WALLETS, CF_ATTEMPTS];

/// Persistent store backed by RocksDB, one column family per collection.
///
/// Values are JSON documents. Conditional writes (insert-if-absent and
/// compare-and-swap) are serialized through `write_lock`, so a check and its
/// write are never interleaved with another conditional write from this process.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates the database at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// All five collections served from this one database.
    pub fn into_stores(self) -> Stores {
        Stores {
            users: Arc::new(self.clone()),
            courses: Arc::new(self.clone()),
            grants: Arc::new(self.clone()),
            wallets: Arc::new(self.clone()),
            attempts: Arc::new(self),
        }
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key, bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    async fn swap_versioned<T: Serialize + DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
        expected_version: Option<u64>,
        version_of: impl Fn(&T) -> u64,
        value: &T,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let current: Option<T> = self.read(cf_name, key)?;
        let matches = match (current.as_ref(), expected_version) {
            (None, None) => true,
            (Some(existing), Some(expected)) => version_of(existing) == expected,
            _ => false,
        };
        if matches {
            self.write(cf_name, key, value)?;
        }
        Ok(matches)
    }
}

#[async_trait]
impl UserStore for RocksDBStore {
    async fn insert(&self, user: User) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if self.read::<User>(CF_USERS, user.id.as_bytes())?.is_some() {
            return Ok(false);
        }
        let users: Vec<User> = self.scan(CF_USERS)?;
        if users.iter().any(|u| u.email == user.email) {
            return Ok(false);
        }
        self.write(CF_USERS, user.id.as_bytes(), &user)?;
        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<User>> {
        self.read(CF_USERS, id.as_bytes())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users: Vec<User> = self.scan(CF_USERS)?;
        Ok(users.into_iter().find(|u| u.email == email))
    }

    async fn compare_and_swap(&self, expected_version: u64, user: User) -> Result<bool> {
        self.swap_versioned(
            CF_USERS,
            user.id.as_bytes(),
            Some(expected_version),
            |u: &User| u.version,
            &user,
        )
        .await
    }
}

#[async_trait]
impl CourseStore for RocksDBStore {
    async fn store(&self, course: Course) -> Result<()> {
        self.write(CF_COURSES, course.key.as_bytes(), &course)
    }

    async fn get(&self, key: &str) -> Result<Option<Course>> {
        self.read(CF_COURSES, key.as_bytes())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let existed = self.read::<Course>(CF_COURSES, key.as_bytes())?.is_some();
        if existed {
            let cf = self.cf(CF_COURSES)?;
            self.db.delete_cf(cf, key.as_bytes())?;
        }
        Ok(existed)
    }

    async fn get_all(&self) -> Result<Vec<Course>> {
        self.scan(CF_COURSES)
    }
}

#[async_trait]
impl GrantStore for RocksDBStore {
    async fn insert_if_absent(&self, grant: PurchaseGrant) -> Result<Option<PurchaseGrant>> {
        let _guard = self.write_lock.lock().await;
        let key = grant.key().encode();
        if let Some(existing) = self.read::<PurchaseGrant>(CF_GRANTS, &key)? {
            return Ok(Some(existing));
        }
        self.write(CF_GRANTS, &key, &grant)?;
        Ok(None)
    }

    async fn get(&self, key: &GrantKey) -> Result<Option<PurchaseGrant>> {
        self.read(CF_GRANTS, &key.encode())
    }

    async fn for_student(&self, student_id: &str) -> Result<Vec<PurchaseGrant>> {
        let grants: Vec<PurchaseGrant> = self.scan(CF_GRANTS)?;
        Ok(grants
            .into_iter()
            .filter(|g| g.student_id == student_id)
            .collect())
    }
}

#[async_trait]
impl WalletStore for RocksDBStore {
    async fn get(&self, teacher_id: &str) -> Result<Option<TeacherWallet>> {
        self.read(CF_WALLETS, teacher_id.as_bytes())
    }

    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        wallet: TeacherWallet,
    ) -> Result<bool> {
        self.swap_versioned(
            CF_WALLETS,
            wallet.teacher_id.as_bytes(),
            expected_version,
            |w: &TeacherWallet| w.version,
            &wallet,
        )
        .await
    }

    async fn get_all(&self) -> Result<Vec<TeacherWallet>> {
        self.scan(CF_WALLETS)
    }
}

#[async_trait]
impl AttemptStore for RocksDBStore {
    async fn get(&self, reference: &str) -> Result<Option<PaymentAttempt>> {
        self.read(CF_ATTEMPTS, reference.as_bytes())
    }

    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        attempt: PaymentAttempt,
    ) -> Result<bool> {
        self.swap_versioned(
            CF_ATTEMPTS,
            attempt.reference.as_bytes(),
            expected_version,
            |a: &PaymentAttempt| a.version,
            &attempt,
        )
        .await
    }

    async fn find_open(&self, key: &GrantKey) -> Result<Vec<PaymentAttempt>> {
        let attempts: Vec<PaymentAttempt> = self.scan(CF_ATTEMPTS)?;
        Ok(attempts
            .into_iter()
            .filter(|a| {
                a.is_open()
                    && a.student_id == key.student_id
                    && a.course_key == key.course_key
                    && a.lesson_id == key.lesson_id
            })
            .collect())
    }

    async fn unresolved(&self) -> Result<Vec<PaymentAttempt>> {
        let attempts: Vec<PaymentAttempt> = self.scan(CF_ATTEMPTS)?;
        let mut pending: Vec<PaymentAttempt> =
            attempts.into_iter().filter(|a| !a.is_terminal()).collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }
}
