use crate::domain::ports::CredentialCheck;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Salted SHA-256 credential hashes stored as `salt$digest`.
#[derive(Debug, Default, Clone)]
pub struct Sha256Credentials;

impl Sha256Credentials {
    fn digest(salt: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl CredentialCheck for Sha256Credentials {
    fn hash(&self, password: &str) -> String {
        let salt = Uuid::new_v4().simple().to_string();
        format!("{salt}${}", Self::digest(&salt, password))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        match hash.split_once('$') {
            Some((salt, digest)) => Self::digest(salt, password) == digest,
            None => false,
        }
    }
}
