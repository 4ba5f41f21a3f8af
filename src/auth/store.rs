//! Credential store for admin and broadcaster accounts
//!
//! One table of users persisted as a JSON file. Passwords are stored as
//! bcrypt hashes. Writes go to a temporary file that is renamed over the
//! original, so a crash never leaves a half-written store behind.
//!
//! All operations block (file I/O, bcrypt); async callers should run them
//! through `tokio::task::spawn_blocking`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

pub const ADMIN_USERNAME: &str = "admin";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Corrupt credential store: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Password hashing failed: {0}")]
    HashError(#[from] bcrypt::BcryptError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Credential store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    users: Vec<UserRecord>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            next_id: 1,
            users: Vec::new(),
        }
    }
}

pub struct CredentialStore {
    path: PathBuf,
    cost: u32,
    data: Mutex<StoreFile>,
}

impl CredentialStore {
    /// Load the store at `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>, cost: u32) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            cost,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the `admin` account if it is missing. Returns true when created.
    pub fn init_admin(&self, password: &str) -> Result<bool, StoreError> {
        let created = self.create_user(ADMIN_USERNAME, password)?;
        if created {
            log::info!("Admin user created: username={}", ADMIN_USERNAME);
        }
        Ok(created)
    }

    pub fn get(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let username = normalize_username(username);
        let data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(data.users.iter().find(|u| u.username == username).cloned())
    }

    pub fn usernames(&self) -> Result<Vec<String>, StoreError> {
        let data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(data.users.iter().map(|u| u.username.clone()).collect())
    }

    /// Check a password. Unknown users simply fail verification.
    pub fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        match self.get(username)? {
            Some(user) => Ok(bcrypt::verify(password, &user.password_hash)?),
            None => Ok(false),
        }
    }

    /// Add a user. Returns false when the username is already taken.
    pub fn create_user(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let username = validate(username, password)?;
        if self.get(username)?.is_some() {
            return Ok(false);
        }

        let password_hash = bcrypt::hash(password, self.cost)?;

        // Re-checked under the lock: another request may have won the race
        // while we hashed.
        self.commit(|data| {
            if data.users.iter().any(|u| u.username == username) {
                return false;
            }
            let id = data.next_id;
            data.next_id += 1;
            data.users.push(UserRecord {
                id,
                username: username.to_string(),
                password_hash,
            });
            true
        })
    }

    /// Remove a user. Returns false when no such user exists.
    pub fn delete_user(&self, username: &str) -> Result<bool, StoreError> {
        let username = require_username(username)?;
        self.commit(|data| {
            let before = data.users.len();
            data.users.retain(|u| u.username != username);
            data.users.len() != before
        })
    }

    /// Replace a user's password. Returns false when no such user exists.
    pub fn update_password(&self, username: &str, new_password: &str) -> Result<bool, StoreError> {
        let username = validate(username, new_password)?;
        let password_hash = bcrypt::hash(new_password, self.cost)?;

        self.commit(|data| match data.users.iter_mut().find(|u| u.username == username) {
            Some(user) => {
                user.password_hash = password_hash;
                true
            }
            None => false,
        })
    }

    /// Apply `change` to a copy of the table. When it reports a change, the
    /// copy is written to disk and only then replaces the in-memory table.
    fn commit(&self, change: impl FnOnce(&mut StoreFile) -> bool) -> Result<bool, StoreError> {
        let mut data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = data.clone();
        if !change(&mut next) {
            return Ok(false);
        }
        self.persist(&next)?;
        *data = next;
        Ok(true)
    }

    fn persist(&self, data: &StoreFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(data)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Usernames are compared and stored without surrounding whitespace.
pub fn normalize_username(username: &str) -> &str {
    username.trim()
}

fn require_username(username: &str) -> Result<&str, StoreError> {
    let username = normalize_username(username);
    if username.is_empty() {
        return Err(StoreError::InvalidInput("username must not be empty".to_string()));
    }
    Ok(username)
}

fn validate<'a>(username: &'a str, password: &str) -> Result<&'a str, StoreError> {
    let username = require_username(username)?;
    if password.is_empty() {
        return Err(StoreError::InvalidInput("password must not be empty".to_string()));
    }
    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEST_COST: u32 = 4;

    fn store() -> (CredentialStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("users.json"), TEST_COST).unwrap();
        (store, dir)
    }

    #[test]
    fn admin_is_created_once() {
        let (store, _dir) = store();
        assert!(store.init_admin("1234").unwrap());
        assert!(!store.init_admin("other").unwrap());
        assert!(store.verify("admin", "1234").unwrap());
        assert!(!store.verify("admin", "other").unwrap());
    }

    #[test]
    fn create_rejects_duplicates_and_blanks() {
        let (store, _dir) = store();
        assert!(store.create_user("dj", "pw").unwrap());
        assert!(!store.create_user("dj", "pw2").unwrap());
        assert!(matches!(
            store.create_user("  ", "pw"),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            store.create_user("dj2", ""),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn passwords_are_hashed() {
        let (store, _dir) = store();
        store.create_user("dj", "secret").unwrap();
        let user = store.get("dj").unwrap().unwrap();
        assert_ne!(user.password_hash, "secret");
        assert!(user.password_hash.starts_with("$2"));
    }

    #[test]
    fn delete_and_update_report_missing_users() {
        let (store, _dir) = store();
        store.create_user("dj", "pw").unwrap();

        assert!(store.update_password("dj", "new").unwrap());
        assert!(store.verify("dj", "new").unwrap());
        assert!(!store.update_password("ghost", "new").unwrap());

        assert!(store.delete_user("dj").unwrap());
        assert!(!store.delete_user("dj").unwrap());
        assert!(!store.verify("dj", "new").unwrap());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.json");
        {
            let store = CredentialStore::open(&path, TEST_COST).unwrap();
            store.create_user("a", "1").unwrap();
            store.create_user("b", "2").unwrap();
            store.delete_user("a").unwrap();
        }
        let store = CredentialStore::open(&path, TEST_COST).unwrap();
        assert_eq!(store.usernames().unwrap(), vec!["b"]);
        assert_eq!(store.get("b").unwrap().unwrap().id, 2);

        // Ids are never reused.
        store.create_user("c", "3").unwrap();
        assert_eq!(store.get("c").unwrap().unwrap().id, 3);
    }

    #[test]
    fn usernames_are_trimmed_for_every_operation() {
        let (store, _dir) = store();
        assert!(store.create_user(" dj ", "pw").unwrap());
        assert_eq!(store.usernames().unwrap(), vec!["dj"]);
        assert!(!store.create_user("dj", "pw").unwrap());
        assert!(store.verify(" dj", "pw").unwrap());
        assert!(store.update_password("dj ", "new").unwrap());
        assert!(store.delete_user("  dj").unwrap());
        assert!(matches!(
            store.delete_user("   "),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn failed_write_leaves_the_table_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let store = CredentialStore::open(nested.join("users.json"), TEST_COST).unwrap();
        store.create_user("admin", "pw").unwrap();

        // The store's directory is replaced by a plain file.
        fs::remove_dir_all(&nested).unwrap();
        fs::write(&nested, "not a directory").unwrap();

        assert!(matches!(
            store.create_user("dj", "pw"),
            Err(StoreError::IoError(_))
        ));
        assert!(matches!(
            store.update_password("admin", "new"),
            Err(StoreError::IoError(_))
        ));
        assert!(matches!(
            store.delete_user("admin"),
            Err(StoreError::IoError(_))
        ));
        assert_eq!(store.get("dj").unwrap(), None);
        assert!(store.verify("admin", "pw").unwrap());
        assert_eq!(store.usernames().unwrap(), vec!["admin"]);

        fs::remove_file(&nested).unwrap();
        assert!(store.create_user("dj", "pw").unwrap());
        assert_eq!(store.get("dj").unwrap().unwrap().id, 2);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            CredentialStore::open(&path, TEST_COST),
            Err(StoreError::Corrupt(_))
        ));
    }
}
