//! User accounts: signup and login.
//!
//! Passwords are stored as salted PBKDF2-HMAC-SHA256 hashes. The account name
//! is the identity key; signup is a single create-if-absent store update.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::NaiveDate;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::forms::{LoginForm, SignupForm};
use crate::model::User;
use crate::store::{from_document, to_document, DocumentStore, Filter, Update, USERS};

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// A salted one-way password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Credential {
    password_hash: String,
    salt: String,
    iterations: u32,
}

impl Credential {
    fn new(password: &str, iterations: u32) -> Self {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let key = derive_key(password, &salt, iterations);
        Self {
            password_hash: B64.encode(key),
            salt: B64.encode(salt),
            iterations,
        }
    }

    fn verify(&self, password: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (B64.decode(&self.salt), B64.decode(&self.password_hash))
        else {
            return false;
        };
        let key = derive_key(password, &salt, self.iterations.max(1));
        expected.len() == key.len()
            && expected
                .iter()
                .zip(key.iter())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

/// Shape of a document in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    name: String,
    dob: NaiveDate,
    #[serde(flatten)]
    credential: Credential,
}

impl From<StoredUser> for User {
    fn from(stored: StoredUser) -> Self {
        Self {
            name: stored.name,
            dob: stored.dob,
        }
    }
}

/// Registers and authenticates users.
#[derive(Debug)]
pub struct AccountStore<S> {
    store: Arc<S>,
    iterations: u32,
}

impl<S: DocumentStore> AccountStore<S> {
    /// Create an account store hashing new passwords with `iterations` rounds.
    pub fn new(store: Arc<S>, iterations: u32) -> Self {
        Self {
            store,
            iterations: iterations.max(1),
        }
    }

    /// Create a user if no account with that name exists.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty or malformed fields,
    /// [`Error::DuplicateUser`] if the name is taken, or a store error.
    pub fn register(&self, form: &SignupForm) -> Result<User> {
        let account = form.validate()?;
        let stored = StoredUser {
            name: account.name.clone(),
            dob: account.dob,
            credential: Credential::new(&account.password, self.iterations),
        };

        let outcome = self.store.update_one(
            USERS,
            &Filter::all().eq("name", account.name.as_str()),
            &Update::new().set_on_insert(to_document(USERS, &stored)?),
            true,
        )?;
        if outcome.matched {
            debug!("Signup rejected, '{}' already exists", account.name);
            return Err(Error::DuplicateUser { name: account.name });
        }

        info!("Created account '{}'", stored.name);
        Ok(stored.into())
    }

    /// Return the user whose name and password match.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty fields,
    /// [`Error::InvalidCredentials`] for an unknown name or wrong password,
    /// or a store error.
    pub fn authenticate(&self, form: &LoginForm) -> Result<User> {
        let (name, password) = form.validate()?;

        let Some(document) = self.store.find_one(USERS, &Filter::all().eq("name", name))? else {
            debug!("Login failed, no account '{}'", name);
            return Err(Error::InvalidCredentials);
        };
        let stored: StoredUser = from_document(USERS, document)?;

        if stored.credential.verify(password) {
            info!("User '{}' logged in", stored.name);
            Ok(stored.into())
        } else {
            debug!("Login failed, wrong password for '{}'", name);
            Err(Error::InvalidCredentials)
        }
    }

    /// Whether an account with this name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .store
            .count(USERS, &Filter::all().eq("name", name.trim()))?
            > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn accounts() -> AccountStore<SqliteStore> {
        let store = Arc::new(SqliteStore::open_in_memory().expect("failed to create test store"));
        AccountStore::new(store, 1_000)
    }

    fn signup(name: &str, password: &str) -> SignupForm {
        SignupForm {
            name: name.to_string(),
            password: password.to_string(),
            dob: "2000-01-01".to_string(),
        }
    }

    fn login(name: &str, password: &str) -> LoginForm {
        LoginForm {
            name: name.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_register_then_authenticate() {
        let accounts = accounts();
        let user = accounts.register(&signup("alice", "pw1")).unwrap();
        assert_eq!(user.name, "alice");
        assert_eq!(user.dob, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());

        let logged_in = accounts.authenticate(&login("alice", "pw1")).unwrap();
        assert_eq!(logged_in, user);
    }

    #[test]
    fn test_register_duplicate() {
        let accounts = accounts();
        accounts.register(&signup("alice", "pw1")).unwrap();

        let err = accounts.register(&signup("alice", "other")).unwrap_err();
        assert!(matches!(err, Error::DuplicateUser { ref name } if name == "alice"));

        // The original password still works.
        assert!(accounts.authenticate(&login("alice", "pw1")).is_ok());
        assert!(accounts.authenticate(&login("alice", "other")).is_err());
    }

    #[test]
    fn test_register_duplicate_after_trimming() {
        let accounts = accounts();
        accounts.register(&signup("alice", "pw1")).unwrap();
        let err = accounts.register(&signup("  alice ", "pw2")).unwrap_err();
        assert!(matches!(err, Error::DuplicateUser { .. }));
    }

    #[test]
    fn test_authenticate_wrong_password() {
        let accounts = accounts();
        accounts.register(&signup("alice", "pw1")).unwrap();

        let err = accounts.authenticate(&login("alice", "wrongpw")).unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[test]
    fn test_authenticate_unknown_user() {
        let accounts = accounts();
        let err = accounts.authenticate(&login("nobody", "pw")).unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[test]
    fn test_authenticate_empty_fields() {
        let accounts = accounts();
        let err = accounts.authenticate(&login("alice", "")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_password_not_stored_in_plaintext() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let accounts = AccountStore::new(Arc::clone(&store), 1_000);
        accounts.register(&signup("alice", "hunter2")).unwrap();

        let document = store
            .find_one(USERS, &Filter::all().eq("name", "alice"))
            .unwrap()
            .unwrap();
        let body = serde_json::to_string(&document).unwrap();
        assert!(!body.contains("hunter2"));
        assert!(document.contains_key("password_hash"));
        assert!(document.contains_key("salt"));
    }

    #[test]
    fn test_exists() {
        let accounts = accounts();
        assert!(!accounts.exists("alice").unwrap());
        accounts.register(&signup("alice", "pw1")).unwrap();
        assert!(accounts.exists("alice").unwrap());
    }

    #[test]
    fn test_credential_salts_differ() {
        let a = Credential::new("same", 10);
        let b = Credential::new("same", 10);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.password_hash, b.password_hash);
        assert!(a.verify("same"));
        assert!(b.verify("same"));
    }

    #[test]
    fn test_credential_corrupt_salt() {
        let mut credential = Credential::new("pw", 10);
        credential.salt = "***".to_string();
        assert!(!credential.verify("pw"));
    }
}
