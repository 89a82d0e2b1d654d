//! Backend trait for authentication and user lookup.
//!
//! The autodiscover service never checks passwords itself. It asks a
//! [`Backend`] whether a login is valid and which attributes the directory
//! holds for the user. Implement this trait to connect a mail store, LDAP
//! directory or IMAP server.
//!
//! # Examples
//!
//! ```rust
//! use activesync_autodiscover::backend::{Backend, InMemoryBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = InMemoryBackend::new();
//! backend.add_user("jdoe", "secret").await;
//! backend.set_attribute("jdoe", "fullname", "Jane Doe").await;
//!
//! assert!(backend.logon("jdoe", "", "secret").await?);
//! let details = backend.get_user_details("jdoe").await?;
//! assert_eq!(details.fullname(), Some("Jane Doe"));
//! # Ok(())
//! # }
//! ```

use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Attribute key holding the user's primary email address.
pub const ATTR_EMAIL_ADDRESS: &str = "emailaddress";

/// Attribute key holding the user's display name.
pub const ATTR_FULLNAME: &str = "fullname";

/// Attributes a backend knows about a user.
///
/// Any attribute may be missing; a backend that knows nothing about the user
/// returns an empty map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDetails {
    attributes: HashMap<String, String>,
}

impl UserDetails {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute, returning the map for chaining.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Get an attribute if it is present and not blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn email_address(&self) -> Option<&str> {
        self.get(ATTR_EMAIL_ADDRESS)
    }

    pub fn fullname(&self) -> Option<&str> {
        self.get(ATTR_FULLNAME)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl From<HashMap<String, String>> for UserDetails {
    fn from(attributes: HashMap<String, String>) -> Self {
        Self { attributes }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserDetails {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            attributes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Authentication and directory capability consumed by the handler.
///
/// Both calls may be slow; the handler imposes no timeout and never retries.
pub trait Backend {
    /// Error type returned by backend operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Check a login.
    ///
    /// # Arguments
    /// * `username` - Derived login name
    /// * `domain` - Login domain, empty when the login carries none
    /// * `password` - Password as sent by the device
    ///
    /// # Returns
    /// `Ok(false)` for rejected credentials, errors for backend failures
    fn logon(
        &self,
        username: &str,
        domain: &str,
        password: &str,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Look up directory attributes of an authenticated user.
    fn get_user_details(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<UserDetails, Self::Error>> + Send;
}

/// Errors raised by [`InMemoryBackend`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryBackendError {
    #[error("Unknown user '{username}'")]
    UnknownUser {
        /// The login name that was looked up
        username: String,
    },
}

#[derive(Debug, Clone)]
struct StoredUser {
    password_hash: String,
    details: UserDetails,
}

/// Backend keeping users in memory.
///
/// Passwords are stored as SHA-256 digests. Intended for tests, demos and
/// small fixed deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    users: Arc<RwLock<HashMap<String, StoredUser>>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user.
    pub async fn add_user(&self, username: &str, password: &str) {
        let mut users = self.users.write().await;
        let details = users
            .remove(username)
            .map(|user| user.details)
            .unwrap_or_default();
        users.insert(
            username.to_string(),
            StoredUser {
                password_hash: hash_password(password),
                details,
            },
        );
    }

    /// Set a directory attribute on an existing user.
    pub async fn set_attribute(
        &self,
        username: &str,
        name: &str,
        value: &str,
    ) -> Result<(), InMemoryBackendError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(username)
            .ok_or_else(|| InMemoryBackendError::UnknownUser {
                username: username.to_string(),
            })?;
        user.details.insert(name, value);
        Ok(())
    }

    /// Remove a user, returning whether it existed.
    pub async fn remove_user(&self, username: &str) -> bool {
        self.users.write().await.remove(username).is_some()
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

impl Backend for InMemoryBackend {
    type Error = InMemoryBackendError;

    async fn logon(&self, username: &str, domain: &str, password: &str) -> Result<bool, Self::Error> {
        let users = self.users.read().await;
        let valid = users
            .get(username)
            .is_some_and(|user| user.password_hash == hash_password(password));
        debug!(
            "InMemoryBackend logon for '{}' (domain '{}'): {}",
            username,
            domain,
            if valid { "accepted" } else { "rejected" }
        );
        Ok(valid)
    }

    async fn get_user_details(&self, username: &str) -> Result<UserDetails, Self::Error> {
        let users = self.users.read().await;
        users
            .get(username)
            .map(|user| user.details.clone())
            .ok_or_else(|| InMemoryBackendError::UnknownUser {
                username: username.to_string(),
            })
    }
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}
