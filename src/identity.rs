//! Identity and file-upload collaborators.
//!
//! Sessions only need the current user id; sign-in flows, profiles and
//! uploads are owned by whatever hosts the board. The traits here are that
//! seam. [`LocalIdentity`] is a fixed, in-process identity for the CLI and
//! tests.

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;

use async_trait::async_trait;
use canvas::doc::UserId;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("not signed in")]
    SignedOut,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Profile fields a user may change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub password: Option<String>,
}

#[async_trait]
pub trait Identity: Send + Sync {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<UserId>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, IdentityError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<UserId, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), IdentityError>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store `bytes` under `name` and return a public URL for it.
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<String, IdentityError>;
}

/// In-process identity: one user id, signed in or out, no credential check.
#[derive(Debug)]
pub struct LocalIdentity {
    user: Mutex<Option<UserId>>,
    display_name: Mutex<String>,
}

impl LocalIdentity {
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        Self { user: Mutex::new(Some(user)), display_name: Mutex::new(String::new()) }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self { user: Mutex::new(None), display_name: Mutex::new(String::new()) }
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        match self.display_name.lock() {
            Ok(name) => name.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_user(&self, user: Option<UserId>) {
        match self.user.lock() {
            Ok(mut slot) => *slot = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
    }
}

#[async_trait]
impl Identity for LocalIdentity {
    fn current_user(&self) -> Option<UserId> {
        match self.user.lock() {
            Ok(user) => *user,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, IdentityError> {
        if email.is_empty() || password.is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }
        let user = self.current_user().unwrap_or_else(Uuid::new_v4);
        self.set_user(Some(user));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<UserId, IdentityError> {
        if email.is_empty() || password.is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }
        let user = Uuid::new_v4();
        self.set_user(Some(user));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.set_user(None);
        Ok(())
    }

    /// Only the display name is kept. `LocalIdentity` holds no credentials,
    /// so a new password is validated as non-empty and then discarded.
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), IdentityError> {
        if self.current_user().is_none() {
            return Err(IdentityError::SignedOut);
        }
        if update.password.as_deref().is_some_and(str::is_empty) {
            return Err(IdentityError::InvalidCredentials);
        }
        if let Some(name) = &update.display_name {
            match self.display_name.lock() {
                Ok(mut slot) => slot.clone_from(name),
                Err(poisoned) => poisoned.into_inner().clone_from(name),
            }
        }
        Ok(())
    }
}
