//! Who is signed in.
//!
//! [`LocalAuth`] is an in-process account registry. It publishes the
//! current [`AuthState`] on a [`watch`] channel so a session can follow
//! sign-in, sign-out and identity switches as they happen.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Shortest password accepted on sign-up.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Identity {
    /// Stable, opaque user id. Tasks are scoped by it.
    pub uid: String,
    /// Sign-in email, if the provider exposes one.
    pub email: Option<String>,
}

/// Snapshot of the authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    /// The signed-in user, if any.
    pub identity: Option<Identity>,
    /// The provider has not decided yet whether a session exists.
    pub initializing: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            identity: None,
            initializing: true,
        }
    }
}

/// Errors returned by sign-up and sign-in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The email is empty or not shaped like an address.
    #[error("That email address looks incorrect. Please check and try again.")]
    InvalidEmail,

    /// The password is shorter than [`MIN_PASSWORD_LENGTH`].
    #[error("Passwords need to be at least 6 characters long.")]
    WeakPassword,

    /// Sign-up for an email that already has an account.
    #[error("That email is already associated with an account.")]
    EmailInUse,

    /// Unknown email or wrong password.
    #[error("Double-check your email and password, then try again.")]
    InvalidCredentials,
}

struct Account {
    uid: String,
    password: String,
}

/// In-process authentication provider.
///
/// Accounts live only as long as the value. Starts out initializing until
/// the first [`restore`](Self::restore), sign-in, sign-up or sign-out.
pub struct LocalAuth {
    tx: watch::Sender<AuthState>,
    accounts: Mutex<HashMap<String, Account>>,
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuth {
    /// Creates a provider with no accounts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(AuthState::default()),
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a receiver that sees every auth state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Returns the current auth state.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Finishes initialization with a previously persisted session, if any.
    ///
    /// A restored identity is trusted as-is; its email is registered so a
    /// later sign-up for the same address is refused.
    pub fn restore(&self, identity: Option<Identity>) {
        if let Some(identity) = &identity {
            if let Some(email) = &identity.email {
                self.accounts
                    .lock()
                    .entry(normalize_email(email))
                    .or_insert_with(|| Account {
                        uid: identity.uid.clone(),
                        password: String::new(),
                    });
            }
        }
        tracing::info!(
            uid = identity.as_ref().map(|i| i.uid.as_str()),
            "auth session restored"
        );
        self.publish(identity);
    }

    /// Registers a new account and signs it in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidEmail`], [`AuthError::WeakPassword`] or
    /// [`AuthError::EmailInUse`].
    pub fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = checked_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }
        let identity = {
            let mut accounts = self.accounts.lock();
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailInUse);
            }
            let uid = uuid::Uuid::now_v7().simple().to_string();
            accounts.insert(
                email.clone(),
                Account {
                    uid: uid.clone(),
                    password: password.to_string(),
                },
            );
            Identity {
                uid,
                email: Some(email),
            }
        };
        tracing::info!(uid = %identity.uid, "account created");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    /// Signs in an existing account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidEmail`] for a malformed address and
    /// [`AuthError::InvalidCredentials`] for anything else that fails.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = checked_email(email)?;
        let identity = {
            let accounts = self.accounts.lock();
            match accounts.get(&email) {
                Some(account) if !account.password.is_empty() && account.password == password => {
                    Identity {
                        uid: account.uid.clone(),
                        email: Some(email),
                    }
                }
                _ => return Err(AuthError::InvalidCredentials),
            }
        };
        tracing::info!(uid = %identity.uid, "signed in");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    /// Signs out whoever is signed in.
    pub fn sign_out(&self) {
        tracing::info!("signed out");
        self.publish(None);
    }

    fn publish(&self, identity: Option<Identity>) {
        self.tx.send_replace(AuthState {
            identity,
            initializing: false,
        });
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn checked_email(email: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@')
    }) && !email.contains(char::is_whitespace);
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail)
    }
}
