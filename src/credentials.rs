//! Credential lookup and bearer token resolution

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;

use crate::error::CredentialError;

/// A credential as held by a store
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// A bare secret, usable as a bearer token
    SecretText(String),
    UsernamePassword { username: String, password: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecretText(_) => f.write_str("SecretText(****)"),
            Self::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Bearer token sent with every message
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(****)")
    }
}

/// Somewhere credentials can be looked up by id
pub trait CredentialStore {
    fn find(&self, id: &str) -> Option<Credential>;
}

/// Resolve `credential_id` to a token.
pub fn resolve_token(
    store: &dyn CredentialStore,
    credential_id: Option<&str>,
) -> Result<Token, CredentialError> {
    let id = credential_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(CredentialError::Missing)?;

    match store.find(id).ok_or(CredentialError::Missing)? {
        Credential::SecretText(secret) if secret.is_empty() => Err(CredentialError::EmptySecret),
        Credential::SecretText(secret) => Ok(Token(secret)),
        Credential::UsernamePassword { .. } => Err(CredentialError::InvalidType),
    }
}

/// One `[credentials.<id>]` entry of the config file
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialEntry {
    SecretText {
        /// Secret stored inline
        #[serde(default)]
        secret: Option<String>,
        /// Name of an environment variable holding the secret
        #[serde(default)]
        secret_env: Option<String>,
    },
    UsernamePassword {
        username: String,
        #[serde(default)]
        password: String,
    },
}

/// Credentials declared in the config file.
///
/// Secrets referenced through `secret_env` are read from the process
/// environment at lookup time, never stored.
#[derive(Debug, Clone, Default)]
pub struct ConfigCredentialStore {
    entries: HashMap<String, CredentialEntry>,
}

impl ConfigCredentialStore {
    pub fn new(entries: HashMap<String, CredentialEntry>) -> Self {
        Self { entries }
    }
}

impl CredentialStore for ConfigCredentialStore {
    fn find(&self, id: &str) -> Option<Credential> {
        match self.entries.get(id)? {
            CredentialEntry::SecretText { secret, secret_env } => {
                let value = match (secret, secret_env) {
                    (Some(secret), _) => secret.clone(),
                    (None, Some(var)) => env::var(var).unwrap_or_default(),
                    (None, None) => String::new(),
                };
                Some(Credential::SecretText(value))
            }
            CredentialEntry::UsernamePassword { username, password } => {
                Some(Credential::UsernamePassword {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
        }
    }
}

/// Looks a credential id up as an environment variable name.
///
/// Used when the config file declares no `[credentials]` table, so
/// `credentials_id = "SPARK_TOKEN"` reads `$SPARK_TOKEN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn find(&self, id: &str) -> Option<Credential> {
        env::var(id).ok().map(Credential::SecretText)
    }
}

impl CredentialStore for HashMap<String, Credential> {
    fn find(&self, id: &str) -> Option<Credential> {
        self.get(id).cloned()
    }
}
