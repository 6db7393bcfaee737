//! Credential pool and the cyclic cursor the controller rotates through.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the remote server authenticates an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Cracked/offline-mode servers; the label is the whole identity.
    #[default]
    Offline,
    /// Legacy `mojang` configs authenticate the same way; those accounts
    /// were migrated.
    #[serde(alias = "mojang")]
    Microsoft,
}

impl AuthMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Microsoft => "microsoft",
        }
    }
}

/// A secret value that never shows up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: Secret,
    pub auth: AuthMode,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: Secret, auth: AuthMode) -> Self {
        Self {
            username: username.into(),
            password,
            auth,
        }
    }
}

/// Ordered, cyclic collection of credentials.
///
/// `cursor` always points at the credential the next session will use.
#[derive(Debug, Clone)]
pub struct CredentialRing {
    credentials: Vec<Credential>,
    cursor: usize,
}

impl CredentialRing {
    /// Build a ring. Returns `None` for an empty pool; callers that load from
    /// configuration turn that into a `ConfigError`.
    pub fn new(credentials: Vec<Credential>) -> Option<Self> {
        if credentials.is_empty() {
            return None;
        }
        Some(Self {
            credentials,
            cursor: 0,
        })
    }

    #[must_use]
    pub fn current(&self) -> &Credential {
        &self.credentials[self.cursor]
    }

    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.credentials.len();
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false; a ring cannot be constructed empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }
}
