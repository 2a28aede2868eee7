//! Bearer credential resolution.
//!
//! The credential is opaque to this crate: it is issued elsewhere and only
//! handed to the backend during the channel handshake.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShellError};

/// Opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for empty or whitespace-only tokens.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Credential file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    pub updated_at: DateTime<Utc>,
}

/// File-based credential store with 0600 permissions on Unix.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/tenant-shell/credentials.json`, when a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tenant-shell").join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential.
    /// Returns `None` if the file doesn't exist, can't be parsed, or holds an empty token.
    pub fn load(&self) -> Option<Credential> {
        let data = fs::read(&self.path).ok()?;
        let stored: StoredCredential = match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(error) => {
                tracing::warn!(
                    target = "tenant_shell::credentials",
                    path = %self.path.display(),
                    error = %error,
                    "ignoring unreadable credential file"
                );
                return None;
            }
        };
        Credential::new(stored.token)
    }

    /// Write the credential via a temp file and rename.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stored = StoredCredential {
            token: credential.expose().to_string(),
            updated_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&stored)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &self.path).map_err(|e| {
            ShellError::InvalidConfig(format!(
                "failed to persist credentials to {}: {e}",
                self.path.display()
            ))
        })
    }
}

/// Prefer an explicit token, then the store.
pub fn resolve_credential(
    explicit: Option<&str>,
    store: Option<&CredentialStore>,
) -> Option<Credential> {
    explicit
        .and_then(Credential::new)
        .or_else(|| store.and_then(CredentialStore::load))
}
