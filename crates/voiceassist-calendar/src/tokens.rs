//! Credential material and its on-disk storage.
//!
//! The token file uses Google's "authorized user" JSON document, so a
//! `token.json` written by other Google client libraries loads as is.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ClientSecrets, GOOGLE_TOKEN_URI};
use crate::error::{AuthError, AuthResult};

/// Tokens are treated as expired this long before their real expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth token material for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// The bearer token for API requests.
    #[serde(rename = "token", default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    pub client_id: String,

    pub client_secret: String,

    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the access token stops being accepted. `None` means unknown.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// `now + secs`, rejecting lifetimes chrono cannot represent.
fn expiry_after(secs: i64) -> AuthResult<DateTime<Utc>> {
    TimeDelta::try_seconds(secs)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            AuthError::invalid_response(format!("token lifetime out of range: {}s", secs))
        })
}

impl Credential {
    /// Builds a credential from a token-endpoint grant.
    pub fn from_grant(
        secrets: &ClientSecrets,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> AuthResult<Self> {
        Ok(Self {
            access_token: Some(access_token.into()),
            refresh_token,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes,
            expiry: expires_in_secs.map(expiry_after).transpose()?,
        })
    }

    /// True once the access token is within [`EXPIRY_SKEW_SECS`] of expiry.
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => expiry
                .checked_sub_signed(TimeDelta::seconds(EXPIRY_SKEW_SECS))
                .is_none_or(|deadline| Utc::now() >= deadline),
            None => false,
        }
    }

    /// True if the credential can authorize requests right now.
    pub fn is_valid(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty()) && !self.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// True if every scope in `required` was granted.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Replaces the access token after a successful refresh.
    ///
    /// The refresh token is only replaced when the endpoint issued a new one.
    /// The credential is left untouched if `expires_in_secs` is out of range.
    pub fn apply_refresh(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
        refresh_token: Option<String>,
    ) -> AuthResult<()> {
        let expiry = expires_in_secs.map(expiry_after).transpose()?;
        self.access_token = Some(access_token.into());
        self.expiry = expiry;
        if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_token = Some(token);
        }
        Ok(())
    }

    pub fn to_json(&self) -> AuthResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            AuthError::token_storage(format!("failed to serialize credential: {}", e))
                .with_source(e)
        })
    }

    pub fn from_json(json: &str) -> AuthResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            AuthError::token_storage(format!("failed to parse token file: {}", e)).with_source(e)
        })
    }
}

/// File-backed credential storage.
///
/// Writes replace the whole file. Two processes authenticating at the same
/// time may interleave their writes; nothing here prevents it.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the persisted credential.
    ///
    /// Returns `Ok(None)` when there is no token file; an unreadable or
    /// malformed file is an error.
    pub fn load(&self) -> AuthResult<Option<Credential>> {
        if !self.path.exists() {
            debug!("no token file at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            AuthError::token_storage(format!(
                "failed to read token file {}: {}",
                self.path.display(),
                e
            ))
            .with_source(e)
        })?;

        Credential::from_json(&content).map(Some)
    }

    pub fn save(&self, credential: &Credential) -> AuthResult<()> {
        let content = credential.to_json()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::token_storage(format!(
                    "failed to create token directory {}: {}",
                    parent.display(),
                    e
                ))
                .with_source(e)
            })?;
        }

        fs::write(&self.path, content).map_err(|e| {
            AuthError::token_storage(format!(
                "failed to write token file {}: {}",
                self.path.display(),
                e
            ))
            .with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        debug!("saved credential to {}", self.path.display());
        Ok(())
    }

    /// Removes the token file, if any.
    pub fn clear(&self) -> AuthResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                AuthError::token_storage(format!(
                    "failed to remove token file {}: {}",
                    self.path.display(),
                    e
                ))
                .with_source(e)
            })?;
        }
        Ok(())
    }
}
