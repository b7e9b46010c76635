//! Authentication configuration and client registration parsing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use voiceassist_core::AppConfig;

use crate::error::{AuthError, AuthResult};

/// Google OAuth endpoints used when the client secrets file omits them.
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client registration, as downloaded from the Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

/// Accepted layouts of the client secrets file: an `installed` or `web`
/// section, or the two keys at root level.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<RegistrationSection>,
    web: Option<RegistrationSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegistrationSection {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl ClientSecrets {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::client_secrets(format!(
                "failed to read client secrets {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> AuthResult<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json).map_err(|e| {
            AuthError::client_secrets(format!("failed to parse client secrets: {}", e))
                .with_source(e)
        })?;

        let secrets = if let Some(section) = file.installed.or(file.web) {
            Self {
                client_id: section.client_id,
                client_secret: section.client_secret,
                auth_uri: section.auth_uri.unwrap_or_else(|| GOOGLE_AUTH_URI.to_string()),
                token_uri: section.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URI.to_string()),
            }
        } else if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret)
        {
            Self {
                client_id,
                client_secret,
                auth_uri: file.auth_uri.unwrap_or_else(|| GOOGLE_AUTH_URI.to_string()),
                token_uri: file.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URI.to_string()),
            }
        } else {
            return Err(AuthError::client_secrets(
                "client secrets must contain an 'installed'/'web' section \
                 or root-level 'client_id'/'client_secret'",
            ));
        };

        secrets.validate()?;
        Ok(secrets)
    }

    pub fn validate(&self) -> AuthResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::client_secrets("client_id is empty"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(AuthError::client_secrets("client_secret is empty"));
        }
        Ok(())
    }
}

/// Settings for [`CredentialProvider`](crate::CredentialProvider).
#[derive(Debug, Clone)]
pub struct CalendarAuthConfig {
    /// Persisted authorized-user token document.
    pub token_path: PathBuf,
    /// Client registration used by the consent flow.
    pub credentials_path: PathBuf,
    /// Loopback port receiving the OAuth redirect.
    pub callback_port: u16,
    /// Scopes requested when the caller passes none.
    pub scopes: Vec<String>,
    /// Timeout for token-endpoint and API requests.
    pub timeout: Duration,
    /// Launch the system browser during consent. When false the URL is only
    /// printed.
    pub open_browser: bool,
    /// Base URL of the calendar API.
    pub api_base: String,
}

impl CalendarAuthConfig {
    /// Read-only access to calendars and events.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.readonly";
    pub const API_NAME: &'static str = "calendar";
    pub const API_VERSION: &'static str = "v3";
    pub const DEFAULT_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";

    pub fn from_app(app: &AppConfig) -> Self {
        Self::default()
            .with_token_path(&app.token_path)
            .with_credentials_path(&app.credentials_path)
            .with_callback_port(app.callback_port)
            .with_timeout(app.http_timeout)
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.scopes.is_empty() {
            return Err("at least one default OAuth scope is required".to_string());
        }
        if self.scopes.iter().any(|s| s.trim().is_empty()) {
            return Err("OAuth scopes must not be blank".to_string());
        }
        if self.timeout.is_zero() {
            return Err("HTTP timeout must be positive".to_string());
        }
        if self.api_base.trim().is_empty() {
            return Err("calendar API base URL is required".to_string());
        }
        Ok(())
    }
}

impl Default for CalendarAuthConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from(AppConfig::DEFAULT_TOKEN_PATH),
            credentials_path: PathBuf::from(AppConfig::DEFAULT_CREDENTIALS_PATH),
            callback_port: AppConfig::DEFAULT_CALLBACK_PORT,
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            timeout: Duration::from_secs(AppConfig::DEFAULT_HTTP_TIMEOUT_SECS),
            open_browser: true,
            api_base: Self::DEFAULT_API_BASE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthErrorKind;

    #[test]
    fn secrets_from_installed_section() {
        let json = r#"{
            "installed": {
                "client_id": "test-id.apps.googleusercontent.com",
                "project_id": "my-project",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "test-secret",
                "redirect_uris": ["http://localhost"]
            }
        }"#;

        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.client_id, "test-id.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret, "test-secret");
        assert_eq!(secrets.token_uri, GOOGLE_TOKEN_URI);
    }

    #[test]
    fn secrets_from_web_section_with_custom_token_uri() {
        let json = r#"{
            "web": {
                "client_id": "web-id",
                "client_secret": "web-secret",
                "token_uri": "http://127.0.0.1:9999/token"
            }
        }"#;

        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.client_id, "web-id");
        assert_eq!(secrets.token_uri, "http://127.0.0.1:9999/token");
        assert_eq!(secrets.auth_uri, GOOGLE_AUTH_URI);
    }

    #[test]
    fn secrets_from_flat_layout() {
        let json = r#"{"client_id": "flat-id", "client_secret": "flat-secret"}"#;
        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets, ClientSecrets::new("flat-id", "flat-secret"));
    }

    #[test]
    fn secrets_without_client_fields() {
        let err = ClientSecrets::from_json(r#"{ "other": {} }"#).unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::ClientSecrets);
        assert!(err.message().contains("client_id"));
    }

    #[test]
    fn secrets_malformed_json() {
        let err = ClientSecrets::from_json("not json").unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::ClientSecrets);
        assert!(err.message().contains("parse"));
    }

    #[test]
    fn secrets_with_empty_secret() {
        let err = ClientSecrets::from_json(r#"{"client_id": "id", "client_secret": " "}"#)
            .unwrap_err();
        assert_eq!(err.message(), "client_secret is empty");
    }

    #[test]
    fn secrets_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientSecrets::from_file(dir.path().join("credentials.json")).unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::ClientSecrets);
    }

    #[test]
    fn config_defaults() {
        let config = CalendarAuthConfig::default();
        assert_eq!(config.token_path, PathBuf::from("token.json"));
        assert_eq!(config.credentials_path, PathBuf::from("credentials.json"));
        assert_eq!(config.callback_port, 8080);
        assert_eq!(config.scopes, vec![CalendarAuthConfig::DEFAULT_SCOPE.to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_from_app() {
        let app = AppConfig {
            token_path: PathBuf::from("/var/lib/va/token.json"),
            callback_port: 9000,
            http_timeout: Duration::from_secs(3),
            ..AppConfig::default()
        };

        let config = CalendarAuthConfig::from_app(&app);
        assert_eq!(config.token_path, PathBuf::from("/var/lib/va/token.json"));
        assert_eq!(config.callback_port, 9000);
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn config_validation() {
        assert!(CalendarAuthConfig::default().with_scopes(vec![]).validate().is_err());
        assert!(
            CalendarAuthConfig::default()
                .with_scopes(vec![String::new()])
                .validate()
                .is_err()
        );
        assert!(
            CalendarAuthConfig::default()
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
