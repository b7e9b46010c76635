//! Error types for calendar authentication.
//!
//! Each step of the authentication sequence classifies its own failures.
//! The outer boundary in [`CredentialProvider`](crate::CredentialProvider)
//! logs the error and returns it as is; it never re-classifies.

use std::fmt;
use thiserror::Error;

/// The step of the authentication sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    /// Reading, parsing or writing the persisted token file.
    TokenStorage,
    /// Reading or parsing the client registration (client secrets) file.
    ClientSecrets,
    /// The token endpoint rejected a refresh.
    Refresh,
    /// The interactive consent flow failed: port busy, user denied,
    /// state mismatch, code exchange rejected.
    Consent,
    /// A request could not be sent or its response could not be read.
    Network,
    /// A response arrived but did not have the expected shape.
    InvalidResponse,
    /// The service handle could not be built or a service call failed.
    Service,
    /// The blocking worker did not complete (panic or runtime shutdown).
    Worker,
    /// Settings or arguments were rejected before any I/O happened.
    Configuration,
}

impl AuthErrorKind {
    /// Returns a stable snake_case name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenStorage => "token_storage",
            Self::ClientSecrets => "client_secrets",
            Self::Refresh => "refresh",
            Self::Consent => "consent",
            Self::Network => "network",
            Self::InvalidResponse => "invalid_response",
            Self::Service => "service",
            Self::Worker => "worker",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while obtaining or using calendar credentials.
#[derive(Debug, Error)]
pub struct AuthError {
    kind: AuthErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn token_storage(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::TokenStorage, message)
    }

    pub fn client_secrets(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::ClientSecrets, message)
    }

    pub fn refresh(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Refresh, message)
    }

    pub fn consent(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Consent, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Network, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InvalidResponse, message)
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Service, message)
    }

    pub fn worker(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Worker, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Configuration, message)
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A specialized Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(AuthErrorKind::TokenStorage.as_str(), "token_storage");
        assert_eq!(AuthErrorKind::ClientSecrets.to_string(), "client_secrets");
        assert_eq!(AuthErrorKind::Worker.as_str(), "worker");
    }

    #[test]
    fn constructors_set_kind_and_message() {
        let err = AuthError::refresh("invalid_grant");
        assert_eq!(err.kind(), AuthErrorKind::Refresh);
        assert_eq!(err.message(), "invalid_grant");

        let err = AuthError::consent("access_denied");
        assert_eq!(err.kind(), AuthErrorKind::Consent);
    }

    #[test]
    fn display_includes_kind() {
        let err = AuthError::token_storage("failed to read token file");
        assert_eq!(err.to_string(), "token_storage: failed to read token file");
    }

    #[test]
    fn source_is_exposed() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "credentials.json");
        let err = AuthError::client_secrets("failed to read client secrets").with_source(io_err);
        assert!(err.source().is_some());
        assert!(AuthError::service("no source").source().is_none());
    }
}
