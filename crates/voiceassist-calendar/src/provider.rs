//! Scopes in, authenticated calendar service out.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::CalendarAuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::oauth::{Authorizer, InstalledAppAuthorizer};
use crate::service::CalendarService;
use crate::tokens::TokenStore;

/// State of the persisted credential, as seen without touching the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// No token file.
    Missing,
    /// Usable as is.
    Valid,
    /// Expired, but a refresh token is present.
    Refreshable,
    /// Unusable; the next authentication runs the consent flow.
    Expired,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Valid => "valid",
            Self::Refreshable => "refreshable",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces [`CalendarService`] handles, reusing, refreshing or replacing the
/// persisted credential as needed.
pub struct CredentialProvider {
    config: Arc<CalendarAuthConfig>,
    authorizer: Arc<dyn Authorizer>,
}

impl CredentialProvider {
    /// Creates a provider backed by Google's installed-app flow.
    pub fn new(config: CalendarAuthConfig) -> AuthResult<Self> {
        let authorizer = InstalledAppAuthorizer::new(&config);
        Self::with_authorizer(config, authorizer)
    }

    /// Creates a provider with a custom refresh/consent implementation.
    pub fn with_authorizer(
        config: CalendarAuthConfig,
        authorizer: impl Authorizer + 'static,
    ) -> AuthResult<Self> {
        config.validate().map_err(AuthError::configuration)?;
        Ok(Self {
            config: Arc::new(config),
            authorizer: Arc::new(authorizer),
        })
    }

    pub fn config(&self) -> &CalendarAuthConfig {
        &self.config
    }

    pub fn token_store(&self) -> TokenStore {
        TokenStore::new(&self.config.token_path)
    }

    /// Returns an authenticated calendar service.
    ///
    /// `None` requests the configured default scopes. The work runs on the
    /// blocking pool; the caller is suspended until it finishes. Any failure
    /// is logged once at error level and returned unchanged.
    pub async fn authenticate(&self, scopes: Option<Vec<String>>) -> AuthResult<CalendarService> {
        let scopes = scopes.unwrap_or_else(|| self.config.scopes.clone());
        let config = Arc::clone(&self.config);
        let authorizer = Arc::clone(&self.authorizer);

        let outcome = tokio::task::spawn_blocking(move || {
            authenticate_blocking(&config, authorizer.as_ref(), scopes)
        })
        .await
        .unwrap_or_else(|e| {
            Err(AuthError::worker(format!(
                "authentication worker did not complete: {}",
                e
            )))
        });

        match outcome {
            Ok(service) => {
                info!("calendar service authenticated successfully");
                Ok(service)
            }
            Err(e) => {
                error!(error = %e, "failed to authenticate calendar service");
                Err(e)
            }
        }
    }

    /// Inspects the persisted credential.
    pub fn token_status(&self) -> AuthResult<TokenStatus> {
        let status = match self.token_store().load()? {
            None => TokenStatus::Missing,
            Some(c) if c.is_valid() => TokenStatus::Valid,
            Some(c) if c.is_expired() && c.can_refresh() => TokenStatus::Refreshable,
            Some(_) => TokenStatus::Expired,
        };
        Ok(status)
    }

    /// Deletes the persisted credential so the next authentication starts
    /// with the consent flow.
    pub fn forget(&self) -> AuthResult<()> {
        let store = self.token_store();
        store.clear()?;
        info!("removed calendar credentials at {}", store.path().display());
        Ok(())
    }
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Load, then refresh or re-authorize, then persist, then build the handle.
fn authenticate_blocking(
    config: &CalendarAuthConfig,
    authorizer: &dyn Authorizer,
    scopes: Vec<String>,
) -> AuthResult<CalendarService> {
    if scopes.is_empty() || scopes.iter().any(|s| s.trim().is_empty()) {
        return Err(AuthError::configuration(
            "at least one non-blank scope is required",
        ));
    }

    let store = TokenStore::new(&config.token_path);
    let mut candidate = store.load()?;
    if let Some(ref mut credential) = candidate {
        // The requested scopes replace whatever the file recorded.
        credential.scopes = scopes.clone();
        info!("loaded calendar credentials from {}", store.path().display());
    }

    let credential = match candidate {
        Some(credential) if credential.is_valid() => credential,
        candidate => {
            let credential = match candidate {
                Some(mut credential) if credential.is_expired() && credential.can_refresh() => {
                    info!("refreshing expired calendar credentials");
                    authorizer.refresh(&mut credential)?;
                    credential
                }
                _ => {
                    info!("initiating new calendar authentication flow");
                    authorizer.authorize(&scopes)?
                }
            };
            store.save(&credential)?;
            info!("saved calendar credentials to {}", store.path().display());
            credential
        }
    };

    CalendarService::new(credential, &config.api_base, config.timeout)
}
