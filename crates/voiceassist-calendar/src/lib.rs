//! Google Calendar authentication for voiceassist.
//!
//! [`CredentialProvider::authenticate`] turns a set of OAuth scopes into a
//! ready-to-use [`CalendarService`]:
//!
//! 1. A persisted credential is loaded from `token.json` if present
//! 2. An expired credential with a refresh token is refreshed silently
//! 3. Otherwise the installed-app consent flow runs: browser, loopback
//!    redirect on a fixed port, code exchange
//! 4. The refreshed or new credential is written back to `token.json`
//! 5. A service handle bound to the credential and API `calendar/v3` is built
//!
//! The whole sequence blocks on file and network I/O, so it runs on tokio's
//! blocking pool and the caller only awaits the result.
//!
//! # Example
//!
//! ```ignore
//! use voiceassist_calendar::{CalendarAuthConfig, CredentialProvider};
//! use voiceassist_core::AppConfig;
//!
//! let app = AppConfig::load()?;
//! let provider = CredentialProvider::new(CalendarAuthConfig::from_app(&app))?;
//! let service = provider.authenticate(None).await?;
//! let calendars = service.list_calendars().await?;
//! ```

pub mod config;
pub mod error;
pub mod oauth;
pub mod provider;
pub mod service;
pub mod tokens;

pub use config::{CalendarAuthConfig, ClientSecrets};
pub use error::{AuthError, AuthErrorKind, AuthResult};
pub use oauth::{Authorizer, InstalledAppAuthorizer, PkceFlow};
pub use provider::{CredentialProvider, TokenStatus};
pub use service::{CalendarEvent, CalendarListEntry, CalendarService, EventTime};
pub use tokens::{Credential, TokenStore};
