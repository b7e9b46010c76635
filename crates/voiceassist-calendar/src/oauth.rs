//! OAuth 2.0 installed-app flow: consent via loopback redirect, code
//! exchange, and token refresh.
//!
//! Everything here is blocking. [`CredentialProvider`](crate::CredentialProvider)
//! calls it from tokio's blocking pool.
//!
//! # Consent flow
//!
//! 1. Load the client registration from the client secrets file
//! 2. Bind the loopback listener on the configured port
//! 3. Open the browser at the authorization URL (PKCE S256 + state)
//! 4. Wait for Google to redirect to `http://localhost:<port>/`
//! 5. Exchange the authorization code for tokens

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{CalendarAuthConfig, ClientSecrets};
use crate::error::{AuthError, AuthResult};
use crate::tokens::Credential;

/// PKCE code verifier length in bytes, before base64 encoding.
const CODE_VERIFIER_LENGTH: usize = 32;

/// The two network-facing steps of authentication.
///
/// [`InstalledAppAuthorizer`] talks to Google; tests substitute their own.
pub trait Authorizer: Send + Sync {
    /// Exchanges the credential's refresh token for a new access token,
    /// updating the credential in place.
    fn refresh(&self, credential: &mut Credential) -> AuthResult<()>;

    /// Runs the interactive consent flow and returns a brand-new credential
    /// bound to `scopes`.
    fn authorize(&self, scopes: &[String]) -> AuthResult<Credential>;
}

/// The real installed-app flow against Google's OAuth endpoints.
#[derive(Debug, Clone)]
pub struct InstalledAppAuthorizer {
    credentials_path: PathBuf,
    callback_port: u16,
    open_browser: bool,
    timeout: Duration,
}

impl InstalledAppAuthorizer {
    pub fn new(config: &CalendarAuthConfig) -> Self {
        Self {
            credentials_path: config.credentials_path.clone(),
            callback_port: config.callback_port,
            open_browser: config.open_browser,
            timeout: config.timeout,
        }
    }

    /// Blocking clients must be built and dropped off the async runtime, so
    /// one is made per call on the worker thread.
    fn http_client(&self) -> AuthResult<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| {
                AuthError::network(format!("failed to create HTTP client: {}", e)).with_source(e)
            })
    }

    fn bind_callback_listener(&self) -> AuthResult<(TcpListener, u16)> {
        let listener = TcpListener::bind(("127.0.0.1", self.callback_port)).map_err(|e| {
            AuthError::consent(format!(
                "callback port {} unavailable: {}",
                self.callback_port, e
            ))
            .with_source(e)
        })?;
        let port = listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(self.callback_port);
        debug!("callback listener bound on port {}", port);
        Ok((listener, port))
    }

    fn exchange_code(
        &self,
        secrets: &ClientSecrets,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> AuthResult<Credential> {
        let params = [
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = post_token_form(&self.http_client()?, &secrets.token_uri, &params)
            .map_err(|failure| failure.into_error(AuthError::consent, "token exchange"))?;

        info!("obtained calendar tokens from authorization code");
        Credential::from_grant(
            secrets,
            response.access_token,
            response.refresh_token,
            response.expires_in,
            scopes.to_vec(),
        )
    }

    /// Consent flow bound to a given verifier and state.
    fn authorize_with(&self, scopes: &[String], pkce: PkceFlow) -> AuthResult<Credential> {
        let secrets = ClientSecrets::from_file(&self.credentials_path)?;
        let (listener, port) = self.bind_callback_listener()?;
        let redirect_uri = format!("http://localhost:{}/", port);

        let auth_url =
            pkce.build_auth_url(&secrets.auth_uri, &secrets.client_id, &redirect_uri, scopes);

        info!("waiting for calendar authorization on port {}", port);
        debug!("authorization URL: {}", auth_url);
        eprintln!("\nPlease visit this URL to authorize this application:\n\n{}\n", auth_url);

        if self.open_browser
            && let Err(e) = open::that(&auth_url)
        {
            warn!("failed to open browser: {}", e);
        }

        let (code, received_state) = wait_for_callback(&listener)?;
        if received_state != pkce.state {
            return Err(AuthError::consent("OAuth state mismatch - possible CSRF attack"));
        }

        self.exchange_code(&secrets, &code, &pkce.verifier, &redirect_uri, scopes)
    }
}

impl Authorizer for InstalledAppAuthorizer {
    fn refresh(&self, credential: &mut Credential) -> AuthResult<()> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::refresh("credential has no refresh token"))?;

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = post_token_form(&self.http_client()?, &credential.token_uri, &params)
            .map_err(|failure| failure.into_error(AuthError::refresh, "token refresh"))?;

        credential.apply_refresh(
            response.access_token,
            response.expires_in,
            response.refresh_token,
        )?;
        debug!("access token refreshed");
        Ok(())
    }

    fn authorize(&self, scopes: &[String]) -> AuthResult<Credential> {
        self.authorize_with(scopes, PkceFlow::new())
    }
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Error body returned by Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Why a token-endpoint call failed, before it is attributed to a step.
enum TokenFailure {
    Transport(reqwest::Error),
    Rejected { status: u16, detail: String },
    Malformed(serde_json::Error),
}

impl TokenFailure {
    /// Rejections belong to the calling step; transport and parse failures
    /// keep their own kinds.
    fn into_error(self, rejected: fn(String) -> AuthError, step: &str) -> AuthError {
        match self {
            Self::Transport(e) => {
                AuthError::network(format!("{} request failed: {}", step, e)).with_source(e)
            }
            Self::Rejected { status, detail } => {
                rejected(format!("{} failed ({}): {}", step, status, detail))
            }
            Self::Malformed(e) => {
                AuthError::invalid_response(format!("invalid {} response: {}", step, e))
                    .with_source(e)
            }
        }
    }
}

fn post_token_form(
    client: &reqwest::blocking::Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse, TokenFailure> {
    let response = client
        .post(token_uri)
        .form(params)
        .send()
        .map_err(TokenFailure::Transport)?;

    let status = response.status();
    let body = response.text().map_err(TokenFailure::Transport)?;

    if !status.is_success() {
        let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => body,
        };
        return Err(TokenFailure::Rejected {
            status: status.as_u16(),
            detail,
        });
    }

    serde_json::from_str(&body).map_err(TokenFailure::Malformed)
}

const SUCCESS_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/html\r\n\
    Connection: close\r\n\r\n\
    <html><body><h1>Authorization Successful</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";

const DENIED_RESPONSE: &str = "HTTP/1.1 400 Bad Request\r\n\
    Content-Type: text/html\r\n\
    Connection: close\r\n\r\n\
    <html><body><h1>Authorization Failed</h1>\
    <p>You can close this window.</p></body></html>";

const NOT_FOUND_RESPONSE: &str = "HTTP/1.1 404 Not Found\r\n\
    Connection: close\r\n\
    Content-Length: 0\r\n\r\n";

/// Blocks until a redirect carrying `code` (or `error`) arrives.
///
/// Unrelated requests, such as a browser asking for `/favicon.ico`, are
/// answered with 404 and ignored.
fn wait_for_callback(listener: &TcpListener) -> AuthResult<(String, String)> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Some(result) = handle_callback(stream) {
                    return result;
                }
            }
            Err(e) => {
                error!("failed to accept callback connection: {}", e);
            }
        }
    }
    Err(AuthError::consent("callback listener closed"))
}

fn handle_callback(mut stream: TcpStream) -> Option<AuthResult<(String, String)>> {
    let mut request_line = String::new();
    {
        let mut reader = BufReader::new(&stream);
        if reader.read_line(&mut request_line).is_err() {
            return None;
        }
        // Consume the headers before replying.
        let mut header = String::new();
        while reader.read_line(&mut header).is_ok_and(|n| n > 0) && header.trim_end() != "" {
            header.clear();
        }
    }

    // GET /?state=...&code=...&scope=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return None;
    };
    let url = Url::parse(&format!("http://localhost{}", target)).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    let response = match (&code, &error) {
        (None, None) => {
            let _ = stream.write_all(NOT_FOUND_RESPONSE.as_bytes());
            return None;
        }
        (Some(_), None) => SUCCESS_RESPONSE,
        _ => DENIED_RESPONSE,
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    if let Some(error) = error {
        return Some(Err(AuthError::consent(format!(
            "authorization denied: {}",
            error
        ))));
    }

    code.map(|c| Ok((c, state.unwrap_or_default())))
}

/// PKCE (RFC 7636) verifier, challenge, and CSRF state for one consent flow.
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    pub fn build_auth_url(
        &self,
        auth_uri: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_uri,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}
