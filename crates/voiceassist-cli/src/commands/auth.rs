//! Authentication commands.

use tracing::info;

use voiceassist_calendar::{CredentialProvider, TokenStatus};

use crate::error::CliResult;

/// Runs the authentication sequence and reports the granted scopes.
///
/// With an empty `scopes` list the configured default scope is requested.
/// A valid stored token is kept unless `force` is set or it lacks one of the
/// requested scopes.
pub async fn login(
    provider: &CredentialProvider,
    scopes: Vec<String>,
    force: bool,
) -> CliResult<()> {
    if force {
        provider.forget()?;
    } else if let Some(stored) = provider.token_store().load()?
        && stored.is_valid()
    {
        if stored.has_scopes(&scopes) {
            println!("Already authenticated with Google Calendar.");
            println!("Use --force to re-authenticate.");
            return Ok(());
        }
        info!("stored token does not cover the requested scopes, re-authenticating");
        provider.forget()?;
    }

    println!("Starting Google Calendar authentication...");
    println!();
    println!("If no valid token is stored, a browser window will open to authorize access.");
    println!("If the browser doesn't open, check the terminal for a URL to copy.");
    println!();

    let scopes = (!scopes.is_empty()).then_some(scopes);
    let service = provider.authenticate(scopes).await?;

    info!("google authentication successful");
    println!("Authentication successful!");
    println!("Token saved to {}", provider.config().token_path.display());
    println!("Granted scopes: {}", service.scopes().join(", "));

    Ok(())
}

/// Prints the state of the stored token without touching the network.
pub fn status(provider: &CredentialProvider) -> CliResult<()> {
    let status = provider.token_status()?;
    println!(
        "{}: {}",
        provider.config().token_path.display(),
        describe(status)
    );
    Ok(())
}

fn describe(status: TokenStatus) -> &'static str {
    match status {
        TokenStatus::Missing => "no token stored; run `voiceassist auth`",
        TokenStatus::Valid => "valid",
        TokenStatus::Refreshable => "expired, will be refreshed on next use",
        TokenStatus::Expired => "expired, re-authentication required",
    }
}
