//! voiceassist CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use voiceassist_calendar::CredentialProvider;
use voiceassist_cli::cli::{Cli, Command};
use voiceassist_cli::commands::{auth, calendars};
use voiceassist_cli::error::CliResult;
use voiceassist_core::{init_tracing, AppConfig, TimingInstrument};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let app = AppConfig::load()?;
    init_tracing(cli.tracing_config(&app))?;

    let provider = CredentialProvider::new(cli.auth_config(&app))?;
    let timing = TimingInstrument::default();

    match cli.command {
        Command::Auth { scopes, force } => auth::login(&provider, scopes, force).await,
        Command::Status => auth::status(&provider),
        Command::Calendars => calendars::calendars(&provider, &timing).await,
        Command::Events {
            calendar,
            days,
            limit,
        } => calendars::events(&provider, &timing, calendar, days, limit).await,
    }
}
