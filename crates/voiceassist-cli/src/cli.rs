//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use voiceassist_calendar::CalendarAuthConfig;
use voiceassist_core::{AppConfig, TracingConfig, TracingOutputFormat};

/// voiceassist - Google Calendar access for the voice assistant
#[derive(Debug, Parser)]
#[command(name = "voiceassist")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format (pretty, compact, json)
    #[arg(long)]
    pub log_format: Option<TracingOutputFormat>,

    /// Path to the persisted token file
    #[arg(long)]
    pub token_path: Option<PathBuf>,

    /// Path to the OAuth client secrets file
    #[arg(long)]
    pub credentials_path: Option<PathBuf>,

    /// Loopback port for the consent redirect
    #[arg(long)]
    pub port: Option<u16>,

    /// Print the consent URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Authentication settings: process config, then command-line overrides.
    pub fn auth_config(&self, app: &AppConfig) -> CalendarAuthConfig {
        let mut config = CalendarAuthConfig::from_app(app).with_open_browser(!self.no_browser);
        if let Some(ref path) = self.token_path {
            config = config.with_token_path(path);
        }
        if let Some(ref path) = self.credentials_path {
            config = config.with_credentials_path(path);
        }
        if let Some(port) = self.port {
            config = config.with_callback_port(port);
        }
        config
    }

    pub fn tracing_config(&self, app: &AppConfig) -> TracingConfig {
        let base = if self.debug {
            TracingConfig::cli_debug()
        } else {
            TracingConfig::default()
        };
        base.with_format(self.log_format.unwrap_or(app.log_format))
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authenticate with Google Calendar
    Auth {
        /// OAuth scope to request (can be repeated; defaults to calendar.readonly)
        #[arg(long = "scope", action = clap::ArgAction::Append)]
        scopes: Vec<String>,

        /// Discard the stored token and run the consent flow again
        #[arg(long, short)]
        force: bool,
    },

    /// Show the state of the stored token
    Status,

    /// List the calendars on your calendar list
    Calendars,

    /// List upcoming events
    Events {
        /// Calendar to read
        #[arg(long, default_value = "primary")]
        calendar: String,

        /// How many days ahead to look
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,

        /// Maximum number of events to show
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracing::Level;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("voiceassist").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parses_auth_with_scopes() {
        let cli = parse(&["auth", "--scope", "a", "--scope", "b", "--force"]);
        match cli.command {
            Command::Auth { scopes, force } => {
                assert_eq!(scopes, vec!["a".to_string(), "b".to_string()]);
                assert!(force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn events_defaults() {
        let cli = parse(&["events"]);
        match cli.command {
            Command::Events {
                calendar,
                days,
                limit,
            } => {
                assert_eq!(calendar, "primary");
                assert_eq!(days, 1);
                assert_eq!(limit, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn zero_days_is_rejected() {
        let result = Cli::try_parse_from(["voiceassist", "events", "--days", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["voiceassist"]).is_err());
    }

    #[test]
    fn flags_override_app_config() {
        let app = AppConfig {
            http_timeout: Duration::from_secs(7),
            ..AppConfig::default()
        };
        let cli = parse(&[
            "--token-path",
            "/tmp/t.json",
            "--port",
            "9090",
            "--no-browser",
            "calendars",
        ]);

        let config = cli.auth_config(&app);
        assert_eq!(config.token_path, PathBuf::from("/tmp/t.json"));
        assert_eq!(config.credentials_path, PathBuf::from("credentials.json"));
        assert_eq!(config.callback_port, 9090);
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert!(!config.open_browser);
    }

    #[test]
    fn app_config_applies_without_flags() {
        let cli = parse(&["status"]);
        let config = cli.auth_config(&AppConfig::default());
        assert_eq!(config.token_path, PathBuf::from("token.json"));
        assert_eq!(config.callback_port, 8080);
        assert!(config.open_browser);
    }

    #[test]
    fn tracing_config_follows_flags() {
        let app = AppConfig {
            log_format: TracingOutputFormat::Json,
            ..AppConfig::default()
        };

        let config = parse(&["status"]).tracing_config(&app);
        assert_eq!(config.output_format, TracingOutputFormat::Json);
        assert_eq!(config.default_level, Level::INFO);

        let config = parse(&["-v", "--log-format", "pretty", "status"]).tracing_config(&app);
        assert_eq!(config.output_format, TracingOutputFormat::Pretty);
        assert_eq!(config.default_level, Level::DEBUG);
    }
}
