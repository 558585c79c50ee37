//! Server configuration.
//!
//! Settings come from, in increasing precedence: built-in defaults, the
//! `HOST` / `PORT` environment variables, and command-line flags.

use crate::{DEFAULT_HOST, DEFAULT_PORT};
use thiserror::Error;

pub const USAGE: &str = r#"
linekv - an in-memory key-value store with a line protocol

USAGE:
    linekv-server [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Address to bind to (default: 0.0.0.0, env: HOST)
    -p, --port <PORT>    Port to listen on (default: 8080, env: PORT)
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    linekv-server                  # Listen on 0.0.0.0:8080
    PORT=9000 linekv-server        # Listen on port 9000
    linekv-server --port 9001      # Flags win over the environment
"#;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid port number: {0:?}")]
    InvalidPort(String),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Run(Config),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Parses a TCP port. Zero is accepted and means "any free port".
pub fn parse_port(s: &str) -> Result<u16, ConfigError> {
    s.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPort(s.to_string()))
}

impl Config {
    /// Reads the environment and the process arguments.
    pub fn load() -> Result<Action, ConfigError> {
        Self::from_env()?.with_args(std::env::args().skip(1))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var("HOST").ok().as_deref(),
            std::env::var("PORT").ok().as_deref(),
        )
    }

    fn from_vars(host: Option<&str>, port: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: host
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .unwrap_or(defaults.host),
            port: match port {
                Some(p) => parse_port(p)?,
                None => defaults.port,
            },
        })
    }

    /// Applies command-line flags on top of this configuration.
    pub fn with_args<I>(mut self, args: I) -> Result<Action, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    self.host = args.next().ok_or(ConfigError::MissingValue(arg))?;
                }
                "--port" | "-p" => {
                    let value = args.next().ok_or(ConfigError::MissingValue(arg))?;
                    self.port = parse_port(&value)?;
                }
                "--help" => return Ok(Action::Help),
                "--version" | "-v" => return Ok(Action::Version),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(Action::Run(self))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(None, None).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_environment_overrides() {
        let config = Config::from_vars(Some("127.0.0.1"), Some("9000")).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);

        assert_eq!(
            Config::from_vars(None, Some("eighty")),
            Err(ConfigError::InvalidPort("eighty".to_string()))
        );
    }

    #[test]
    fn test_flags_take_precedence() {
        let config = Config::from_vars(None, Some("9000")).unwrap();
        let action = config
            .with_args(args(&["--port", "9001", "-h", "localhost"]))
            .unwrap();

        assert_eq!(
            action,
            Action::Run(Config {
                host: "localhost".to_string(),
                port: 9001,
            })
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(
            Config::default().with_args(args(&["--help"])),
            Ok(Action::Help)
        );
        assert_eq!(
            Config::default().with_args(args(&["-v"])),
            Ok(Action::Version)
        );
    }

    #[test]
    fn test_bad_arguments() {
        assert_eq!(
            Config::default().with_args(args(&["--port"])),
            Err(ConfigError::MissingValue("--port".to_string()))
        );
        assert_eq!(
            Config::default().with_args(args(&["--port", "99999"])),
            Err(ConfigError::InvalidPort("99999".to_string()))
        );
        assert_eq!(
            Config::default().with_args(args(&["--verbose"])),
            Err(ConfigError::UnknownArgument("--verbose".to_string()))
        );
    }
}
