use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use log::debug;
use serde::Deserialize;

use crate::error_handling::types::ConfigError;

/// Default time limit for capture service requests.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Application configuration: how to reach the capture service.
///
/// Values come from an optional TOML configuration file and can be overridden
/// on the command line or through environment variables, see [`GlobalArgs`].
///
/// # Examples
///
/// ```toml
/// host = "https://capture.example.org:5001"
/// token = "s3cr3t"
/// request_timeout_secs = 10
/// insecure = true
/// ```
///
/// # Fields Overview
///
/// - `host`: capture service URL; plain `host:port` gets `http://` prepended
/// - `token`: optional bearer token sent with every request
/// - `request_timeout_secs`: time limit for discovery and for connecting a
///   capture; `0` means no limit
/// - `insecure`: skip TLS server certificate verification
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: Option<String>,
    pub token: Option<String>,
    pub request_timeout_secs: u64,
    pub insecure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            insecure: false,
        }
    }
}

/// Options common to all capture service clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    pub bearer_token: Option<String>,
    /// `None` for no time limit.
    pub timeout: Option<Duration>,
    pub insecure_skip_verify: bool,
}

/// Command line flags shared by all commands.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Capture service URL or host:port
    #[arg(long, global = true, env = "SHARKLINE_HOST")]
    pub host: Option<String>,

    /// Bearer token for authenticating with the capture service
    #[arg(long, global = true, env = "SHARKLINE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Time limit in seconds for service requests; 0 for no limit
    #[arg(long, global = true)]
    pub request_timeout_secs: Option<u64>,

    /// Skip TLS server certificate verification
    #[arg(short = 'k', long, global = true, action = clap::ArgAction::SetTrue)]
    pub insecure: bool,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub debug: bool,
}

impl Config {
    /// Builds the configuration from the optional configuration file, with
    /// command line values taking precedence.
    pub fn load(args: &GlobalArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(host) = &args.host {
            config.host = Some(host.clone());
        }
        if let Some(token) = &args.token {
            config.token = Some(token.clone());
        }
        if let Some(secs) = args.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        config.insecure |= args.insecure;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("reading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(host) = &self.host {
            if host.trim().is_empty() {
                return Err(ConfigError::InvalidValue("host must not be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            bearer_token: self.token.clone().filter(|t| !t.is_empty()),
            timeout: match self.request_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            insecure_skip_verify: self.insecure,
        }
    }
}
