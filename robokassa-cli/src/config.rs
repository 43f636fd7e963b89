//! CLI configuration.
//!
//! Loads shop credentials from a TOML file with support for environment
//! variable expansion in string values. Variables use `$VAR` or `${VAR}`
//! syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! merchant_login = "demo"
//! password1 = "$ROBOKASSA_PASSWORD1"
//! password2 = "${ROBOKASSA_PASSWORD2}"
//! algorithm = "SHA256"
//! test = true
//! timeout_secs = 30
//! ```
//!
//! # Environment Variables
//!
//! - `ROBOKASSA_MERCHANT_LOGIN`, `ROBOKASSA_PASSWORD1`, `ROBOKASSA_PASSWORD2`,
//!   `ROBOKASSA_PASSWORD3` - Override the credentials
//! - `ROBOKASSA_ALGORITHM` - Override the signature algorithm
//! - `ROBOKASSA_TEST` - Override test mode (`1`, `true`, `yes`, `on`)

use std::path::Path;
use std::time::Duration;

use robokassa::{Credentials, RoboKassaError, SignatureAlgorithm};
use serde::{Deserialize, Serialize};

/// Errors raised while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file exists but cannot be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// An environment override holds an unusable value.
    #[error("invalid value for {var}: {value}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
    /// The resulting credentials are incomplete.
    #[error(transparent)]
    Credentials(#[from] RoboKassaError),
}

/// Top-level CLI configuration.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Shop identifier.
    #[serde(default)]
    pub merchant_login: String,

    /// Secret for outgoing requests and SuccessURL.
    #[serde(default)]
    pub password1: String,

    /// Secret for ResultURL notifications.
    #[serde(default)]
    pub password2: String,

    /// Secret for the refund service.
    #[serde(default)]
    pub password3: Option<String>,

    /// Default signature algorithm (default: `MD5`).
    #[serde(default)]
    pub algorithm: SignatureAlgorithm,

    /// Adds `IsTest=1` to payment links.
    #[serde(default)]
    pub test: bool,

    /// Per-request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Single host serving every endpoint, for sandboxes and mocks.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl CliConfig {
    /// Loads configuration from `path`. A missing file yields defaults.
    ///
    /// String values are expanded from the process environment, then the
    /// `ROBOKASSA_*` variables override file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// is invalid.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?
        } else {
            String::new()
        };

        let lookup = |name: &str| std::env::var(name).ok();
        let mut config = Self::parse(&content, lookup)?;
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Parses TOML text after expanding variables with `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid TOML.
    pub fn parse(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let expanded = expand_vars(content, lookup);
        Ok(toml::from_str(&expanded)?)
    }

    /// Applies `ROBOKASSA_*` overrides resolved through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] for an unknown algorithm or test flag.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(login) = lookup("ROBOKASSA_MERCHANT_LOGIN") {
            self.merchant_login = login;
        }
        if let Some(password) = lookup("ROBOKASSA_PASSWORD1") {
            self.password1 = password;
        }
        if let Some(password) = lookup("ROBOKASSA_PASSWORD2") {
            self.password2 = password;
        }
        if let Some(password) = lookup("ROBOKASSA_PASSWORD3") {
            self.password3 = Some(password);
        }
        if let Some(value) = lookup("ROBOKASSA_ALGORITHM") {
            self.algorithm = value.parse::<SignatureAlgorithm>().map_err(|_| ConfigError::Env {
                var: "ROBOKASSA_ALGORITHM",
                value,
            })?;
        }
        if let Some(value) = lookup("ROBOKASSA_TEST") {
            self.test = parse_flag(&value).ok_or(ConfigError::Env {
                var: "ROBOKASSA_TEST",
                value,
            })?;
        }
        Ok(())
    }

    /// Returns the per-request timeout, if configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Builds validated credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Credentials`] if login or a required password
    /// is empty.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let mut credentials =
            Credentials::new(&self.merchant_login, &self.password1, &self.password2)?
                .with_algorithm(self.algorithm)
                .with_test_mode(self.test);
        if let Some(password3) = &self.password3 {
            credentials = credentials.with_password3(password3);
        }
        Ok(credentials)
    }
}

impl std::fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliConfig")
            .field("merchant_login", &self.merchant_login)
            .field("has_password3", &self.password3.is_some())
            .field("algorithm", &self.algorithm)
            .field("test", &self.test)
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Expands `$VAR` and `${VAR}` patterns using `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    closed = true;
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        match lookup(&var_name).filter(|_| !var_name.is_empty()) {
            Some(value) => result.push_str(&value),
            None => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&var_name);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}
