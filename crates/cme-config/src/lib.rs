//! Configuration management for the Confluence Markdown exporter.
//!
//! Parses `cme.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `auth.confluence.*`
//! - `auth.jira.*`
//!
//! ## Display
//!
//! [`Config::to_display_toml`] renders the effective configuration with
//! credentials masked.

mod expand;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override export output directory.
    pub output_path: Option<PathBuf>,
    /// Override whether the page title is emitted as a heading.
    pub include_document_title: Option<bool>,
    /// Override whether ancestor breadcrumbs are emitted.
    pub page_breadcrumbs: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "cme.toml";

/// Placeholder shown instead of credential values.
const MASK: &str = "********";

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Credentials for the wiki and issue tracker.
    pub auth: AuthConfig,
    /// Export settings.
    pub export: ExportConfig,
    /// HTTP connection behavior for the fetch layer.
    pub connection_config: ConnectionConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Credentials for both remote services.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Confluence API details.
    pub confluence: ApiDetails,
    /// Jira API details.
    pub jira: ApiDetails,
}

/// API endpoint and credentials for one service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiDetails {
    /// Base URL of the instance.
    pub url: String,
    /// Account username (usually an email address).
    pub username: String,
    /// API token paired with `username`.
    pub api_token: String,
    /// Personal access token (alternative to username + token).
    pub pat: String,
}

impl ApiDetails {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if !self.url.is_empty() {
            require_http_url(&self.url, &format!("{section}.url"))?;
        }
        Ok(())
    }

    fn expand_env_vars(&mut self, section: &str) -> Result<(), ConfigError> {
        self.url = expand::expand_env(&self.url, &format!("{section}.url"))?;
        self.username = expand::expand_env(&self.username, &format!("{section}.username"))?;
        self.api_token = expand::expand_env(&self.api_token, &format!("{section}.api_token"))?;
        self.pat = expand::expand_env(&self.pat, &format!("{section}.pat"))?;
        Ok(())
    }

    fn masked(&self) -> Self {
        let mask = |value: &str| {
            if value.is_empty() {
                String::new()
            } else {
                MASK.to_owned()
            }
        };
        Self {
            url: self.url.clone(),
            username: mask(&self.username),
            api_token: mask(&self.api_token),
            pat: mask(&self.pat),
        }
    }
}

/// How a table without header markup gets its header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableHeader {
    /// Promote the first row to the header.
    #[default]
    FirstRow,
    /// Emit an empty header row above all rows.
    Empty,
}

/// Export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory Markdown files are written to.
    pub output_path: PathBuf,
    /// Emit the page title as a top-level heading.
    pub include_document_title: bool,
    /// Emit a breadcrumb line with the page ancestors.
    pub page_breadcrumbs: bool,
    /// Marker that replaces line breaks inside table cells.
    pub table_line_break: String,
    /// Header policy for tables without header markup.
    pub table_header: TableHeader,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output"),
            include_document_title: true,
            page_breadcrumbs: true,
            table_line_break: "<br/>".to_owned(),
            table_header: TableHeader::default(),
        }
    }
}

/// Connection configuration for the fetch layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Retry failed requests with exponential backoff.
    pub backoff_and_retry: bool,
    /// Multiplier applied to the delay between retries.
    pub backoff_factor: u32,
    /// Upper bound for a single backoff delay.
    pub max_backoff_seconds: u32,
    /// Maximum number of retries.
    pub max_backoff_retries: u32,
    /// HTTP status codes that trigger a retry.
    pub retry_status_codes: Vec<u16>,
    /// Verify TLS certificates.
    pub verify_ssl: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backoff_and_retry: true,
            backoff_factor: 2,
            max_backoff_seconds: 60,
            max_backoff_retries: 5,
            retry_status_codes: vec![413, 429, 502, 503, 504],
            verify_ssl: true,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`auth.confluence.api_token`").
        field: String,
        /// Error message (e.g., "${`CONFLUENCE_TOKEN`} not set").
        message: String,
    },
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `cme.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(output_path) = &settings.output_path {
            self.export.output_path.clone_from(output_path);
        }
        if let Some(include_title) = settings.include_document_title {
            self.export.include_document_title = include_title;
        }
        if let Some(breadcrumbs) = settings.page_breadcrumbs {
            self.export.page_breadcrumbs = breadcrumbs;
        }
    }

    /// Render the configuration as TOML with credentials masked.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Serialize` if the configuration cannot be encoded.
    pub fn to_display_toml(&self) -> Result<String, ConfigError> {
        let display = Self {
            auth: AuthConfig {
                confluence: self.auth.confluence.masked(),
                jira: self.auth.jira.masked(),
            },
            ..self.clone()
        };
        Ok(toml::to_string_pretty(&display)?)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::discover_config_from(&current)
    }

    /// Search for config file starting at `start` and walking up.
    fn discover_config_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        // Validate configuration after loading and resolution
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Checks that all required fields are properly set and contain valid values.
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.confluence.validate("auth.confluence")?;
        self.auth.jira.validate("auth.jira")?;
        self.validate_export()?;
        self.validate_connection()?;
        Ok(())
    }

    /// Validate export configuration.
    fn validate_export(&self) -> Result<(), ConfigError> {
        let marker = &self.export.table_line_break;
        if marker.contains(['\n', '\r']) {
            return Err(ConfigError::Validation(
                "export.table_line_break cannot contain a newline".to_owned(),
            ));
        }
        if marker.contains('|') {
            return Err(ConfigError::Validation(
                "export.table_line_break cannot contain '|'".to_owned(),
            ));
        }
        Ok(())
    }

    /// Validate connection configuration.
    fn validate_connection(&self) -> Result<(), ConfigError> {
        let conn = &self.connection_config;

        if conn.max_backoff_seconds == 0 {
            return Err(ConfigError::Validation(
                "connection_config.max_backoff_seconds must be greater than 0".to_owned(),
            ));
        }

        if let Some(code) = conn
            .retry_status_codes
            .iter()
            .find(|code| !(100..=599).contains(*code))
        {
            return Err(ConfigError::Validation(format!(
                "connection_config.retry_status_codes contains invalid status {code}"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.auth.confluence.expand_env_vars("auth.confluence")?;
        self.auth.jira.expand_env_vars("auth.jira")?;
        Ok(())
    }

    /// Resolve a relative output path against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        if self.export.output_path.is_relative() {
            self.export.output_path = config_dir.join(&self.export.output_path);
        }
    }
}
