//! Runtime configuration.
//!
//! Deployed instances are configured through the environment; a local
//! checkout usually keeps a TOML file instead:
//!
//! ```toml
//! spreadsheet_id = "1AbC..."
//! credentials_path = "/home/me/.config/sheetdo/service-account.json"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 5001
//!
//! [notify]
//! line_channel_access_token = "..."
//! line_user_id = "U123..."
//! at = "09:00"
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::NaiveTime;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_NOTIFY_AT: &str = "09:00";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub spreadsheet_id: String,
    pub credentials_path: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub line_channel_access_token: Option<String>,
    #[serde(default)]
    pub line_user_id: Option<String>,
    /// Local time of the daily reminder, `HH:MM`.
    #[serde(default = "default_notify_at")]
    pub at: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            line_channel_access_token: None,
            line_user_id: None,
            at: default_notify_at(),
        }
    }
}

fn default_notify_at() -> String {
    DEFAULT_NOTIFY_AT.to_string()
}

impl std::fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyConfig")
            .field(
                "line_channel_access_token",
                &self.line_channel_access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("line_user_id", &self.line_user_id)
            .field("at", &self.at)
            .finish()
    }
}

/// Token and recipient of an enabled notification channel.
#[derive(Clone, PartialEq, Eq)]
pub struct LineCredentials {
    pub token: String,
    pub recipient: String,
}

impl NotifyConfig {
    /// `None` when either the token or the recipient is unset or blank.
    pub fn line(&self) -> Option<LineCredentials> {
        let non_blank = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(LineCredentials {
            token: non_blank(&self.line_channel_access_token)?,
            recipient: non_blank(&self.line_user_id)?,
        })
    }

    pub fn time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.at.trim(), "%H:%M").map_err(|_| {
            StoreError::Configuration(format!(
                "notification time must be HH:MM, got {:?}",
                self.at
            ))
        })
    }
}

/// Load configuration.
///
/// The environment wins when `SPREADSHEET_ID` is set. Otherwise the TOML
/// file at `explicit`, falling back to [`crate::paths::config_file`].
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let env = |name: &str| std::env::var(name).ok();
    if let Some(config) = from_env(env)? {
        info!("Configuration loaded from environment");
        return Ok(config);
    }

    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => crate::paths::config_file().ok_or_else(|| {
            StoreError::Configuration("could not determine config path".to_string())
        })?,
    };
    let config = from_file(&path)?;
    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

pub fn from_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        StoreError::Configuration(format!(
            "cannot read config file {}: {e}; create it or set SPREADSHEET_ID",
            path.display()
        ))
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        StoreError::Configuration(format!("invalid config file {}: {e}", path.display()))
    })?;
    validate(config)
}

/// Build a config from environment variables read through `var`.
///
/// Returns `Ok(None)` when `SPREADSHEET_ID` is absent so the caller can fall
/// back to a file.
pub fn from_env<F>(var: F) -> Result<Option<Config>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(spreadsheet_id) = var("SPREADSHEET_ID").filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };

    let credentials_path = match var("GOOGLE_CREDENTIALS_JSON").filter(|v| !v.trim().is_empty()) {
        Some(inline) => materialize_credentials(&inline)?,
        None => var("GOOGLE_CREDENTIALS_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                StoreError::Configuration(
                    "set GOOGLE_CREDENTIALS_JSON or GOOGLE_CREDENTIALS_PATH".to_string(),
                )
            })?,
    };

    let mut server = ServerConfig::default();
    if let Some(host) = var("HOST") {
        server.host = host;
    }
    if let Some(port) = var("PORT") {
        server.port = port
            .trim()
            .parse()
            .map_err(|_| StoreError::Configuration(format!("PORT is not a port: {port:?}")))?;
    }

    let notify = NotifyConfig {
        line_channel_access_token: var("LINE_CHANNEL_ACCESS_TOKEN"),
        line_user_id: var("LINE_USER_ID"),
        at: var("NOTIFY_AT").unwrap_or_else(default_notify_at),
    };

    validate(Config {
        spreadsheet_id: spreadsheet_id.trim().to_string(),
        credentials_path,
        server,
        notify,
    })
    .map(Some)
}

fn validate(config: Config) -> Result<Config> {
    if config.spreadsheet_id.trim().is_empty() {
        return Err(StoreError::Configuration(
            "spreadsheet_id is empty".to_string(),
        ));
    }
    config.notify.time()?;
    if config.notify.line().is_none() {
        info!("LINE token or recipient not configured; notifications disabled");
    }
    Ok(config)
}

/// Decode an inline service-account key (raw JSON or base64 of it).
pub fn decode_inline_credentials(value: &str) -> Result<String> {
    let value = value.trim();
    if value.starts_with('{') {
        return Ok(value.to_string());
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|e| {
            StoreError::Configuration(format!("GOOGLE_CREDENTIALS_JSON is neither JSON nor base64: {e}"))
        })?;
    String::from_utf8(bytes).map_err(|_| {
        StoreError::Configuration("GOOGLE_CREDENTIALS_JSON decodes to non-UTF-8 data".to_string())
    })
}

/// Write an inline key to [`crate::paths::credentials_file`], readable by
/// the owner only.
fn materialize_credentials(inline: &str) -> Result<PathBuf> {
    let json = decode_inline_credentials(inline)?;
    let path = crate::paths::credentials_file().ok_or_else(|| {
        StoreError::Configuration("could not determine credentials path".to_string())
    })?;
    let io_err = |e: std::io::Error| {
        StoreError::Configuration(format!("cannot write {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&path).map_err(io_err)?;
    // `mode` only applies on creation; narrow a key file left by an older run.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(io_err)?;
    }
    file.write_all(json.as_bytes()).map_err(io_err)?;
    debug!("Service-account key written to {}", path.display());
    Ok(path)
}
