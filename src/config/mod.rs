//! Configuration Management
//!
//! This module owns the persisted application state: connection profiles, the
//! enabled connection pointer, and the saved query library.
//!
//! # Backing File
//! All state lives in a single JSON document (`<home>/config.json`):
//! ```json
//! {
//!   "SECRET_KEY": "...",
//!   "CONNECTIONS": { "<id>": { "id": "...", "name": "Production", ... } },
//!   "ENABLED_CONNECTION": "<id>",
//!   "SAVED_QUERIES": { "<id>": { "id": "...", "name": "...", "text": "...", ... } }
//! }
//! ```
//!
//! # Identity
//! Connection and saved query ids are derived from the trimmed name with
//! SHA-256 (see [`derive_id`]), so the same name always maps to the same id.
//!
//! # Writes
//! The file is replaced atomically: the new document is written to a temp file
//! beside it, synced, then renamed over the old one.

mod store;

pub use store::ConfigStore;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::NaiveDateTime;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{LitehouseError, Result};

/// Config file name inside the application home
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Scratch directory name for export artifacts inside the application home
pub const DOWNLOADS_DIR_NAME: &str = "downloads";

pub const DEFAULT_AUTH_VERSION: &str = "1.0";
pub const DEFAULT_REST_VERSION: &str = "2.0";

/// Authentication mode used when opening a session against the billing API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Username and password login
    #[default]
    Basic,
    /// OAuth client credentials
    OAuth,
}

impl AuthMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::OAuth => "oauth",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = LitehouseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "oauth" => Ok(Self::OAuth),
            other => Err(LitehouseError::invalid_input(format!(
                "Unknown auth mode '{other}' (expected 'basic' or 'oauth')"
            ))),
        }
    }
}

/// Extra transport options for the billing API session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// TLS certificate bundle or verification path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<String>,
}

/// A named credential set for one billing org
///
/// WARNING: `password` and `client_secret` are sensitive. The `Debug` impl
/// redacts them; never include them in messages.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub id: String,
    pub name: String,

    /// Base URL of the org's REST API
    #[serde(rename = "url")]
    pub base_url: String,

    pub username: String,
    pub password: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    pub auth_mode: AuthMode,

    #[serde(default = "default_auth_version")]
    pub auth_version: String,

    #[serde(default = "default_rest_version")]
    pub rest_version: String,

    #[serde(default, rename = "request_args")]
    pub request_options: RequestOptions,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_mode", &self.auth_mode)
            .field("auth_version", &self.auth_version)
            .field("rest_version", &self.rest_version)
            .field("request_options", &self.request_options)
            .finish()
    }
}

fn default_auth_version() -> String {
    DEFAULT_AUTH_VERSION.to_string()
}

fn default_rest_version() -> String {
    DEFAULT_REST_VERSION.to_string()
}

/// User-supplied fields for creating or updating a connection
#[derive(Clone, Default)]
pub struct ConnectionInput {
    pub name: String,
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_mode: AuthMode,
    /// Blank or missing means [`DEFAULT_AUTH_VERSION`]
    pub auth_version: Option<String>,
    /// Blank or missing means [`DEFAULT_REST_VERSION`]
    pub rest_version: Option<String>,
    /// Blank or missing means no `verify` option
    pub cert_path: Option<String>,
}

impl ConnectionInput {
    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LitehouseError::invalid_input("Connection name cannot be empty"));
        }
        if self.base_url.trim().is_empty() {
            return Err(LitehouseError::invalid_input("Connection URL cannot be empty"));
        }
        Ok(())
    }

    /// Build the stored profile under the given id
    #[must_use]
    pub fn into_profile(self, id: String) -> ConnectionProfile {
        ConnectionProfile {
            id,
            name: self.name.trim().to_string(),
            base_url: self.base_url.trim().to_string(),
            username: self.username,
            password: self.password,
            client_id: self.client_id,
            client_secret: self.client_secret,
            auth_mode: self.auth_mode,
            auth_version: non_blank(self.auth_version).unwrap_or_else(default_auth_version),
            rest_version: non_blank(self.rest_version).unwrap_or_else(default_rest_version),
            request_options: RequestOptions {
                verify: non_blank(self.cert_path),
            },
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// A named, reusable query definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub id: String,
    pub name: String,
    pub text: String,
    pub limit: u64,
    pub offset: u64,

    /// Root entity label resolved from `text`
    pub entity: String,

    /// Local time the query was saved
    pub save_date: NaiveDateTime,
}

/// User-supplied fields for saving a query
#[derive(Debug, Clone, Default)]
pub struct QueryInput {
    pub name: String,
    pub text: String,
    pub limit: u64,
    pub offset: u64,
}

impl QueryInput {
    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LitehouseError::invalid_input("Query name cannot be empty"));
        }
        if self.text.trim().is_empty() {
            return Err(LitehouseError::invalid_input("Query text cannot be empty"));
        }
        Ok(())
    }
}

/// Process-wide persisted state
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Opaque secret generated on first run
    #[serde(rename = "SECRET_KEY")]
    pub secret_key: String,

    #[serde(rename = "CONNECTIONS", default)]
    pub connections: BTreeMap<String, ConnectionProfile>,

    /// Id of the active connection, empty when none is enabled
    #[serde(rename = "ENABLED_CONNECTION", default)]
    pub enabled_connection: String,

    #[serde(rename = "SAVED_QUERIES", default)]
    pub saved_queries: BTreeMap<String, SavedQuery>,
}

impl AppConfig {
    /// Empty configuration with a freshly generated secret key
    #[must_use]
    pub fn with_new_secret() -> Self {
        Self {
            secret_key: generate_secret_key(),
            connections: BTreeMap::new(),
            enabled_connection: String::new(),
            saved_queries: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("secret_key", &"<redacted>")
            .field("connections", &self.connections)
            .field("enabled_connection", &self.enabled_connection)
            .field("saved_queries", &self.saved_queries)
            .finish()
    }
}

/// Derive a stable id from a display name
///
/// First 16 hex digits of SHA-256 over the trimmed name. Case is significant.
#[must_use]
pub fn derive_id(name: &str) -> String {
    Sha256::digest(name.trim().as_bytes()).iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Generate a URL-safe secret from 32 bytes of OS randomness
#[must_use]
pub fn generate_secret_key() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Filesystem layout of the application home
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub home: PathBuf,
    pub config_file: PathBuf,
    pub downloads_dir: PathBuf,
}

impl AppPaths {
    /// Layout rooted at `home`
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            config_file: home.join(CONFIG_FILE_NAME),
            downloads_dir: home.join(DOWNLOADS_DIR_NAME),
            home,
        }
    }

    /// Use the explicit home if given, else `<data dir>/litehouse`
    pub fn resolve(explicit_home: Option<PathBuf>) -> Result<Self> {
        match explicit_home {
            Some(home) => Ok(Self::new(home)),
            None => {
                let data_dir = dirs::data_dir().ok_or_else(|| {
                    LitehouseError::persistence("Could not determine user data directory")
                })?;
                Ok(Self::new(data_dir.join("litehouse")))
            }
        }
    }
}

/// Read and parse an existing config file
pub fn read_config(path: &Path) -> Result<AppConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|e| LitehouseError::persistence(format!("Could not read config file: {e}")))?;

    serde_json::from_str(&contents)
        .map_err(|e| LitehouseError::persistence(format!("Invalid config file format: {e}")))
}

/// Load the config file, creating it with defaults on first run
///
/// A new file gets a freshly generated secret key and is written immediately,
/// so later loads see the same secret.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        debug!(path = %path.display(), "loading config file");
        let config = read_config(path)?;
        info!(
            connections = config.connections.len(),
            saved_queries = config.saved_queries.len(),
            "config loaded"
        );
        return Ok(config);
    }

    info!(path = %path.display(), "config file not found, creating");
    let config = AppConfig::with_new_secret();
    save_config(path, &config)?;
    Ok(config)
}

/// Atomically replace the config file with `config`
pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            LitehouseError::persistence(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(config)
        .map_err(|e| LitehouseError::persistence(format!("Could not serialize config: {e}")))?;

    let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

    let written = File::create(&temp_path).and_then(|mut file| {
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(LitehouseError::persistence(format!("Could not write config file: {e}")));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        LitehouseError::persistence(format!("Could not replace config file: {e}"))
    })?;

    debug!(path = %path.display(), "config saved");
    Ok(())
}
