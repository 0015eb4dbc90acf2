//! Configuration management for Konyx.
//!
//! Loads configuration from ${KONYX_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `backend_url`.
pub const BACKEND_URL_ENV: &str = "KONYX_BACKEND_URL";

/// Where the session token is kept between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// `$KONYX_HOME/session.json`, survives process restarts
    #[default]
    File,
    /// Process memory only; gone when the process exits
    Memory,
}

impl StorageMode {
    pub fn display_name(self) -> &'static str {
        match self {
            StorageMode::File => "file",
            StorageMode::Memory => "memory",
        }
    }
}

/// Session handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub storage: StorageMode,
    /// Confirm a stored token against `/auth/verify` on startup.
    pub verify: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage: StorageMode::File,
            verify: true,
        }
    }
}

/// Route table used by the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Login view paths. The first one is the redirect target.
    pub login_paths: Vec<String>,
    /// Landing path for authenticated sessions.
    pub default: String,
    /// Path prefixes that require authentication.
    pub protected: Vec<String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            login_paths: vec!["/".to_string(), "/login".to_string()],
            default: "/dashboard".to_string(),
            protected: vec!["/dashboard".to_string()],
        }
    }
}

impl RoutesConfig {
    /// Path anonymous sessions are redirected to.
    pub fn login_path(&self) -> &str {
        self.login_paths.first().map_or("/", String::as_str)
    }

    pub fn is_login(&self, path: &str) -> bool {
        self.login_paths.iter().any(|p| p == path)
    }

    /// Prefix match on segment boundaries: `/dashboard` guards
    /// `/dashboard` and `/dashboard/export` but not `/dashboards`.
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            match path.strip_prefix(prefix) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        })
    }
}

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Lays the user's `config.toml` over the shipped template.
///
/// Keys such as `backend_url`, `company` and the `[session]`/`[routes]`
/// entries keep the user's values; template comments survive the rewrite.
fn overlay_on_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;

    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    overlay_table(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Copies every key of `user` into `template`, descending into tables.
fn overlay_table(template: &mut toml_edit::Table, user: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, item) in user {
        match (item, template.get_mut(key)) {
            (Item::None, _) => {}
            (Item::Table(user_section), Some(Item::Table(section))) => {
                overlay_table(section, user_section);
            }
            _ => template[key] = item.clone(),
        }
    }
}

pub mod paths {
    //! Path resolution for Konyx configuration and session files.
    //!
    //! `KONYX_HOME` resolution order:
    //! 1. `KONYX_HOME` environment variable (if set)
    //! 2. ~/.config/konyx (default)

    use std::path::PathBuf;

    /// Returns the Konyx home directory.
    pub fn konyx_home() -> PathBuf {
        if let Ok(home) = std::env::var("KONYX_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".konyx"),
            |h| h.join(".config").join("konyx"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        konyx_home().join("config.toml")
    }

    /// Returns the path to the persisted session token.
    pub fn session_path() -> PathBuf {
        konyx_home().join("session.json")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL (env `KONYX_BACKEND_URL` wins)
    pub backend_url: Option<String>,

    /// Selected company id, sent as `X-Company`
    pub company: Option<String>,

    /// HTTP timeout in seconds (0 disables)
    pub timeout_secs: u64,

    /// Optional log file; stderr when unset
    pub log_file: Option<String>,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub routes: RoutesConfig,
}

impl Config {
    pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
    const DEFAULT_TIMEOUT_SECS: u64 = 15;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the backend base URL with precedence: env > config > default.
    ///
    /// Trailing slashes are stripped so endpoint paths can be appended.
    ///
    /// # Errors
    /// Returns an error if the chosen URL is not well-formed.
    pub fn backend_url(&self) -> Result<String> {
        let from_env = std::env::var(BACKEND_URL_ENV).ok();
        let candidates = [from_env.as_deref(), self.backend_url.as_deref()];

        let chosen = candidates
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(Self::DEFAULT_BACKEND_URL);

        url::Url::parse(chosen).with_context(|| format!("Invalid backend URL: {chosen}"))?;
        Ok(chosen.trim_end_matches('/').to_string())
    }

    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }

    /// Saves only the company field to the config file.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, parsed or written.
    pub fn save_company(company: &str) -> Result<()> {
        Self::save_company_to(&paths::config_path(), company)
    }

    /// Saves only the company field to a specific config file path.
    ///
    /// Creates the file with the default template if it doesn't exist.
    /// If the file exists, merges user values into the latest template.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, parsed or written.
    pub fn save_company_to(path: &Path, company: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            overlay_on_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["company"] = value(company);

        Self::write_config(path, &doc.to_string())
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Replaces `config.toml` through a `.toml.tmp` sibling and a rename.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            company: None,
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            log_file: None,
            session: SessionConfig::default(),
            routes: RoutesConfig::default(),
        }
    }
}
