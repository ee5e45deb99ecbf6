//! Configuration for the ldapsh shell.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> explicit file -> environment -> overrides.
//! The user file lives at `~/.config/ldapsh/config.toml` (platform dependent),
//! the workspace file at `.ldapsh/config.toml`.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub connection: ConnectionConfig,
    pub ui: UiConfig,
    pub history: HistoryConfig,
}

/// Defaults applied to connections given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Port used when only a host is given.
    pub port: u16,
    /// Bind DN used when none is given. Empty means an anonymous bind.
    pub bind_dn: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: 389,
            bind_dn: String::new(),
        }
    }
}

/// Interactive shell settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub prompt: String,
    /// Whether errors are highlighted.
    pub color: bool,
    /// Input history file. Defaults to `input_history` in the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,
    /// Maximum number of input lines kept.
    pub max_history: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            prompt: "$ ".to_string(),
            color: true,
            history_file: None,
            max_history: 500,
        }
    }
}

/// Connection history settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Connection store file. Defaults to `connections.json` in the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Number of recent connections remembered.
    pub max_recent: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_recent: 20,
        }
    }
}

impl ShellConfig {
    /// Reject values the shell cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.port == 0 {
            return Err(ConfigError::Invalid {
                message: "connection.port must be between 1 and 65535".into(),
            });
        }
        if self.ui.prompt.is_empty() {
            return Err(ConfigError::Invalid {
                message: "ui.prompt must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Where the connection store lives.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history
            .path
            .clone()
            .or_else(|| data_dir().map(|d| d.join("connections.json")))
    }

    /// Where typed input lines are kept.
    pub fn input_history_path(&self) -> Option<PathBuf> {
        self.ui
            .history_file
            .clone()
            .or_else(|| data_dir().map(|d| d.join("input_history")))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "ldapsh", "ldapsh")
}

/// Per-user data directory (history, logs).
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().to_path_buf())
}

/// Load configuration with layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `LDAPSH_`)
/// 3. An explicitly named config file
/// 4. Workspace-local config (`.ldapsh/config.toml`)
/// 5. User config (`~/.config/ldapsh/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    file: Option<&Path>,
    overrides: Option<&ShellConfig>,
) -> Result<ShellConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ShellConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".ldapsh").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(file) = file {
        if !file.exists() {
            return Err(ConfigError::Invalid {
                message: format!("config file not found: {}", file.display()),
            });
        }
        figment = figment.merge(Toml::file(file));
    }

    // LDAPSH_CONNECTION__PORT, LDAPSH_UI__PROMPT, ...
    figment = figment.merge(Env::prefixed("LDAPSH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: ShellConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

/// Whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs()
        && dirs.config_dir().join("config.toml").exists()
    {
        return true;
    }
    workspace.is_some_and(|ws| ws.join(".ldapsh").join("config.toml").exists())
}
