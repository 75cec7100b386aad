use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_PORT: &str = "27016";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid settings file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid session file: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Per-server configuration (one persisted session record)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    #[serde(default)]
    pub exe: String,
    #[serde(default)]
    pub cfg: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub auto_restart: bool,
}

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

impl ServerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exe: String::new(),
            cfg: String::new(),
            port: default_port(),
            auto_restart: false,
        }
    }

    /// The port as a number, if the configured string is a valid u16.
    pub fn port_number(&self) -> Option<u16> {
        self.port.trim().parse().ok()
    }
}

/// Fields an operator may change on an existing server. `None` leaves the
/// current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_restart: Option<bool>,
}

impl ServerUpdate {
    pub fn is_empty(&self) -> bool {
        self.exe.is_none() && self.cfg.is_none() && self.port.is_none() && self.auto_restart.is_none()
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub fn load_sessions(path: &Path) -> Result<Vec<ServerConfig>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            });
        }
    };
    Ok(serde_json::from_str(&content)?)
}

pub fn save_sessions(path: &Path, sessions: &[ServerConfig]) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(sessions)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(path, json).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// RCON password
// ---------------------------------------------------------------------------

static RCON_PASSWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"set\s+rcon_password\s+"([^"]+)""#).expect("rcon password pattern is valid")
});

/// Find the value of the first `set rcon_password "<value>"` directive.
///
/// Keywords are separated by any whitespace and the value is everything
/// between the double quotes (at least one character, no embedded quotes).
pub fn parse_rcon_password(config_text: &str) -> Option<String> {
    RCON_PASSWORD
        .captures(config_text)
        .map(|caps| caps[1].to_string())
}

/// Read a server config file and extract its RCON password. Unreadable or
/// missing files yield `None`.
pub fn read_rcon_password(cfg_path: &Path) -> Option<String> {
    if cfg_path.as_os_str().is_empty() || !cfg_path.is_file() {
        return None;
    }
    let bytes = std::fs::read(cfg_path).ok()?;
    parse_rcon_password(&String::from_utf8_lossy(&bytes))
}

// ---------------------------------------------------------------------------
// Daemon settings (hmwsm.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub poll_interval_ms: u64,
    pub ping_interval_ms: u64,
    pub rcon_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub restart_delay_ms: u64,
    pub watchdog_restart_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            ping_interval_ms: 30_000,
            rcon_timeout_ms: 2_000,
            stop_timeout_ms: 5_000,
            restart_delay_ms: 3_000,
            watchdog_restart_delay_ms: 2_000,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn rcon_timeout(&self) -> Duration {
        Duration::from_millis(self.rcon_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn watchdog_restart_delay(&self) -> Duration {
        Duration::from_millis(self.watchdog_restart_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
