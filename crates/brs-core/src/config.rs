//! Simulator connection settings.
//!
//! [`SimulatorConfig`] is the single source of truth for where the three
//! simulator services listen and which timings the clients use.  It is built
//! once at startup and then shared read-only by every client.
//!
//! The config can be read from a TOML file.  Any field absent from the file
//! takes its documented default, so a file only needs the values that differ:
//!
//! ```toml
//! host = "192.168.1.40"
//! web_password = "hunter2"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Connection settings for one simulator instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Hostname or IP address of the machine running the simulator.
    #[serde(default = "default_host")]
    pub host: String,
    /// HTTP port of the ECP remote-control service.
    #[serde(default = "default_ecp_port")]
    pub ecp_port: u16,
    /// HTTP port of the web installer.  `0` selects [`Self::default_web_port`].
    #[serde(default = "default_web_port")]
    pub web_port: u16,
    /// TCP port of the debug console.
    #[serde(default = "default_console_port")]
    pub console_port: u16,
    /// Web installer port used when `web_port` is left as `0`.
    #[serde(default = "default_fallback_web_port")]
    pub default_web_port: u16,
    /// Password of the installer's developer account.
    #[serde(default = "default_web_password")]
    pub web_password: String,
    /// How long the simulator needs to write a screenshot to disk, in ms.
    #[serde(default = "default_screenshot_delay_ms")]
    pub screenshot_delay_ms: u64,
    /// Pause between consecutive keypresses of a sequence, in ms.
    #[serde(default = "default_keypress_delay_ms")]
    pub keypress_delay_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_ecp_port() -> u16 {
    8060
}
fn default_web_port() -> u16 {
    8888
}
fn default_console_port() -> u16 {
    8085
}
fn default_fallback_web_port() -> u16 {
    80
}
fn default_web_password() -> String {
    "rokudev".to_string()
}
fn default_screenshot_delay_ms() -> u64 {
    500
}
fn default_keypress_delay_ms() -> u64 {
    300
}

impl Default for SimulatorConfig {
    /// | Field               | Default       |
    /// |---------------------|---------------|
    /// | host                | `127.0.0.1`   |
    /// | ecp_port            | 8060          |
    /// | web_port            | 8888          |
    /// | console_port        | 8085          |
    /// | default_web_port    | 80            |
    /// | web_password        | `rokudev`     |
    /// | screenshot_delay_ms | 500           |
    /// | keypress_delay_ms   | 300           |
    fn default() -> Self {
        Self {
            host: default_host(),
            ecp_port: default_ecp_port(),
            web_port: default_web_port(),
            console_port: default_console_port(),
            default_web_port: default_fallback_web_port(),
            web_password: default_web_password(),
            screenshot_delay_ms: default_screenshot_delay_ms(),
            keypress_delay_ms: default_keypress_delay_ms(),
        }
    }
}

impl SimulatorConfig {
    /// Parses a config from TOML text, filling absent fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid TOML or a field
    /// has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its content is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!("loaded simulator config from {}", path.display());
        Ok(config)
    }

    /// The port the web installer is reached on.
    pub fn installer_port(&self) -> u16 {
        if self.web_port == 0 {
            self.default_web_port
        } else {
            self.web_port
        }
    }

    /// Base URL of the ECP service, e.g. `http://127.0.0.1:8060`.
    pub fn ecp_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.ecp_port)
    }

    /// Base URL of the web installer, e.g. `http://127.0.0.1:8888`.
    pub fn installer_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.installer_port())
    }

    /// `host:port` of the debug console.
    pub fn console_addr(&self) -> String {
        format!("{}:{}", self.host, self.console_port)
    }

    pub fn screenshot_delay(&self) -> Duration {
        Duration::from_millis(self.screenshot_delay_ms)
    }

    pub fn keypress_delay(&self) -> Duration {
        Duration::from_millis(self.keypress_delay_ms)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
