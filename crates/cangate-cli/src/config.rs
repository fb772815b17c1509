//! Gate configuration – reads/writes `~/.cangate/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which CAN backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// No CAN interface: candump lines on stdin, emitted frames on stdout.
    Virtual,
    /// Linux SocketCAN interface named by `channel`.
    #[default]
    SocketCan,
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterKind::Virtual => write!(f, "virtual"),
            AdapterKind::SocketCan => write!(f, "socketcan"),
        }
    }
}

impl FromStr for AdapterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "virtual" => Ok(AdapterKind::Virtual),
            "socketcan" => Ok(AdapterKind::SocketCan),
            other => Err(format!("unknown adapter '{other}' (expected virtual|socketcan)")),
        }
    }
}

/// Persisted gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// CAN interface name.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Nominal bus bitrate.  SocketCAN takes bit timing from the interface,
    /// so this is only reported at startup.
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    #[serde(default)]
    pub adapter: AdapterKind,

    /// Number of inbound frames kept for diagnostics.
    #[serde(default = "default_journal_capacity")]
    pub journal_capacity: usize,
}

fn default_channel() -> String {
    "vcan0".to_string()
}
fn default_bitrate() -> u32 {
    250_000
}
fn default_journal_capacity() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            bitrate: default_bitrate(),
            adapter: AdapterKind::default(),
            journal_capacity: default_journal_capacity(),
        }
    }
}

/// Return the config path: `CANGATE_CONFIG` if set, else
/// `~/.cangate/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("CANGATE_CONFIG") {
        return PathBuf::from(p);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".cangate").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply environment overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CAN_BUS_ADAPTER_NAME` | `channel` |
/// | `CANGATE_BITRATE` | `bitrate` |
/// | `CANGATE_ADAPTER` | `adapter` |
/// | `CANGATE_JOURNAL_CAPACITY` | `journal_capacity` |
///
/// Unparseable values are ignored and the previous value kept.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CAN_BUS_ADAPTER_NAME")
        && !v.trim().is_empty()
    {
        cfg.channel = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("CANGATE_BITRATE")
        && let Ok(bitrate) = v.parse::<u32>()
    {
        cfg.bitrate = bitrate;
    }
    if let Ok(v) = std::env::var("CANGATE_ADAPTER")
        && let Ok(kind) = v.parse::<AdapterKind>()
    {
        cfg.adapter = kind;
    }
    if let Ok(v) = std::env::var("CANGATE_JOURNAL_CAPACITY")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.journal_capacity = n;
    }
}

/// Save the config to disk, creating the parent directory if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
