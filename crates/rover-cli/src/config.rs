//! Rover configuration – reads/writes `~/.rover/config.toml`.
//!
//! The file is read once at startup.  Every section is optional and missing
//! keys take their defaults, so an empty file is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use rover_hal::{ActuationConfig, HardwareKind};
use rover_kernel::{DriveMode, KinematicsConfig};
use rover_runtime::SyncConfig;
use serde::{Deserialize, Serialize};

/// Full daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root URL of the dashboard backend that issues drive commands.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// GPIO backend: `sim` or `rpi`.
    #[serde(default)]
    pub hardware: HardwareKind,

    #[serde(default)]
    pub kinematics: KinematicsConfig,

    #[serde(default)]
    pub actuation: ActuationConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            hardware: HardwareKind::default(),
            kinematics: KinematicsConfig::default(),
            actuation: ActuationConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// Return the path to `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
///
/// Environment overrides are not applied here; see [`apply_env_overrides`].
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `ROVER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVER_BACKEND_URL` | `backend_url` |
/// | `ROVER_HARDWARE` | `hardware` |
/// | `ROVER_DRIVE_MODE` | `kinematics.mode` |
/// | `ROVER_WATCHDOG_TIMEOUT` | `sync.watchdog_timeout_seconds` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ROVER_BACKEND_URL") {
        cfg.backend_url = v;
    }
    if let Ok(v) = std::env::var("ROVER_HARDWARE")
        && let Ok(kind) = v.parse::<HardwareKind>()
    {
        cfg.hardware = kind;
    }
    if let Ok(v) = std::env::var("ROVER_DRIVE_MODE")
        && let Ok(mode) = v.parse::<DriveMode>()
    {
        cfg.kinematics.mode = mode;
    }
    if let Ok(v) = std::env::var("ROVER_WATCHDOG_TIMEOUT")
        && let Ok(secs) = v.parse::<f64>()
        && secs.is_finite()
        && secs > 0.0
    {
        cfg.sync.watchdog_timeout_seconds = secs;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = to_toml(cfg)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

pub fn to_toml(cfg: &Config) -> Result<String, String> {
    toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))
}
