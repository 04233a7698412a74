//! Configuration file handling
//!
//! Settings live in an INI file at `~/.fovfinder/config.ini`. Every key has a
//! default, so a missing file or section is never an error; a value that
//! does not parse is.
//!
//! ```ini
//! [instrument]
//! name = hipercam
//! px_scale = 0.081
//! nxtot = 2048
//! nytot = 1024
//! rotcen_x = 1024
//! rotcen_y = 512
//! flip_ew = true
//! e_of_n = true
//! pa_off = 0
//!
//! [readout]
//! mode = full
//!
//! [imagery]
//! server = eso
//! timeout = 30
//! tmpdir =
//!
//! [chart]
//! font =
//!
//! [logging]
//! level = info
//! directory = ~/.fovfinder/logs
//! ```

mod keys;

pub use keys::ConfigKey;

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::geometry::{InstrumentConfig, ModeLayout};
use crate::imagery::{DEFAULT_TIMEOUT_SECS, ESO_DSS_SHORT_NAME};

/// Directory name under the home directory.
pub const CONFIG_DIR_NAME: &str = ".fovfinder";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors from reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// `[imagery]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagerySettings {
    /// Short name of the image server.
    pub server: String,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Directory downloaded images are saved in; system temp when unset.
    pub tmpdir: Option<PathBuf>,
}

impl Default for ImagerySettings {
    fn default() -> Self {
        Self {
            server: ESO_DSS_SHORT_NAME.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            tmpdir: None,
        }
    }
}

impl ImagerySettings {
    /// Directory for downloads, falling back to a `fovfinder` directory in
    /// the system temp dir.
    pub fn download_dir(&self) -> PathBuf {
        self.tmpdir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("fovfinder"))
    }
}

/// `[chart]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSettings {
    /// TrueType font for chart labels; the bundled font is used when unset.
    pub font: Option<PathBuf>,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `fovfinder=debug`.
    pub level: String,
    /// Directory for log files.
    pub directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: config_directory().join("logs"),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub instrument: InstrumentConfig,
    pub readout: ModeLayout,
    pub imagery: ImagerySettings,
    pub chart: ChartSettings,
    pub logging: LoggingSettings,
}

/// `~/.fovfinder`, or `./.fovfinder` without a home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

impl ConfigFile {
    /// Loads the file at the default location; defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads a specific file; defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_ini(&ini)?;

        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        config.instrument.validate().map_err(|e| ConfigError::InvalidValue {
            key: "instrument".to_string(),
            value: config.instrument.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Changes one key in the file at the default location.
    pub fn set_key(key: ConfigKey, value: &str) -> Result<Self, ConfigError> {
        Self::set_key_in(&config_file_path(), key, value)
    }

    /// Changes one key in a specific file, leaving every other entry as
    /// written.
    ///
    /// The file is only rewritten when the edited result loads cleanly, so a
    /// bad value is reported and a broken entry can be fixed by setting it.
    pub fn set_key_in(path: &Path, key: ConfigKey, value: &str) -> Result<Self, ConfigError> {
        let mut ini = if path.exists() {
            Ini::load_from_file(path).map_err(|e| ConfigError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            Ini::new()
        };

        ini.with_section(Some(key.section()))
            .set(key.key_name(), value.trim());
        let config = Self::from_ini(&ini)?;

        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        ini.write_to_file(path).map_err(write_error)?;

        tracing::debug!(path = %path.display(), key = %key, "Updated config file");
        Ok(config)
    }

    /// Saves to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Saves to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini.write_to_file(path).map_err(write_error)?;

        tracing::debug!(path = %path.display(), "Saved config file");
        Ok(())
    }
}
