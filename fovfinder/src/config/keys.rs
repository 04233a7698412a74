//! Typed access to individual configuration keys
//!
//! Keys are addressed as `section.key`, matching the INI layout, so the CLI
//! can get and set single values without knowing the file format.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ConfigFile};

/// A single configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    InstrumentName,
    InstrumentPxScale,
    InstrumentNxTotal,
    InstrumentNyTotal,
    InstrumentRotcenX,
    InstrumentRotcenY,
    InstrumentFlipEw,
    InstrumentEOfN,
    InstrumentPaOffset,
    ReadoutMode,
    ImageryServer,
    ImageryTimeout,
    ImageryTmpdir,
    ChartFont,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            InstrumentName,
            InstrumentPxScale,
            InstrumentNxTotal,
            InstrumentNyTotal,
            InstrumentRotcenX,
            InstrumentRotcenY,
            InstrumentFlipEw,
            InstrumentEOfN,
            InstrumentPaOffset,
            ReadoutMode,
            ImageryServer,
            ImageryTimeout,
            ImageryTmpdir,
            ChartFont,
            LoggingLevel,
            LoggingDirectory,
        ]
    }

    /// INI section the key lives in.
    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            InstrumentName | InstrumentPxScale | InstrumentNxTotal | InstrumentNyTotal
            | InstrumentRotcenX | InstrumentRotcenY | InstrumentFlipEw | InstrumentEOfN
            | InstrumentPaOffset => "instrument",
            ReadoutMode => "readout",
            ImageryServer | ImageryTimeout | ImageryTmpdir => "imagery",
            ChartFont => "chart",
            LoggingLevel | LoggingDirectory => "logging",
        }
    }

    /// Key name within its section.
    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            InstrumentName => "name",
            InstrumentPxScale => "px_scale",
            InstrumentNxTotal => "nxtot",
            InstrumentNyTotal => "nytot",
            InstrumentRotcenX => "rotcen_x",
            InstrumentRotcenY => "rotcen_y",
            InstrumentFlipEw => "flip_ew",
            InstrumentEOfN => "e_of_n",
            InstrumentPaOffset => "pa_off",
            ReadoutMode => "mode",
            ImageryServer => "server",
            ImageryTimeout => "timeout",
            ImageryTmpdir => "tmpdir",
            ChartFont => "font",
            LoggingLevel => "level",
            LoggingDirectory => "directory",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as it is written to the file.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        let optional_path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        match self {
            InstrumentName => config.instrument.name.clone(),
            InstrumentPxScale => config.instrument.px_scale.to_string(),
            InstrumentNxTotal => config.instrument.nx_total.to_string(),
            InstrumentNyTotal => config.instrument.ny_total.to_string(),
            InstrumentRotcenX => config.instrument.rotcen_x.to_string(),
            InstrumentRotcenY => config.instrument.rotcen_y.to_string(),
            InstrumentFlipEw => config.instrument.flip_ew.to_string(),
            InstrumentEOfN => config.instrument.e_of_n.to_string(),
            InstrumentPaOffset => config.instrument.pa_offset.to_string(),
            ReadoutMode => config.readout.to_string(),
            ImageryServer => config.imagery.server.clone(),
            ImageryTimeout => config.imagery.timeout_secs.to_string(),
            ImageryTmpdir => optional_path(&config.imagery.tmpdir),
            ChartFont => optional_path(&config.chart.font),
            LoggingLevel => config.logging.level.clone(),
            LoggingDirectory => config.logging.directory.display().to_string(),
        }
    }

    /// Parses `value` and stores it in `config`.
    ///
    /// An empty value clears optional paths.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason,
        };
        let optional_path = |v: &str| (!v.is_empty()).then(|| expand_home(v));

        match self {
            InstrumentName => config.instrument.name = non_empty(value).map_err(invalid)?,
            InstrumentPxScale => {
                config.instrument.px_scale = parse_positive(value).map_err(invalid)?
            }
            InstrumentNxTotal => config.instrument.nx_total = parse_number(value).map_err(invalid)?,
            InstrumentNyTotal => config.instrument.ny_total = parse_number(value).map_err(invalid)?,
            InstrumentRotcenX => config.instrument.rotcen_x = parse_number(value).map_err(invalid)?,
            InstrumentRotcenY => config.instrument.rotcen_y = parse_number(value).map_err(invalid)?,
            InstrumentFlipEw => config.instrument.flip_ew = parse_bool(value).map_err(invalid)?,
            InstrumentEOfN => config.instrument.e_of_n = parse_bool(value).map_err(invalid)?,
            InstrumentPaOffset => {
                config.instrument.pa_offset = parse_number(value).map_err(invalid)?
            }
            ReadoutMode => {
                config.readout = value.parse().map_err(|e| invalid(format!("{}", e)))?
            }
            ImageryServer => config.imagery.server = non_empty(value).map_err(invalid)?,
            ImageryTimeout => {
                let secs: u64 = parse_number(value).map_err(invalid)?;
                if secs == 0 {
                    return Err(invalid("timeout must be at least one second".to_string()));
                }
                config.imagery.timeout_secs = secs;
            }
            ImageryTmpdir => config.imagery.tmpdir = optional_path(value),
            ChartFont => config.chart.font = optional_path(value),
            LoggingLevel => config.logging.level = non_empty(value).map_err(invalid)?,
            LoggingDirectory => {
                config.logging.directory = expand_home(&non_empty(value).map_err(invalid)?)
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

fn non_empty(value: &str) -> Result<String, String> {
    if value.is_empty() {
        Err("value cannot be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

/// Replaces a leading `~` with the home directory.
fn expand_home(value: &str) -> PathBuf {
    let rest = match value.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(value),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(value),
    }
}

fn parse_number<T>(value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|e| e.to_string())
}

fn parse_positive(value: &str) -> Result<f64, String> {
    let v: f64 = parse_number(value)?;
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err("must be a positive number".to_string())
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_names() {
        assert_eq!(
            "instrument.px_scale".parse::<ConfigKey>().unwrap(),
            ConfigKey::InstrumentPxScale
        );
        assert_eq!(
            "Readout.Mode".parse::<ConfigKey>().unwrap(),
            ConfigKey::ReadoutMode
        );
        assert!(matches!(
            "instrument.colour".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_every_key_roundtrips_its_default() {
        let defaults = ConfigFile::default();
        for key in ConfigKey::all() {
            let mut config = ConfigFile::default();
            let value = key.get(&defaults);
            key.set(&mut config, &value).unwrap();
            assert_eq!(config, defaults, "key {} changed on reset", key);
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
    }

    #[test]
    fn test_set_bool_variants() {
        let mut config = ConfigFile::default();
        ConfigKey::InstrumentFlipEw.set(&mut config, "no").unwrap();
        assert!(!config.instrument.flip_ew);
        ConfigKey::InstrumentFlipEw.set(&mut config, "ON").unwrap();
        assert!(config.instrument.flip_ew);
        assert!(ConfigKey::InstrumentFlipEw.set(&mut config, "maybe").is_err());
    }

    #[test]
    fn test_set_readout_mode() {
        let mut config = ConfigFile::default();
        ConfigKey::ReadoutMode
            .set(&mut config, "drift:10,1500,20,100,100")
            .unwrap();
        assert!(config.readout.is_drift());
        assert_eq!(
            ConfigKey::ReadoutMode.get(&config),
            "drift:10,1500,20,100,100"
        );

        let err = ConfigKey::ReadoutMode.set(&mut config, "drift:1").unwrap_err();
        assert!(err.to_string().contains("readout.mode"));
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::InstrumentPxScale.set(&mut config, "0").is_err());
        assert!(ConfigKey::InstrumentNxTotal.set(&mut config, "-5").is_err());
        assert!(ConfigKey::ImageryTimeout.set(&mut config, "0").is_err());
        assert!(ConfigKey::InstrumentName.set(&mut config, "  ").is_err());
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_empty_clears_optional_paths() {
        let mut config = ConfigFile::default();
        ConfigKey::ChartFont.set(&mut config, "/fonts/a.ttf").unwrap();
        assert_eq!(config.chart.font, Some(PathBuf::from("/fonts/a.ttf")));
        ConfigKey::ChartFont.set(&mut config, "").unwrap();
        assert_eq!(config.chart.font, None);
    }

    #[test]
    fn test_tilde_paths_expand_to_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let mut config = ConfigFile::default();

        ConfigKey::LoggingDirectory.set(&mut config, "~/fov/logs").unwrap();
        assert_eq!(config.logging.directory, home.join("fov/logs"));

        ConfigKey::ImageryTmpdir.set(&mut config, "~").unwrap();
        assert_eq!(config.imagery.tmpdir, Some(home.clone()));

        ConfigKey::ChartFont.set(&mut config, "~/fonts/a.ttf").unwrap();
        assert_eq!(config.chart.font, Some(home.join("fonts/a.ttf")));
    }

    #[test]
    fn test_tilde_inside_path_is_literal() {
        assert_eq!(expand_home("/data/~cache"), PathBuf::from("/data/~cache"));
        assert_eq!(expand_home("~user/logs"), PathBuf::from("~user/logs"));
    }
}
