use std::fs;
use std::io::Write;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::Builder;

use crate::client::DEFAULT_TIMEOUT_SECS;
use crate::controller::ControllerSettings;
use crate::domain::ApiPreset;
use crate::error::RocError;

pub const CONFIG_FILE_NAME: &str = "roc2rawsplits.json";
pub const DEFAULT_OUTPUT: &str = "rawsplits.txt";
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_preset: Option<ApiPreset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Utf8PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_last_id: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<Utf8PathBuf>,
}

impl Config {
    /// Fields set in `other` win.
    pub fn merged(self, other: Config) -> Config {
        Config {
            api_url: other.api_url.or(self.api_url),
            api_preset: other.api_preset.or(self.api_preset),
            race: other.race.or(self.race),
            output: other.output.or(self.output),
            use_last_id: other.use_last_id.or(self.use_last_id),
            last_id: other.last_id.or(self.last_id),
            interval_secs: other.interval_secs.or(self.interval_secs),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            log_file: other.log_file.or(self.log_file),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub api_url: String,
    pub race: u32,
    pub output: Utf8PathBuf,
    pub use_last_id: bool,
    pub last_id: i64,
    pub interval: Duration,
    pub timeout: Duration,
    pub log_file: Option<Utf8PathBuf>,
    /// File the settings were read from, if any.
    pub source: Option<Utf8PathBuf>,
}

impl ResolvedConfig {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            api_url: self.api_url.clone(),
            race: self.race,
            use_cursor: self.use_last_id,
            initial_cursor: if self.use_last_id { self.last_id } else { 0 },
            output_path: self.output.clone(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// The explicit path, else `roc2rawsplits.json` in the working
    /// directory, else the per-user config file, whichever exists first.
    pub fn locate(path: Option<&str>) -> Option<Utf8PathBuf> {
        if let Some(path) = path {
            return Some(Utf8PathBuf::from(path));
        }
        let local = Utf8PathBuf::from(CONFIG_FILE_NAME);
        if local.as_std_path().exists() {
            return Some(local);
        }
        user_config_path().filter(|p| p.as_std_path().exists())
    }

    /// Missing implicit files yield an empty config.
    pub fn load(path: Option<&str>) -> Result<Config, RocError> {
        match Self::locate(path) {
            Some(path) => Self::read(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn read(path: &Utf8Path) -> Result<Config, RocError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| RocError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| RocError::ConfigParse(err.to_string()))
    }

    pub fn resolve(path: Option<&str>, overrides: Config) -> Result<ResolvedConfig, RocError> {
        let source = Self::locate(path);
        let loaded = match &source {
            Some(source) => Self::read(source)?,
            None => Config::default(),
        };
        let mut resolved = Self::resolve_config(loaded.merged(overrides))?;
        resolved.source = source;
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, RocError> {
        let api_url = config
            .api_url
            .filter(|url| !url.trim().is_empty())
            .or_else(|| config.api_preset.map(|preset| preset.url().to_string()))
            .ok_or_else(|| {
                RocError::InvalidConfig("no API address (set api_url or api_preset)".to_string())
            })?;
        let race = config
            .race
            .ok_or_else(|| RocError::InvalidConfig("race number is required".to_string()))?;
        let interval_secs = config.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(RocError::InvalidConfig(
                "interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            api_url: api_url.trim().to_string(),
            race,
            output: config
                .output
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT)),
            use_last_id: config.use_last_id.unwrap_or(true),
            last_id: config.last_id.unwrap_or(0),
            interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            log_file: config.log_file,
            source: None,
        })
    }

    pub fn write(path: &Utf8Path, config: &Config) -> Result<(), RocError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| RocError::Filesystem(err.to_string()))?;
        let content = serde_json::to_vec_pretty(config)
            .map_err(|err| RocError::Filesystem(err.to_string()))?;

        let mut temp = Builder::new()
            .prefix("roc2rawsplits")
            .suffix(".json")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| RocError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| RocError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| RocError::Filesystem(err.error.to_string()))?;
        Ok(())
    }

    /// Stores `cursor` as `last_id` in the file `resolved` was read from,
    /// keeping its other fields. Without a source file, `seed` plus the
    /// cursor goes to `roc2rawsplits.json` in the working directory.
    /// Nothing is written when incremental mode is off.
    pub fn save_last_id(
        resolved: &ResolvedConfig,
        seed: Config,
        cursor: i64,
    ) -> Result<Option<Utf8PathBuf>, RocError> {
        if !resolved.use_last_id {
            return Ok(None);
        }
        let (path, mut config) = match &resolved.source {
            Some(source) if source.as_std_path().exists() => (source.clone(), Self::read(source)?),
            Some(source) => (source.clone(), seed),
            None => (Utf8PathBuf::from(CONFIG_FILE_NAME), seed),
        };
        config.last_id = Some(cursor);
        Self::write(&path, &config)?;
        Ok(Some(path))
    }
}

pub fn user_config_path() -> Option<Utf8PathBuf> {
    let dirs = ProjectDirs::from("", "", "roc2rawsplits")?;
    Utf8PathBuf::from_path_buf(dirs.config_dir().join(CONFIG_FILE_NAME)).ok()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn preset_fills_api_url() {
        let config = Config {
            api_preset: Some(ApiPreset::Olresultat),
            race: Some(5),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.api_url, "https://roc.olresultat.se/getpunches.asp");
        assert!(resolved.use_last_id);
        assert_eq!(resolved.output, Utf8PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(resolved.interval, Duration::from_secs(DEFAULT_INTERVAL_SECS));
    }

    #[test]
    fn race_is_required() {
        let config = Config {
            api_url: Some("https://api.oresults.eu/roc".to_string()),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, RocError::InvalidConfig(_));
    }

    #[test]
    fn cursor_seed_ignored_without_last_id_mode() {
        let config = Config {
            api_url: Some("https://api.oresults.eu/roc".to_string()),
            race: Some(1),
            use_last_id: Some(false),
            last_id: Some(500),
            ..Config::default()
        };
        let settings = ConfigLoader::resolve_config(config)
            .unwrap()
            .controller_settings();
        assert!(!settings.use_cursor);
        assert_eq!(settings.initial_cursor, 0);
    }
}
