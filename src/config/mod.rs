//! Configuration: loads optional ~/.synthtax/config.yaml.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::limiter::DEFAULT_CEILING;
use crate::render::ProfileSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Settings for `synthtax live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Frames advanced per playback block.
    pub block_size: u32,
    pub sample_rate: u32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            block_size: 512,
            sample_rate: 44_100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SynthtaxConfig {
    /// `tracing` filter level: error, warn, info, debug or trace.
    pub log_level: String,
    pub preview: ProfileSettings,
    pub export: ProfileSettings,
    pub limiter_ceiling: f32,
    pub live: LiveConfig,
}

impl Default for SynthtaxConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            preview: ProfileSettings::preview(),
            export: ProfileSettings::export(),
            limiter_ceiling: DEFAULT_CEILING,
            live: LiveConfig::default(),
        }
    }
}

/// `~/.synthtax/config.yaml`, if there is a home directory.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".synthtax").join("config.yaml"))
}

impl SynthtaxConfig {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path.map(Path::to_path_buf).or_else(default_path) {
            Some(p) => p,
            None => return Ok(Self::default()),
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config
            .validate()
            .map_err(|reason| ConfigError::Invalid { path, reason })?;
        Ok(config)
    }

    /// Rates and sizes that the renderer and the live clock divide by.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("preview.sample_rate", self.preview.sample_rate),
            ("export.sample_rate", self.export.sample_rate),
            ("live.sample_rate", self.live.sample_rate),
            ("live.block_size", self.live.block_size),
        ] {
            if value == 0 {
                return Err(format!("{name} must be positive"));
            }
        }
        for (name, channels) in [
            ("preview.channels", self.preview.channels),
            ("export.channels", self.export.channels),
        ] {
            if !(1..=2).contains(&channels) {
                return Err(format!("{name} must be 1 or 2, got {channels}"));
            }
        }
        Ok(())
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SynthtaxConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.preview.sample_rate, 22_050);
        assert_eq!(config.export.channels, 2);
        assert_eq!(config.live.block_size, 512);
    }

    #[test]
    fn partial_yaml() {
        let config = SynthtaxConfig::from_yaml("limiter_ceiling: 0.8\nlive:\n  block_size: 256\n").unwrap();
        assert_eq!(config.limiter_ceiling, 0.8);
        assert_eq!(config.live.block_size, 256);
        assert_eq!(config.live.sample_rate, 44_100);
        assert_eq!(config.export, ProfileSettings::export());
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(SynthtaxConfig::from_yaml("").unwrap(), SynthtaxConfig::default());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = SynthtaxConfig::load(Some(&dir.path().join("nope.yaml"))).unwrap();
        assert_eq!(config, SynthtaxConfig::default());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "log_level: debug\npreview:\n  sample_rate: 11025\n  channels: 1\n").unwrap();
        let config = SynthtaxConfig::load(Some(&path)).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.preview.sample_rate, 11_025);
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "live:\n  sample_rate: 0\n").unwrap();
        match SynthtaxConfig::load(Some(&path)) {
            Err(ConfigError::Invalid { reason, .. }) => {
                assert!(reason.contains("live.sample_rate"), "{reason}")
            }
            other => panic!("expected an invalid config, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SynthtaxConfig::default().validate(), Ok(()));
        let mut config = SynthtaxConfig::default();
        config.export.channels = 6;
        assert!(config.validate().unwrap_err().contains("export.channels"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "live: [1, 2").unwrap();
        assert!(matches!(
            SynthtaxConfig::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
