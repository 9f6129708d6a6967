use crate::abi::BPF_DIR_MNT;
use crate::loader::{LoadOptions, DEFAULT_LOG_SIZE};
use crate::pin::PinLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Errors raised while reading the loader configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {location}: {message}")]
    Parse { location: String, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Loader settings, read from YAML and overridable from the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// bpffs mount point
    pub pin_root: PathBuf,
    /// Directory under `pin_root` holding `globals/`
    pub pin_category: String,
    /// Verifier log capacity in bytes (0 disables the log)
    pub log_size: usize,
    pub log_level: u32,
    /// License used when the object carries none
    pub license: String,
    pub allow_unspecified_program_type: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            pin_root: PathBuf::from(BPF_DIR_MNT),
            pin_category: "tc".to_string(),
            log_size: DEFAULT_LOG_SIZE,
            log_level: 1,
            license: "GPL".to_string(),
            allow_unspecified_program_type: false,
        }
    }
}

impl LoaderConfig {
    /// Reads and validates a YAML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: LoaderConfig = match serde_yaml::from_str(content) {
            Ok(c) => c,
            Err(e) => {
                let location = e
                    .location()
                    .map(|l| format!("line {}, column {}", l.line(), l.column()))
                    .unwrap_or_else(|| "unknown location".to_string());
                return Err(ConfigError::Parse {
                    location,
                    message: e.to_string(),
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pin_root.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "pin_root {} must be an absolute path",
                self.pin_root.display()
            )));
        }
        let mut components = Path::new(&self.pin_category).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(ConfigError::Invalid(format!(
                "pin_category {:?} must be a single directory name",
                self.pin_category
            )));
        }
        self.load_options()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    pub fn pin_layout(&self) -> PinLayout {
        PinLayout::new(&self.pin_root, &self.pin_category)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            log_size: self.log_size,
            log_level: self.log_level,
            allow_unspecified_fallback: self.allow_unspecified_program_type,
        }
    }
}
