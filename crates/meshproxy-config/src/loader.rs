//! Configuration file loading and error types.

use std::{fs, path::Path};

use crate::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("validation: {0}")]
    Validation(String),
}

/// On-disk syntax of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    /// JSON, with `//` and `/* */` comments allowed.
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// Pick the syntax from the file extension.
    ///
    /// Config files are JSON unless named otherwise, so a missing or
    /// unrecognized extension (`relay`, `relay.conf`) reads as JSON.
    fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml" | "yml") => Self::Yaml,
            Some("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Load configuration from a file path.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    parse(Format::of(path), &data)
}

fn parse(format: Format, data: &str) -> Result<Config, ConfigError> {
    Ok(match format {
        Format::Json => {
            serde_json::from_reader(json_comments::StripComments::new(data.as_bytes()))?
        }
        Format::Yaml => serde_yaml::from_str(data)?,
        Format::Toml => toml::from_str(data)?,
    })
}
