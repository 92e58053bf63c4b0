// ABOUTME: Configuration types for output routing
// ABOUTME: Maps emit channels to destinations such as stdout or files

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::error::{OutputError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination for lines emitted without a channel (or to an unrouted one)
    #[serde(default = "default_destination")]
    pub default: String,
    /// Channel name to destination
    #[serde(default)]
    pub channels: HashMap<String, String>,
    /// Append to existing files instead of truncating them
    #[serde(default)]
    pub append: bool,
    #[serde(default = "default_true")]
    pub create_dirs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Stdout,
    File(PathBuf),
    Discard,
}

fn default_destination() -> String {
    "stdout".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default: default_destination(),
            channels: HashMap::new(),
            append: false,
            create_dirs: true,
        }
    }
}

impl OutputConfig {
    /// Send every line to a single file
    pub fn to_file<S: Into<String>>(path: S) -> Self {
        Self {
            default: format!("file://{}", path.into()),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: &str, destination: &str) -> Self {
        self.channels
            .insert(channel.to_string(), destination.to_string());
        self
    }
}

impl Destination {
    /// Parse `stdout`, `null`, `file://path` or a bare file path
    pub fn parse(destination: &str) -> Result<Self> {
        let trimmed = destination.trim();
        match trimmed {
            "" => Err(OutputError::InvalidDestination {
                destination: destination.to_string(),
                reason: "destination cannot be empty".to_string(),
            }),
            "stdout" | "-" => Ok(Destination::Stdout),
            "null" | "none" => Ok(Destination::Discard),
            _ => {
                let path = trimmed.strip_prefix("file://").unwrap_or(trimmed);
                if path.is_empty() {
                    return Err(OutputError::InvalidDestination {
                        destination: destination.to_string(),
                        reason: "file destination needs a path".to_string(),
                    });
                }
                if let Some((scheme, _)) = path.split_once("://") {
                    return Err(OutputError::InvalidDestination {
                        destination: destination.to_string(),
                        reason: format!("unsupported scheme '{}'", scheme),
                    });
                }
                Ok(Destination::File(PathBuf::from(path)))
            }
        }
    }
}
