//! UDM configuration (udm.yaml)
//!
//! ```yaml
//! udm:
//!   sbi:
//!     addr: 0.0.0.0
//!     port: 7777
//!   udr:
//!     host: 127.0.0.20
//!     port: 7777
//!   hnet:
//!     - id: 1
//!       scheme: 1
//!       key: c53c22208b61860b06c62e5406a7b330c2b577aa5558981510d128247d38bd1d
//! ```
//!
//! `hnet` is the ordered list of home network keys; the 1-based position of
//! an entry is the SUCI public key identifier that selects it.

use std::path::Path;
use std::time::Duration;

use ogs_sbi::SbiClientConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::suci::{SuciError, SuciProfile};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("No 'udm' section")]
    MissingUdmSection,
    #[error("hnet entry {position}: {reason}")]
    InvalidHnet { position: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SbiConfig {
    pub addr: String,
    pub port: u16,
}

impl Default for SbiConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0".to_string(),
            port: 7777,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UdrConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for UdrConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.20".to_string(),
            port: 7777,
            connect_timeout_ms: 5000,
            request_timeout_ms: 30000,
        }
    }
}

impl UdrConfig {
    pub fn client_config(&self) -> SbiClientConfig {
        SbiClientConfig::new(self.host.clone(), self.port)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
    }
}

/// One home network key
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct HnetConfig {
    #[serde(default)]
    pub id: Option<u8>,
    pub scheme: u8,
    pub key: String,
    #[serde(default)]
    pub public_key: Option<String>,
}

impl std::fmt::Debug for HnetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnetConfig")
            .field("id", &self.id)
            .field("scheme", &self.scheme)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UdmConfig {
    pub sbi: SbiConfig,
    pub udr: UdrConfig,
    pub hnet: Vec<HnetConfig>,
}

#[derive(Deserialize)]
struct ConfigFile {
    udm: Option<UdmConfig>,
}

impl UdmConfig {
    /// Parse the `udm` section of a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        file.udm.ok_or(ConfigError::MissingUdmSection)
    }

    /// Load and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Validate `hnet` and build the SUCI profiles in key id order.
    pub fn suci_profiles(&self) -> Result<Vec<SuciProfile>, ConfigError> {
        self.hnet
            .iter()
            .enumerate()
            .map(|(index, hnet)| {
                let position = index + 1;
                if let Some(id) = hnet.id {
                    if id as usize != position {
                        return Err(ConfigError::InvalidHnet {
                            position,
                            reason: format!("id {} does not match its position", id),
                        });
                    }
                }
                SuciProfile::from_hex(hnet.scheme, &hnet.key, hnet.public_key.as_deref()).map_err(
                    |e: SuciError| ConfigError::InvalidHnet {
                        position,
                        reason: e.to_string(),
                    },
                )
            })
            .collect()
    }
}
