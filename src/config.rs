use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Encoding used for the share lines written by `split`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShareFormat {
    /// `shamir1:` followed by base64url of the TLV encoding.
    #[default]
    Text,
    /// Hex of the `SHAM` container, carrying threshold and share count.
    Container,
}

/// Settings for the command line tool.
///
/// Sources are layered: built-in defaults, then the TOML file, then `SHAMIR_*` environment
/// variables. Command line flags are applied on top by the caller.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ShamirConfig {
    #[serde(default)]
    pub format: ShareFormat,

    /// Hex-encoded HMAC-SHA256 key for the container format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_key: Option<String>,

    /// Emit verification reports as JSON.
    #[serde(default)]
    pub json: bool,
}

impl ShamirConfig {
    /// Loads the configuration, treating a missing file as empty.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(default_path);

        let mut builder = Config::builder()
            .set_default("format", "text")?
            .set_default("json", false)?;

        if let Some(path) = &path {
            debug!("📝 Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }

        let settings = builder
            // Eg.. `SHAMIR_FORMAT=container shamir split -k 2 -n 3`
            .add_source(Environment::with_prefix("SHAMIR"))
            .build()?;

        settings.try_deserialize()
    }

    /// Decodes the configured MAC key, if any.
    pub fn mac_key_bytes(&self) -> Result<Option<Vec<u8>>, hex::FromHexError> {
        self.mac_key.as_deref().map(hex::decode).transpose()
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// `~/.shamir/conf.toml`, when a home directory is known.
fn default_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".shamir").join("conf.toml"))
}
