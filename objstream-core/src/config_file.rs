//! Declarative configuration loading from YAML, TOML, and environment variables.
//!
//! [`FileConfig`] mirrors [`StreamConfig`] with serde-friendly optional
//! fields and converts into it through the builder, so the same validation
//! applies to every source.
//!
//! # Supported Formats
//!
//! - **YAML** (requires `config-file` feature): `StreamConfig::from_yaml("stream.yaml")`
//! - **TOML** (requires `config-file` feature): `StreamConfig::from_toml("stream.toml")`
//! - **Environment Variables** (always available): `StreamConfig::from_env()`
//!
//! # Example YAML
//!
//! ```yaml
//! protocol-version: 2
//! enable-replace: false
//! enable-resolve: true
//! max-depth: 512
//! block-buffer-capacity: 4096
//! ```

#[cfg(feature = "config-file")]
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ProtocolVersion, StreamConfig, StreamConfigBuilder};

/// File-based stream configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "kebab-case", default))]
pub struct FileConfig {
    /// Protocol version, 1 or 2.
    pub protocol_version: Option<u8>,
    /// Enable stream-level replacement on writers.
    pub enable_replace: Option<bool>,
    /// Enable stream-level resolution on readers.
    pub enable_resolve: Option<bool>,
    /// Maximum object nesting depth.
    pub max_depth: Option<usize>,
    /// Initial block-data buffer capacity in bytes.
    pub block_buffer_capacity: Option<usize>,
}

impl TryFrom<FileConfig> for StreamConfig {
    type Error = ConfigError;

    fn try_from(file: FileConfig) -> Result<Self, Self::Error> {
        let mut builder = StreamConfigBuilder::new();

        if let Some(version) = file.protocol_version {
            builder = builder.protocol_version(version.to_string().parse::<ProtocolVersion>()?);
        }

        if let Some(enable) = file.enable_replace {
            builder = builder.enable_replace(enable);
        }

        if let Some(enable) = file.enable_resolve {
            builder = builder.enable_resolve(enable);
        }

        if let Some(depth) = file.max_depth {
            builder = builder.max_depth(depth);
        }

        if let Some(capacity) = file.block_buffer_capacity {
            builder = builder.block_buffer_capacity(capacity);
        }

        builder.build()
    }
}

impl StreamConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_yaml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read YAML config file: {e}"))
        })?;
        let file_config: FileConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse YAML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from a TOML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read TOML config file: {e}"))
        })?;
        let file_config: FileConfig = toml_crate::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse TOML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from environment variables.
    ///
    /// This method is always available (no feature flag required).
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `OBJSTREAM_PROTOCOL_VERSION` | `1` or `2` |
    /// | `OBJSTREAM_ENABLE_REPLACE` | `"true"` or `"false"` |
    /// | `OBJSTREAM_ENABLE_RESOLVE` | `"true"` or `"false"` |
    /// | `OBJSTREAM_MAX_DEPTH` | Maximum nesting depth |
    /// | `OBJSTREAM_BLOCK_BUFFER_CAPACITY` | Block buffer capacity in bytes |
    ///
    /// Unset variables keep their defaults; numeric values that do not parse
    /// are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut file_config = FileConfig::default();

        if let Ok(val) = std::env::var("OBJSTREAM_PROTOCOL_VERSION") {
            let version = val.parse::<ProtocolVersion>()?;
            file_config.protocol_version = Some(version.as_u8());
        }

        if let Ok(val) = std::env::var("OBJSTREAM_ENABLE_REPLACE") {
            file_config.enable_replace = Some(val.eq_ignore_ascii_case("true"));
        }

        if let Ok(val) = std::env::var("OBJSTREAM_ENABLE_RESOLVE") {
            file_config.enable_resolve = Some(val.eq_ignore_ascii_case("true"));
        }

        if let Ok(val) = std::env::var("OBJSTREAM_MAX_DEPTH") {
            file_config.max_depth = Some(parse_env("OBJSTREAM_MAX_DEPTH", &val)?);
        }

        if let Ok(val) = std::env::var("OBJSTREAM_BLOCK_BUFFER_CAPACITY") {
            file_config.block_buffer_capacity =
                Some(parse_env("OBJSTREAM_BLOCK_BUFFER_CAPACITY", &val)?);
        }

        file_config.try_into()
    }
}

fn parse_env(name: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::new(format!("invalid {name}={value}: {e}")))
}

/// Loads configuration from a file, detecting the format from the extension.
///
/// Supports `.yaml`, `.yml`, and `.toml` extensions.
#[cfg(feature = "config-file")]
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<StreamConfig, ConfigError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => StreamConfig::from_yaml(path),
        Some("toml") => StreamConfig::from_toml(path),
        Some(ext) => Err(ConfigError::new(format!(
            "unsupported config file extension: .{ext} (expected .yaml, .yml, or .toml)"
        ))),
        None => Err(ConfigError::new(
            "config file has no extension; expected .yaml, .yml, or .toml",
        )),
    }
}
