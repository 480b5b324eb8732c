//! Stream configuration.

use std::fmt;
use std::str::FromStr;

/// Default nesting limit for object graphs.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Default initial capacity of the block-data buffer, in bytes.
pub const DEFAULT_BLOCK_BUFFER_CAPACITY: usize = 1024;

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Stream protocol version.
///
/// Version 2 frames externalizable data as block data so a reader without
/// the class can skip it; version 1 writes it unframed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    /// Unframed externalizable data.
    V1,
    /// Block-data framed externalizable data.
    #[default]
    V2,
}

impl ProtocolVersion {
    /// Returns the numeric version.
    pub fn as_u8(&self) -> u8 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(ProtocolVersion::V1),
            "2" | "v2" => Ok(ProtocolVersion::V2),
            other => Err(ConfigError::new(format!(
                "unknown protocol version: {other} (expected 1 or 2)"
            ))),
        }
    }
}

/// Settings shared by the object output and input streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    protocol_version: ProtocolVersion,
    enable_replace: bool,
    enable_resolve: bool,
    max_depth: usize,
    block_buffer_capacity: usize,
}

impl StreamConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::new()
    }

    /// Returns the protocol version the writer starts with.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// Returns whether stream-level replacement is enabled when a writer is created.
    pub fn enable_replace(&self) -> bool {
        self.enable_replace
    }

    /// Returns whether stream-level resolution is enabled when a reader is created.
    pub fn enable_resolve(&self) -> bool {
        self.enable_resolve
    }

    /// Returns the maximum object nesting depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the initial capacity of the block-data buffer.
    pub fn block_buffer_capacity(&self) -> usize {
        self.block_buffer_capacity
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::default(),
            enable_replace: false,
            enable_resolve: false,
            max_depth: DEFAULT_MAX_DEPTH,
            block_buffer_capacity: DEFAULT_BLOCK_BUFFER_CAPACITY,
        }
    }
}

/// Builder for [`StreamConfig`].
#[derive(Debug, Clone, Default)]
pub struct StreamConfigBuilder {
    protocol_version: Option<ProtocolVersion>,
    enable_replace: Option<bool>,
    enable_resolve: Option<bool>,
    max_depth: Option<usize>,
    block_buffer_capacity: Option<usize>,
}

impl StreamConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the protocol version.
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = Some(version);
        self
    }

    /// Enables stream-level replacement from the start.
    pub fn enable_replace(mut self, enable: bool) -> Self {
        self.enable_replace = Some(enable);
        self
    }

    /// Enables stream-level resolution from the start.
    pub fn enable_resolve(mut self, enable: bool) -> Self {
        self.enable_resolve = Some(enable);
        self
    }

    /// Sets the maximum object nesting depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the initial capacity of the block-data buffer.
    pub fn block_buffer_capacity(mut self, capacity: usize) -> Self {
        self.block_buffer_capacity = Some(capacity);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `max_depth` or `block_buffer_capacity` is zero.
    pub fn build(self) -> Result<StreamConfig, ConfigError> {
        let max_depth = self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        if max_depth == 0 {
            return Err(ConfigError::new("max_depth must be greater than zero"));
        }

        let block_buffer_capacity = self
            .block_buffer_capacity
            .unwrap_or(DEFAULT_BLOCK_BUFFER_CAPACITY);
        if block_buffer_capacity == 0 {
            return Err(ConfigError::new(
                "block_buffer_capacity must be at least 1",
            ));
        }

        Ok(StreamConfig {
            protocol_version: self.protocol_version.unwrap_or_default(),
            enable_replace: self.enable_replace.unwrap_or(false),
            enable_resolve: self.enable_resolve.unwrap_or(false),
            max_depth,
            block_buffer_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.protocol_version(), ProtocolVersion::V2);
        assert!(!config.enable_replace());
        assert!(!config.enable_resolve());
        assert_eq!(config.max_depth(), DEFAULT_MAX_DEPTH);
        assert_eq!(config.block_buffer_capacity(), DEFAULT_BLOCK_BUFFER_CAPACITY);
    }

    #[test]
    fn test_builder_matches_default() {
        assert_eq!(StreamConfig::builder().build().unwrap(), StreamConfig::default());
    }

    #[test]
    fn test_builder_sets_values() {
        let config = StreamConfigBuilder::new()
            .protocol_version(ProtocolVersion::V1)
            .enable_replace(true)
            .enable_resolve(true)
            .max_depth(16)
            .block_buffer_capacity(64)
            .build()
            .unwrap();
        assert_eq!(config.protocol_version(), ProtocolVersion::V1);
        assert!(config.enable_replace());
        assert!(config.enable_resolve());
        assert_eq!(config.max_depth(), 16);
        assert_eq!(config.block_buffer_capacity(), 64);
    }

    #[test]
    fn test_zero_max_depth_rejected() {
        let err = StreamConfig::builder().max_depth(0).build().unwrap_err();
        assert!(err.message().contains("max_depth"));
    }

    #[test]
    fn test_zero_buffer_capacity_rejected() {
        let err = StreamConfig::builder()
            .block_buffer_capacity(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().starts_with("configuration error:"));
    }

    #[test]
    fn test_protocol_version_from_str() {
        assert_eq!("1".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V1);
        assert_eq!("V2".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V2);
        assert!("3".parse::<ProtocolVersion>().is_err());
        assert_eq!(ProtocolVersion::V1.as_u8(), 1);
    }
}
