//! Stream configuration applied to readers and writers.

mod common;

use common::*;
use objstream_core::model::ObjectRef;
use objstream_core::{
    ObjectInputStream, ObjectOutputStream, ProtocolVersion, StreamConfig, StreamError, Value,
};

#[test]
fn test_builder_rejects_zero_depth() {
    let err = StreamConfig::builder().max_depth(0).build().unwrap_err();
    assert_eq!(err.message(), "max_depth must be greater than zero");
}

#[test]
fn test_writer_takes_protocol_version_from_config() {
    let config = StreamConfig::builder()
        .protocol_version(ProtocolVersion::V1)
        .build()
        .unwrap();
    let out = ObjectOutputStream::with_config(Vec::new(), config).unwrap();
    assert_eq!(out.protocol_version(), ProtocolVersion::V1);
}

#[test]
fn test_resolve_enabled_from_config_without_resolver() {
    let config = StreamConfig::builder().enable_resolve(true).build().unwrap();
    let bytes = write_all(&[Value::string("plain")]);

    let mut input =
        ObjectInputStream::with_config(std::io::Cursor::new(bytes), registry(&[]), config)
            .unwrap();
    assert_eq!(input.read_object().unwrap().as_str().as_deref(), Some("plain"));
}

#[test]
fn test_write_depth_limit_from_config() {
    let class = node_class();
    let head = ObjectRef::instance(&class);
    let next = ObjectRef::instance(&class);
    let last = ObjectRef::instance(&class);
    head.set_field("next", next.clone()).unwrap();
    next.set_field("next", last).unwrap();

    let config = StreamConfig::builder().max_depth(2).build().unwrap();
    let mut out = ObjectOutputStream::with_config(Vec::new(), config).unwrap();
    assert!(matches!(
        out.write_object(head),
        Err(StreamError::InvalidObject(_))
    ));
}

#[cfg(feature = "config-file")]
#[test]
fn test_load_config_from_yaml_file() {
    let path = std::env::temp_dir().join(format!("objstream-{}.yaml", std::process::id()));
    std::fs::write(&path, "protocol-version: 1\nmax-depth: 64\n").unwrap();

    let config = objstream_core::load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.protocol_version(), ProtocolVersion::V1);
    assert_eq!(config.max_depth(), 64);
}

#[cfg(feature = "config-file")]
#[test]
fn test_load_config_from_toml_file() {
    let path = std::env::temp_dir().join(format!("objstream-{}.toml", std::process::id()));
    std::fs::write(&path, "enable-replace = true\nblock-buffer-capacity = 2048\n").unwrap();

    let config = objstream_core::load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(config.enable_replace());
    assert_eq!(config.block_buffer_capacity(), 2048);
}
