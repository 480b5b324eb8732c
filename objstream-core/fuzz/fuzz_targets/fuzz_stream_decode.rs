#![no_main]

use libfuzzer_sys::fuzz_target;

use objstream_core::model::{ClassDefinition, FieldType};
use objstream_core::{ClassRegistry, ObjectInputStream, StreamConfig};

fuzz_target!(|data: &[u8]| {
    let node = ClassDefinition::builder("com.example.Node")
        .serializable()
        .field("value", FieldType::Int)
        .field("next", FieldType::object("com.example.Node"))
        .build();
    let mut classes = ClassRegistry::new();
    classes.register(&node);

    let config = match StreamConfig::builder().max_depth(64).build() {
        Ok(config) => config,
        Err(_) => return,
    };
    let mut input = match ObjectInputStream::with_config(data, classes, config) {
        Ok(input) => input,
        Err(_) => return,
    };

    for _ in 0..64 {
        match input.try_read_object() {
            Ok(Some(value)) => {
                let _ = value.type_name();
            }
            Ok(None) | Err(_) => break,
        }
    }
});
