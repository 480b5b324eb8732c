//! Exact byte layouts and decoder failures on malformed or unexpected input.

mod common;

use common::*;
use objstream_core::model::{ClassDefinition, FieldType, ObjectRef, Value};
use objstream_core::protocol::constants::*;
use objstream_core::{DataOutput, ObjectInputStream, ObjectOutputStream, StreamConfig, StreamError};

const HEADER: [u8; 4] = [0xAC, 0xED, 0x00, 0x05];

#[test]
fn test_object_record_layout() {
    let class = ClassDefinition::builder("A")
        .serializable()
        .field("v", FieldType::Int)
        .field("t", FieldType::string())
        .field("s", FieldType::string())
        .serial_version(1)
        .build();
    let text = ObjectRef::string("x");
    let a = ObjectRef::instance(&class);
    a.set_field("v", 7).unwrap();
    a.set_field("s", text.clone()).unwrap();
    a.set_field("t", text).unwrap();

    let bytes = write_all(&[a.clone().into(), a.into()]);

    let mut expected = HEADER.to_vec();
    expected.extend_from_slice(&[TC_OBJECT, TC_CLASSDESC, 0, 1, b'A']);
    expected.extend_from_slice(&1i64.to_be_bytes());
    expected.extend_from_slice(&[SC_SERIALIZABLE, 0, 3]);
    // Primitive fields first, then references, each sorted by name.
    expected.extend_from_slice(&[b'I', 0, 1, b'v']);
    expected.extend_from_slice(&[b'L', 0, 1, b's', TC_STRING, 0, 18]);
    expected.extend_from_slice(b"Ljava/lang/String;");
    expected.extend_from_slice(&[b'L', 0, 1, b't', TC_REFERENCE, 0x00, 0x7E, 0x00, 0x01]);
    expected.extend_from_slice(&[TC_ENDBLOCKDATA, TC_NULL]);
    expected.extend_from_slice(&[0, 0, 0, 7]);
    expected.extend_from_slice(&[TC_STRING, 0, 1, b'x']);
    expected.extend_from_slice(&[TC_REFERENCE, 0x00, 0x7E, 0x00, 0x03]);
    expected.extend_from_slice(&[TC_REFERENCE, 0x00, 0x7E, 0x00, 0x02]);

    assert_eq!(bytes, expected);
}

#[test]
fn test_enum_record_layout() {
    let class = ClassDefinition::builder("E").enum_constants(["A"]).build();
    let bytes = write_all(&[class.enum_constant("A").unwrap().clone().into()]);

    let mut expected = HEADER.to_vec();
    expected.extend_from_slice(&[TC_ENUM, TC_CLASSDESC, 0, 1, b'E']);
    expected.extend_from_slice(&0i64.to_be_bytes());
    expected.extend_from_slice(&[SC_SERIALIZABLE | SC_ENUM, 0, 0, TC_ENDBLOCKDATA]);
    expected.extend_from_slice(&[TC_CLASSDESC, 0, 14]);
    expected.extend_from_slice(b"java.lang.Enum");
    expected.extend_from_slice(&0i64.to_be_bytes());
    expected.extend_from_slice(&[SC_SERIALIZABLE | SC_ENUM, 0, 0, TC_ENDBLOCKDATA, TC_NULL]);
    expected.extend_from_slice(&[TC_STRING, 0, 1, b'A']);

    assert_eq!(bytes, expected);
}

#[test]
fn test_modified_utf8_string_bytes() {
    let bytes = write_all(&[Value::string("\u{0}𝄞")]);
    assert_eq!(
        &bytes[4..],
        &[TC_STRING, 0, 8, 0xC0, 0x80, 0xED, 0xA0, 0xB4, 0xED, 0xB4, 0x9E]
    );
}

#[test]
fn test_primitive_array_layout() {
    let ints = objstream_core::model::Array::from_values(
        FieldType::Int,
        vec![Value::Int(1), Value::Int(2)],
    )
    .unwrap();
    let bytes = write_all(&[ObjectRef::array(ints).into()]);

    let body = &bytes[4..];
    assert_eq!(&body[..5], &[TC_ARRAY, TC_CLASSDESC, 0, 2, b'[']);
    assert_eq!(body[5], b'I');
    // version tag, flags, no fields, no annotations, no superclass
    let rest = &body[6 + 8..];
    assert_eq!(&rest[..5], &[SC_SERIALIZABLE, 0, 0, TC_ENDBLOCKDATA, TC_NULL]);
    assert_eq!(&rest[5..], &[0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2]);
}

#[test]
fn test_write_failure_is_read_back_as_write_aborted() {
    let socket = ClassDefinition::builder("com.example.Socket").build();
    let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
    assert!(out.write_object(ObjectRef::instance(&socket)).is_err());
    out.write_object(Value::string("after")).unwrap();
    let bytes = out.into_inner().unwrap();

    let mut input = reader(&bytes, &[]);
    match input.read_object() {
        Err(StreamError::WriteAborted { kind, message }) => {
            assert_eq!(kind, "NotSerializable");
            assert_eq!(message, "not serializable: com.example.Socket");
        }
        other => panic!("expected WriteAborted, got {:?}", other),
    }
    assert_eq!(input.read_object().unwrap().as_str().as_deref(), Some("after"));
}

#[test]
fn test_nested_write_failure() {
    let socket = ClassDefinition::builder("com.example.Socket").build();
    let pairs = pair_class();
    let p = pair(&pairs, ObjectRef::instance(&socket), Value::Null);

    let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
    assert!(matches!(
        out.write_object(p),
        Err(StreamError::NotSerializable(_))
    ));
    let bytes = out.into_inner().unwrap();

    let mut input = reader(&bytes, &[&pairs]);
    assert!(matches!(
        input.read_object(),
        Err(StreamError::WriteAborted { .. })
    ));
}

#[test]
fn test_bad_header() {
    let err = ObjectInputStream::new(&[0xCA, 0xFE, 0x00, 0x05][..]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "stream corrupted: invalid stream header: CAFE0005"
    );
}

#[test]
fn test_invalid_type_code() {
    let mut bytes = HEADER.to_vec();
    bytes.push(0x00);
    let mut input = reader(&bytes, &[]);
    match input.read_object() {
        Err(StreamError::StreamCorrupted(message)) => {
            assert_eq!(message, "invalid type code: 00")
        }
        other => panic!("expected StreamCorrupted, got {:?}", other),
    }
}

#[test]
fn test_truncated_object() {
    let class = point_class();
    let mut bytes = write_all(&[point(&class, 1, 2, "cut").into()]);
    bytes.truncate(bytes.len() - 2);

    let mut input = reader(&bytes, &[&class]);
    assert!(matches!(
        input.read_object(),
        Err(StreamError::UnexpectedEof(_))
    ));
}

#[test]
fn test_clean_end_of_stream() {
    let bytes = write_all(&[Value::Null]);
    let mut input = reader(&bytes, &[]);
    assert_eq!(input.read_object().unwrap(), Value::Null);
    assert!(input.read_object().unwrap_err().is_end_of_stream());
}

#[test]
fn test_block_data_where_object_expected() {
    let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
    out.write_int(1).unwrap();
    out.write_object(Value::string("s")).unwrap();
    let bytes = out.into_inner().unwrap();

    let mut input = reader(&bytes, &[]);
    assert!(matches!(
        input.read_object(),
        Err(StreamError::OptionalData { length: 4, eof: false })
    ));
    assert_eq!(input.available().unwrap(), 4);
    assert_eq!(objstream_core::DataInput::read_int(&mut input).unwrap(), 1);
    assert_eq!(input.read_object().unwrap().as_str().as_deref(), Some("s"));
}

#[test]
fn test_reset_inside_object_is_corrupt() {
    let class = ClassDefinition::builder("R")
        .serializable()
        .field("o", FieldType::object("java.lang.Object"))
        .serial_version(1)
        .build();
    let mut bytes = write_all(&[ObjectRef::instance(&class).into()]);
    // Replace the null field value with a reset followed by null.
    let last = bytes.len() - 1;
    assert_eq!(bytes[last], TC_NULL);
    bytes.insert(last, TC_RESET);

    let mut input = reader(&bytes, &[&class]);
    match input.read_object() {
        Err(StreamError::StreamCorrupted(message)) => {
            assert!(message.starts_with("unexpected reset"), "{}", message)
        }
        other => panic!("expected StreamCorrupted, got {:?}", other),
    }
}

#[test]
fn test_read_depth_limit() {
    let class = node_class();
    let head = ObjectRef::instance(&class);
    let mut tail = head.clone();
    for _ in 0..20 {
        let next = ObjectRef::instance(&class);
        tail.set_field("next", next.clone()).unwrap();
        tail = next;
    }
    let bytes = write_all(&[head.into()]);

    let config = StreamConfig::builder().max_depth(5).build().unwrap();
    let mut input = ObjectInputStream::with_config(
        std::io::Cursor::new(bytes),
        registry(&[&class]),
        config,
    )
    .unwrap();
    assert!(matches!(
        input.read_object(),
        Err(StreamError::InvalidObject(_))
    ));
}

#[test]
fn test_block_data_is_written_through_into_inner() {
    let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
    out.write_long(-1).unwrap();
    let bytes = out.into_inner().unwrap();
    assert_eq!(&bytes[4..], &[TC_BLOCKDATA, 8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
}

fn utf(text: &str) -> Vec<u8> {
    let mut bytes = (text.len() as u16).to_be_bytes().to_vec();
    bytes.extend_from_slice(text.as_bytes());
    bytes
}

#[test]
fn test_array_class_with_too_many_dimensions() {
    let name = format!("{}I", "[".repeat(60_000));
    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(&[TC_ARRAY, TC_CLASSDESC]);
    bytes.extend_from_slice(&utf(&name));
    bytes.extend_from_slice(&0i64.to_be_bytes());
    bytes.extend_from_slice(&[SC_SERIALIZABLE, 0, 0, TC_ENDBLOCKDATA, TC_NULL]);
    bytes.extend_from_slice(&[0, 0, 0, 0]);

    let mut input = reader(&bytes, &[]);
    match input.read_object() {
        Err(StreamError::InvalidClass { reason, .. }) => {
            assert!(reason.contains("more than 255 dimensions"), "{}", reason)
        }
        other => panic!("expected InvalidClass, got {:?}", other),
    }
}

#[test]
fn test_field_signature_with_too_many_dimensions() {
    let signature = format!("{}I", "[".repeat(60_000));
    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(&[TC_OBJECT, TC_CLASSDESC]);
    bytes.extend_from_slice(&utf("com.example.Deep"));
    bytes.extend_from_slice(&1i64.to_be_bytes());
    bytes.extend_from_slice(&[SC_SERIALIZABLE, 0, 1, b'[']);
    bytes.extend_from_slice(&utf("f"));
    bytes.push(TC_STRING);
    bytes.extend_from_slice(&utf(&signature));
    bytes.extend_from_slice(&[TC_ENDBLOCKDATA, TC_NULL, TC_NULL]);

    let mut input = reader(&bytes, &[]);
    match input.read_object() {
        Err(StreamError::StreamCorrupted(message)) => {
            assert!(message.starts_with("malformed type signature"), "{}", message)
        }
        other => panic!("expected StreamCorrupted, got {:?}", other),
    }
}
