#![no_main]

use libfuzzer_sys::fuzz_target;

use objstream_core::io::mutf8;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = mutf8::decode(data) {
        let encoded = mutf8::encode(&text);
        assert_eq!(encoded.len(), mutf8::encoded_len(&text));
        assert_eq!(mutf8::decode(&encoded).ok().as_deref(), Some(text.as_str()));
    }
});
