//! Wire constants for the object stream protocol.

/// Magic number written at the start of every stream.
pub const STREAM_MAGIC: u16 = 0xACED;

/// Stream format version written after the magic number.
pub const STREAM_VERSION: u16 = 5;

/// Size of the stream header (magic + version).
pub const STREAM_HEADER_SIZE: usize = 4;

// Record tags.

/// Null reference.
pub const TC_NULL: u8 = 0x70;

/// Back-reference to a previously written record.
pub const TC_REFERENCE: u8 = 0x71;

/// New class descriptor.
pub const TC_CLASSDESC: u8 = 0x72;

/// New object.
pub const TC_OBJECT: u8 = 0x73;

/// New string with a 2-byte length.
pub const TC_STRING: u8 = 0x74;

/// New array.
pub const TC_ARRAY: u8 = 0x75;

/// Class object.
pub const TC_CLASS: u8 = 0x76;

/// Block data with a 1-byte length.
pub const TC_BLOCKDATA: u8 = 0x77;

/// End of optional block data for an object or descriptor annotation.
pub const TC_ENDBLOCKDATA: u8 = 0x78;

/// Handle table reset.
pub const TC_RESET: u8 = 0x79;

/// Block data with a 4-byte length.
pub const TC_BLOCKDATALONG: u8 = 0x7A;

/// Failure recorded during a write.
pub const TC_EXCEPTION: u8 = 0x7B;

/// New string with an 8-byte length.
pub const TC_LONGSTRING: u8 = 0x7C;

/// New proxy class descriptor.
pub const TC_PROXYCLASSDESC: u8 = 0x7D;

/// New enum constant.
pub const TC_ENUM: u8 = 0x7E;

/// Lowest valid record tag.
pub const TC_BASE: u8 = TC_NULL;

/// Highest valid record tag.
pub const TC_MAX: u8 = TC_ENUM;

/// First handle assigned in a session and after every reset.
pub const BASE_WIRE_HANDLE: u32 = 0x7E_0000;

// Descriptor flags.

/// The class has a custom write hook that frames its data as block data.
pub const SC_WRITE_METHOD: u8 = 0x01;

/// The class is serializable.
pub const SC_SERIALIZABLE: u8 = 0x02;

/// The class is externalizable.
pub const SC_EXTERNALIZABLE: u8 = 0x04;

/// Externalizable data is written in block-data mode (protocol version 2).
pub const SC_BLOCK_DATA: u8 = 0x08;

/// The class is an enum type.
pub const SC_ENUM: u8 = 0x10;

// Block data framing.

/// Maximum payload of a single block-data chunk.
pub const MAX_BLOCK_SIZE: usize = 1024;

/// Chunks shorter than this use the 1-byte length form.
pub const SHORT_BLOCK_LIMIT: usize = 256;

/// Longest string that uses the 2-byte length form.
pub const MAX_SHORT_STRING: usize = 0xFFFF;

/// Returns a readable name for a record tag, used in diagnostics.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        TC_NULL => "TC_NULL",
        TC_REFERENCE => "TC_REFERENCE",
        TC_CLASSDESC => "TC_CLASSDESC",
        TC_OBJECT => "TC_OBJECT",
        TC_STRING => "TC_STRING",
        TC_ARRAY => "TC_ARRAY",
        TC_CLASS => "TC_CLASS",
        TC_BLOCKDATA => "TC_BLOCKDATA",
        TC_ENDBLOCKDATA => "TC_ENDBLOCKDATA",
        TC_RESET => "TC_RESET",
        TC_BLOCKDATALONG => "TC_BLOCKDATALONG",
        TC_EXCEPTION => "TC_EXCEPTION",
        TC_LONGSTRING => "TC_LONGSTRING",
        TC_PROXYCLASSDESC => "TC_PROXYCLASSDESC",
        TC_ENUM => "TC_ENUM",
        _ => "unknown",
    }
}
