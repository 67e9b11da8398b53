pub mod blob;
pub mod codec;
pub mod commit;
pub mod entry_mode;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;

/// Raw digest width in bytes
pub const DIGEST_SIZE: usize = 32;

/// Hex digest width in characters
pub const HEX_DIGEST_LENGTH: usize = 64;
