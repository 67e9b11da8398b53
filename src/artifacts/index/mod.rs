//! Staging index file format
//!
//! The index is a binary snapshot of the next commit's tree, one row per
//! file.
//!
//! ## File format (version 1)
//!
//! ```text
//! Header (12 bytes):
//!   - Magic: "MRIX" (4 bytes)
//!   - Version: 1 (u32 big-endian)
//!   - Entry count (u32 big-endian)
//!
//! Entries (variable length, ascending ordinal path order):
//!   - mtime seconds (u64 BE), mtime nanoseconds (u32 BE), size (u32 BE)
//!   - content digest (32 bytes)
//!   - flags (u16 BE): min(path length, 0xFFF)
//!   - path (UTF-8, NUL-terminated, zero-padded to 8-byte alignment)
//!
//! Checksum (32 bytes):
//!   - SHA-256 over all preceding bytes
//! ```

pub mod checksum;
pub mod index_entry;
pub mod index_header;

/// Magic bytes identifying index files
pub const SIGNATURE: &[u8; 4] = b"MRIX";

/// Index file format version
pub const VERSION: u32 = 1;

/// Header width: magic, version, entry count
pub const HEADER_SIZE: usize = 12;

/// Trailing SHA-256 width
pub const CHECKSUM_SIZE: usize = 32;

/// Entries are zero-padded to this alignment
pub const ENTRY_BLOCK: usize = 8;

/// Smallest possible entry: 50 fixed bytes, one path byte, NUL, padding
pub const ENTRY_MIN_SIZE: usize = 56;

/// Flags saturate at this path length
pub const MAX_PATH_FLAG: usize = 0xFFF;
