//! Data model and algorithms
//!
//! - `objects`: object types (blob, tree, commit), ids, and the canonical
//!   codec
//! - `index`: staging file entry, header, and checksum encoding
//! - `diff`: Myers shortest edit script folded into unified hunks
//! - `status`: change-set types reported by the repository facade

pub mod diff;
pub mod index;
pub mod objects;
pub mod status;
