//! Framed peer protocol
//!
//! Moves object graphs and ref updates between repositories over any pair
//! of opaque byte streams. The flow per session:
//!
//! ```text
//! negotiate -> advertise refs -> (push: updates + pack | pull: wants -> pack)
//!           -> Ok / Error
//! ```

pub mod client;
pub mod frame;
pub mod message;
pub mod remote_url;
pub mod server;
pub mod walker;

pub use client::{pull, push};
pub use message::{Message, Op, PROTOCOL_VERSION};
pub use remote_url::RemoteTarget;
pub use server::{BareRepository, serve};
