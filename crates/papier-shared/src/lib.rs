//! # papier-shared
//!
//! Pure, I/O-free foundation of the papier workspace: the message-file
//! codec (filename grammar + header/body document format), the shared
//! newtypes used as keys across crates, and the protocol constants.
//!
//! Everything here is deterministic given its inputs; the codec is the
//! interoperability boundary and must stay bit-exact.

pub mod codec;
pub mod constants;
pub mod message;
pub mod types;

mod error;

pub use error::CodecError;
pub use message::Message;
