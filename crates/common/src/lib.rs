//! Helpers shared by the jfp crates: message-based error context and atomic
//! file replacement.

pub mod error;
pub mod fs;

pub use error::FromMessage;
