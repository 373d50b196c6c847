//! Small utilities shared across the chatrelay crates.

pub mod error;
pub mod time;

pub use error::FromMessage;
