//! Shared primitives: errors, codecs, validators

pub mod codec;
pub mod error;
pub mod validate;

pub use error::{Error, Result};
