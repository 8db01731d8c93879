//! Common utilities and types shared across lockbox crates.
//!
//! Every crate in the workspace reports failures through the single
//! [`Error`] taxonomy defined here, so callers can match on the cause
//! without caring which layer produced it.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::SensitiveBytes;
