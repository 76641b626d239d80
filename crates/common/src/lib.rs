//! Common types shared by the DENUE quantifier crates

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
