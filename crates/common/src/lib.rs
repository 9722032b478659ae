//! Common utilities and types shared across Sitewatch crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
