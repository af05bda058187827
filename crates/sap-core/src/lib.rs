//! Shared vocabulary for the SAP plant retrieval workspace: domain types,
//! the error taxonomy, provider traits and configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
