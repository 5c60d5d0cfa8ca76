//! # mediasync common library
//!
//! Shared code for the mediasync crates:
//! - Error type
//! - Configuration loading (TOML file, environment, compiled defaults)
//! - Human-readable byte size formatting

pub mod config;
pub mod error;
pub mod human_size;

pub use config::ImporterConfig;
pub use error::{Error, Result};
pub use human_size::format_human_size;
