//! mediasync-importer library interface
//!
//! The binary in `main.rs` wires these together; integration tests drive
//! the same pipeline with fake process runners and notifiers.

pub mod models;
pub mod services;

pub use crate::services::{ProcessedSet, ScanLoop};
