//! persistree Core Library
//! 
//! Core types, traits, and configuration for path-selective state persistence.
//! This crate provides the foundation the sync engine and the CLI build on.

pub mod types;
pub mod traits;
pub mod error;
pub mod config;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use config::*;
