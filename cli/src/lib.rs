//! persistree CLI library
//!
//! Helpers behind the `persistree` binary: opening a sled storage directory,
//! loading state and config files, and driving a store through the plugin.

pub mod commands;

pub use commands::*;
