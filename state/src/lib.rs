//! persistree State Synchronization
//!
//! Keeps selected sub-trees of an in-memory state tree in sync with
//! key-value storage backends, using dotted paths grouped per backend.

pub mod tree;
pub mod reducer;
pub mod group;
pub mod engine;
pub mod store;
pub mod plugin;
pub mod memory;
pub mod persistent;

pub use tree::*;
pub use reducer::*;
pub use group::*;
pub use engine::*;
pub use store::*;
pub use plugin::*;
pub use memory::*;
pub use persistent::*;
