//! Filesystem helpers for paramtree
//!
//! Provides normalized path handling, canonical path keys for include
//! tracking, and locked atomic I/O for config files.

pub mod error;
pub mod io;
pub mod path;
pub mod store;

pub use error::{Error, Result};
pub use path::NormalizedPath;
pub use store::ConfigStore;
