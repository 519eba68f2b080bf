//! NJLEG Common Library
//!
//! Shared error handling, checksum utilities, and logging setup for the
//! NJ Legislature data pipeline workspace.
//!
//! # Example
//!
//! ```no_run
//! use njleg_common::{Result, checksum};
//!
//! fn provenance(path: &str) -> Result<()> {
//!     let digest = checksum::sha256_file(path)?;
//!     println!("source sha256: {}", digest);
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{NjlegError, Result};
