//! core::ops
//!
//! Operations that guard shared repository state.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive lock on a work tree's index
//!
//! # Example
//!
//! ```ignore
//! use gitwork::core::ops::IndexLock;
//!
//! let lock = IndexLock::acquire(&paths)?;
//! // read the index, decide, maybe commit
//! drop(lock);
//! ```

pub mod lock;

pub use lock::{IndexLock, LockError};
