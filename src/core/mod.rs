//! core
//!
//! Core domain types, configuration, and operations for gitwork.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Oid, RefName, BranchName
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Path routing inside a git directory
//! - [`ops`] - Index locking
//! - [`conflict`] - Two-way conflict-marker codec
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing here touches the object store

pub mod config;
pub mod conflict;
pub mod ops;
pub mod paths;
pub mod types;
