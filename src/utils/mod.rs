//! Utility Module
//!
//! This module provides the foundation types the resource subsystem is
//! built on:
//!
//! - [`interner`]: String interning for asset and bone names
//! - [`pool`]: Fixed-capacity generational object pool
//!
//! # String Interning
//!
//! The interner module provides efficient storage for frequently compared
//! identifiers like asset keys and bone names. Interned strings (Symbols)
//! can be compared in O(1) time.
//!
//! ```rust,ignore
//! use rig::utils::interner;
//!
//! let sym1 = interner::intern("pelvis");
//! let sym2 = interner::intern("pelvis");
//! assert_eq!(sym1, sym2); // O(1) comparison
//! ```

pub mod interner;
pub mod pool;

pub use interner::Symbol;
pub use pool::{Pool, PoolHandle};
