//! Memory-side units.
//!
//! This module contains the pieces of the memory system the execution core
//! talks to, including the cache hierarchy interface with a fixed-latency
//! implementation and the memory-dependence predictors.

/// Cache hierarchy interface and a fixed-latency hierarchy.
pub mod cache;

/// Memory-dependence predictors.
pub mod memdep;
