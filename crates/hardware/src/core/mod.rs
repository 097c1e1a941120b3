//! Execution core.
//!
//! This module contains the out-of-order engine and everything it is built from:
//! 1. **Uops:** The micro-op record, the pool that owns it and dependency edges.
//! 2. **Pipeline:** The engine interface, its signals and the O3 implementation.
//! 3. **Units:** The memory hierarchy interface and memory-dependence predictors.

/// Out-of-order execution pipeline and its interface.
pub mod pipeline;

/// Memory-side units consulted by the engine.
pub mod units;

/// Micro-op records and the uop pool.
pub mod uop;
