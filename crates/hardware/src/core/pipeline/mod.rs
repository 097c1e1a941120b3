//! Execution pipeline.
//!
//! This module contains the execution side of the pipeline:
//! 1. **Engine:** The [`ExecutionEngine`](engine::ExecutionEngine) trait allocation and commit call into.
//! 2. **Signals:** Redirects the engine raises towards the front end.
//! 3. **Backend:** The out-of-order implementation.

/// Execution backends.
pub mod backend;

/// Interface between allocation/commit and the execution core.
pub mod engine;

/// Recover and flush signals raised during execution.
pub mod signals;
