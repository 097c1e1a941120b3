//! Cycle-accurate out-of-order execution core.
//!
//! This crate models the execute half of a superscalar x86-style core, one
//! cycle at a time:
//! 1. **Scheduling:** Per-port ready queues, payload pipelines, speculative tag
//!    broadcast, replay and snatch-back.
//! 2. **Functional Units:** Pipelined units with latency and issue rate, and a
//!    single bypass network per port.
//! 3. **Memory Ordering:** Load and store queues, store-to-load forwarding,
//!    memory-dependence prediction and order-violation detection.
//! 4. **Memory Interface:** Split-line accesses to the DTLB, DL1 and memory
//!    repeater through the [`MemoryHierarchy`](core::units::cache::MemoryHierarchy) trait.
//! 5. **Configuration and Statistics:** JSON-loadable knobs and per-cycle counters.

/// Common types and constants (handles, ticks, action ids, errors).
pub mod common;
/// Engine configuration (ports, units, queue sizes, memory, predictor).
pub mod config;
/// Execution core (uops, engine, queues, memory-side units).
pub mod core;
/// Execution statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or load it from JSON.
pub use crate::config::Config;
/// The detailed out-of-order engine.
pub use crate::core::pipeline::backend::o3::O3Engine;
/// Surface the allocation and commit stages drive the engine through.
pub use crate::core::pipeline::engine::ExecutionEngine;
/// Owner of all in-flight uops and their dependency edges.
pub use crate::core::uop::UopPool;
/// Fixed-latency memory hierarchy for driving the engine without a cache model.
pub use crate::core::units::cache::TimedHierarchy;
