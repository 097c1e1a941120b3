//! Common utilities and types used throughout the execution core.
//!
//! This module provides the building blocks shared by every unit of the engine:
//! 1. **Arena:** Generation-tagged handles and a slot arena with an explicit free list.
//! 2. **Constants:** Timing sentinels, dependency limits and address helpers.
//! 3. **Epochs:** The action-id service used to detect stale references.
//! 4. **Error Handling:** Fatal engine errors and configuration errors.

/// Slot arena addressed by generation-tagged handles.
pub mod arena;

/// Common constants used throughout the engine.
pub mod constants;

/// Action-id (epoch) allocation.
pub mod epoch;

/// Error types for the engine and its configuration.
pub mod error;

pub use arena::{Arena, Handle};
pub use constants::{
    BIG_LATENCY, MAX_IDEPS, PAGE_SHIFT, TICK_NEVER, TORNADO_SHALLOW_REPLAYS, TORNADO_STEEP_REPLAYS, Tick,
    page_table_addr, single_line_access,
};
pub use epoch::{ActionId, ActionIdSource};
pub use error::{ConfigError, ExecError};
