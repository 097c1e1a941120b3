
/// Configuration loading, defaults and validation.
pub mod config;

/// Memory fences in the load queue.
pub mod fences;

/// Store-to-load forwarding and order-violation detection.
pub mod forwarding;


/// Memory completions: misses, stale tokens and the repeater.
pub mod memory;

/// Memory-dependence predictors.
pub mod memdep;



/// Ready queues, issue and functional-unit timing.
pub mod scheduler;

/// Statistics accumulation and reporting.
pub mod stats;
