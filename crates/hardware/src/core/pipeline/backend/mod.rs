//! Execution backends.
//!
//! Only the out-of-order backend exists; simpler timing models would live
//! beside it and implement the same engine trait.

pub mod o3;
