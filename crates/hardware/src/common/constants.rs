//! Global Engine Constants.
//!
//! This module defines constants used across the execution core. It includes:
//! 1. **Timing Constants:** The cycle type and the "never" sentinel.
//! 2. **Dependency Constants:** Input operand limits and replay penalties.
//! 3. **Memory Constants:** Page geometry and address helpers shared with the cache model.

/// Simulated cycle count.
pub type Tick = u64;

/// Timestamp meaning "not yet known" or "never happened".
pub const TICK_NEVER: Tick = Tick::MAX;

/// Latency reported by the cache model when the real latency is unknown.
///
/// Also used as the replay delay for a uop whose producer was predicted ready
/// but whose value never arrived.
pub const BIG_LATENCY: Tick = 99_999;

/// Maximum number of input operands (data-flow producers) per uop.
pub const MAX_IDEPS: usize = 3;

/// Number of bits to shift to convert between bytes and pages.
pub const PAGE_SHIFT: u64 = 12;

/// Replay count above which the tornado breaker uses its steep slope.
pub const TORNADO_STEEP_REPLAYS: u32 = 20;

/// Replay count above which the tornado breaker starts delaying.
pub const TORNADO_SHALLOW_REPLAYS: u32 = 4;

/// Address probed in the data TLB for a given address space and virtual address.
///
/// Page table entries are spread over a 64 MiB window, one 16-byte slot per
/// virtual page, offset by the address-space id.
pub const fn page_table_addr(asid: u32, addr: u64) -> u64 {
    ((((addr >> PAGE_SHIFT) << 4) + asid as u64) + 0x0008_0000) & 0x03ff_ffff
}

/// Returns `true` if `size` bytes at `addr` fall within one cache line.
///
/// A zero-sized access is treated as single-line.
pub const fn single_line_access(addr: u64, size: u64, line_bytes: u64) -> bool {
    if size == 0 || line_bytes == 0 {
        return true;
    }
    let shift = line_bytes.trailing_zeros();
    ((addr + size - 1) >> shift) == (addr >> shift)
}
