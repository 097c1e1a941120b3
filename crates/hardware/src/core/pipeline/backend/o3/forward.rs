//! Byte-range arithmetic for memory disambiguation.
//!
//! Accesses are `[addr, addr + size)` byte ranges. Byte masks have bit 0 for
//! the lowest address of the range they describe.

/// How a store's bytes relate to a load's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overlap {
    /// Disjoint ranges.
    None,
    /// The store writes every byte the load reads.
    Full,
    /// Some but not all of the load's bytes.
    Partial,
}

/// Classifies a store range against a load range.
pub const fn classify(st_addr: u64, st_size: u64, ld_addr: u64, ld_size: u64) -> Overlap {
    let st_end = st_addr.saturating_add(st_size);
    let ld_end = ld_addr.saturating_add(ld_size);
    if st_addr <= ld_addr && st_end >= ld_end {
        Overlap::Full
    } else if st_end <= ld_addr || st_addr >= ld_end {
        Overlap::None
    } else {
        Overlap::Partial
    }
}

/// Returns `true` if the two ranges share a byte.
pub const fn ranges_overlap(a: u64, a_size: u64, b: u64, b_size: u64) -> bool {
    !matches!(classify(a, a_size, b, b_size), Overlap::None)
}

/// All-ones mask for `size` bytes.
pub const fn byte_mask(size: u64) -> u64 {
    if size >= 64 { u64::MAX } else { (1 << size) - 1 }
}

const fn shift(mask: u64, offset: i128) -> u64 {
    if offset >= 0 {
        if offset >= 64 { 0 } else { mask << (offset as u32) }
    } else if -offset >= 64 {
        0
    } else {
        mask >> ((-offset) as u32)
    }
}

/// Clears from `live` (a mask over the store at `base`) the bytes written
/// by a younger store `[addr, addr + size)`.
pub const fn clear_overwritten(live: u64, base: u64, addr: u64, size: u64) -> u64 {
    let offset = addr as i128 - base as i128;
    live & !shift(byte_mask(size), offset)
}

/// Returns `true` if a load reads any byte still live in `live`, a mask
/// over the store at `base`.
pub const fn reads_live_bytes(live: u64, base: u64, ld_addr: u64, ld_size: u64) -> bool {
    let offset = ld_addr as i128 - base as i128;
    let (store, load) = if offset < 0 {
        (shift(live, -offset), byte_mask(ld_size))
    } else {
        (live, shift(byte_mask(ld_size), offset))
    };
    store & load != 0
}

/// The bytes a load at `ld_addr` reads out of a store value written at
/// `st_addr`. The store must fully cover the load.
pub const fn extract(value: u64, st_addr: u64, ld_addr: u64, ld_size: u64) -> u64 {
    let offset = ld_addr.saturating_sub(st_addr);
    let shifted = if offset >= 8 { 0 } else { value >> (offset * 8) };
    if ld_size >= 8 {
        shifted
    } else {
        shifted & ((1 << (ld_size * 8)) - 1)
    }
}
