//! Execution statistics collection and reporting.
//!
//! This module tracks performance counters for the execution core. It provides:
//! 1. **Issue and replay:** Uops issued, replayed and snatched back.
//! 2. **Hardware events:** Branch recoveries, memory-order nukes and store forwards.
//! 3. **Cache traffic:** Split (line-crossing) load and store accesses.
//! 4. **Occupancy:** Per-cycle accumulation for RS, LDQ, STQ and functional units,
//!    with full/empty cycle counts.

use std::fmt;

/// Execution-core statistics.
///
/// All counters are plain totals; averages are derived at report time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecStats {
    /// Cycles simulated.
    pub cycles: u64,

    /// Uops moved from a ready queue into a payload pipe.
    pub uops_issued: u64,
    /// Uops that reached execute without their inputs or a free unit.
    pub uops_replayed: u64,
    /// Uops pulled back out of a payload pipe by a squash.
    pub uops_snatched_back: u64,

    /// Branch recoveries signalled by the execution core.
    pub num_jeclear: u64,
    /// Branch recoveries on the wrong path.
    pub num_wp_jeclear: u64,
    /// Memory-order violations that flushed a completed load.
    pub load_nukes: u64,
    /// Memory-order violations on the wrong path.
    pub wp_load_nukes: u64,
    /// Loads satisfied by store-to-load forwarding.
    pub stq_forwards: u64,
    /// Loads blocked by a partial store overlap.
    pub partial_forwards: u64,

    /// Line-crossing loads that issued a second DL1 request.
    pub dl1_load_split_accesses: u64,
    /// Line-crossing stores that issued a second DL1 request.
    pub dl1_store_split_accesses: u64,

    /// Memory-dependence predictor lookups.
    pub memdep_lookups: u64,
    /// Memory-dependence predictor trainings.
    pub memdep_updates: u64,

    /// Sum of allocated RS entries per cycle.
    pub rs_occupancy: u64,
    /// Sum of effective (per-uop) RS entries per cycle.
    pub rs_eff_occupancy: u64,
    /// Cycles the RS was empty.
    pub rs_empty_cycles: u64,
    /// Cycles the RS was full.
    pub rs_full_cycles: u64,
    /// Sum of LDQ entries per cycle.
    pub ldq_occupancy: u64,
    /// Cycles the LDQ was empty.
    pub ldq_empty_cycles: u64,
    /// Cycles the LDQ was full.
    pub ldq_full_cycles: u64,
    /// Sum of regular STQ entries per cycle.
    pub stq_occupancy: u64,
    /// Cycles the STQ was empty.
    pub stq_empty_cycles: u64,
    /// Cycles the STQ was full.
    pub stq_full_cycles: u64,
    /// Sum of busy integer-unit slots per cycle.
    pub int_fu_occupancy: u64,
    /// Sum of busy FP-unit slots per cycle.
    pub fp_fu_occupancy: u64,
    /// Sum of busy multiply/divide slots per cycle.
    pub mul_fu_occupancy: u64,
}

impl ExecStats {
    fn per_cycle(&self, total: u64) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            total as f64 / self.cycles as f64
        }
    }

    /// Average issued uops per cycle.
    pub fn issue_rate(&self) -> f64 {
        self.per_cycle(self.uops_issued)
    }

    /// Fraction of issued uops that had to replay.
    pub fn replay_ratio(&self) -> f64 {
        if self.uops_issued == 0 {
            0.0
        } else {
            self.uops_replayed as f64 / self.uops_issued as f64
        }
    }

    /// Average RS occupancy.
    pub fn rs_avg(&self) -> f64 {
        self.per_cycle(self.rs_occupancy)
    }

    /// Average LDQ occupancy.
    pub fn ldq_avg(&self) -> f64 {
        self.per_cycle(self.ldq_occupancy)
    }

    /// Average STQ occupancy.
    pub fn stq_avg(&self) -> f64 {
        self.per_cycle(self.stq_occupancy)
    }
}

impl fmt::Display for ExecStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EXECUTION CORE")?;
        writeln!(f, "  cycles                  {}", self.cycles)?;
        writeln!(
            f,
            "  uops issued             {} ({:.3}/cycle)",
            self.uops_issued,
            self.issue_rate()
        )?;
        writeln!(
            f,
            "  uops replayed           {} ({:.2}%)",
            self.uops_replayed,
            self.replay_ratio() * 100.0
        )?;
        writeln!(f, "  uops snatched back      {}", self.uops_snatched_back)?;
        writeln!(
            f,
            "  jeclears                {} (wrong path {})",
            self.num_jeclear, self.num_wp_jeclear
        )?;
        writeln!(
            f,
            "  load nukes              {} (wrong path {})",
            self.load_nukes, self.wp_load_nukes
        )?;
        writeln!(f, "  stq forwards            {}", self.stq_forwards)?;
        writeln!(f, "  partial forwards        {}", self.partial_forwards)?;
        writeln!(
            f,
            "  split accesses          ld {} / st {}",
            self.dl1_load_split_accesses, self.dl1_store_split_accesses
        )?;
        writeln!(
            f,
            "  memdep                  lookups {} / updates {}",
            self.memdep_lookups, self.memdep_updates
        )?;
        writeln!(
            f,
            "  RS  avg {:.2} eff {:.2}  empty {} full {}",
            self.rs_avg(),
            self.per_cycle(self.rs_eff_occupancy),
            self.rs_empty_cycles,
            self.rs_full_cycles
        )?;
        writeln!(
            f,
            "  LDQ avg {:.2}  empty {} full {}",
            self.ldq_avg(),
            self.ldq_empty_cycles,
            self.ldq_full_cycles
        )?;
        writeln!(
            f,
            "  STQ avg {:.2}  empty {} full {}",
            self.stq_avg(),
            self.stq_empty_cycles,
            self.stq_full_cycles
        )?;
        write!(
            f,
            "  FU  int {:.2} fp {:.2} mul {:.2}",
            self.per_cycle(self.int_fu_occupancy),
            self.per_cycle(self.fp_fu_occupancy),
            self.per_cycle(self.mul_fu_occupancy)
        )
    }
}
