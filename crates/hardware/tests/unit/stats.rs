//! # Statistics Tests

use pretty_assertions::assert_eq;
use uarch_exec::ExecutionEngine;
use uarch_exec::config::Config;
use uarch_exec::core::uop::FuClass;
use uarch_exec::stats::ExecStats;

use crate::common::{TestContext, UopBuilder};

#[test]
fn test_occupancy_accumulates_per_cycle() {
    let mut config = Config::default();
    config.exec.rs_size = 3;
    let mut ctx = TestContext::with_config(&config);
    let _ = ctx.alloc(UopBuilder::alu(1).build());
    let _ = ctx.alloc(UopBuilder::alu(2).build());
    let _ = ctx.alloc(UopBuilder::load(3, 0x1000, 4).build());
    ctx.run(4);

    // Nothing was readied: every cycle sees the same contents.
    let s = ctx.engine.stats();
    assert_eq!(s.cycles, 4);
    assert_eq!(s.rs_occupancy, 12);
    assert_eq!(s.rs_full_cycles, 4);
    assert_eq!(s.rs_empty_cycles, 0);
    assert_eq!(s.ldq_occupancy, 4);
    assert_eq!(s.ldq_empty_cycles, 0);
    assert_eq!(s.stq_empty_cycles, 4);
    assert!((s.rs_avg() - 3.0).abs() < f64::EPSILON);
    assert!((s.ldq_avg() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_busy_divider_counts_as_mul_occupancy() {
    let mut ctx = TestContext::new();
    let d = ctx.alloc(UopBuilder::alu(1).class(FuClass::Idiv).build());
    ctx.ready(d);
    ctx.run(5);
    let s = ctx.engine.stats();
    assert!(s.mul_fu_occupancy > 0);
    assert_eq!(s.fp_fu_occupancy, 0);
    assert_eq!(s.uops_issued, 1);
}

#[test]
fn test_rates_with_no_cycles() {
    let s = ExecStats::default();
    for rate in [s.issue_rate(), s.replay_ratio(), s.rs_avg(), s.stq_avg()] {
        assert!(rate.abs() < f64::EPSILON);
    }
}

#[test]
fn test_report_lists_counters() {
    let s = ExecStats {
        cycles: 10,
        uops_issued: 5,
        uops_replayed: 1,
        load_nukes: 2,
        ..ExecStats::default()
    };
    let report = s.to_string();
    assert!(report.starts_with("EXECUTION CORE"));
    assert!(report.contains("uops issued             5 (0.500/cycle)"));
    assert!(report.contains("uops replayed           1 (20.00%)"));
    assert!(report.contains("load nukes              2 (wrong path 0)"));
}
