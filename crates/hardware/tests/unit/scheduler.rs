//! # Scheduler Tests
//!
//! Issue order, payload and functional-unit timing, tag broadcast to
//! dependents, and ready-queue preconditions.

use pretty_assertions::assert_eq;
use uarch_exec::ExecutionEngine;
use uarch_exec::common::{ExecError, TICK_NEVER};
use uarch_exec::config::{Config, FuConfig};
use uarch_exec::core::uop::FuClass;

use crate::common::{TestContext, UopBuilder};

#[test]
fn test_single_alu_uop_timing() {
    let mut ctx = TestContext::new();
    let a = ctx.alloc(UopBuilder::alu(1).value(9).build());
    ctx.ready(a);
    assert_eq!(ctx.engine.rs.len(), 1);

    ctx.run(3);

    let u = ctx.uop(a);
    assert_eq!(u.timing.when_issued, 0);
    assert_eq!(u.timing.when_otag_ready, 1);
    assert_eq!(u.timing.when_exec, 1);
    assert_eq!(u.timing.when_completed, 2);
    assert_eq!(u.exec.ovalue, 9);
    assert!(u.exec.ovalue_valid);
    assert!(ctx.engine.rs.is_empty());
    assert_eq!(ctx.engine.stats().uops_issued, 1);
    assert_eq!(ctx.engine.stats().cycles, 3);
}

#[test]
fn test_dependent_issues_back_to_back() {
    let mut ctx = TestContext::new();
    let p = ctx.alloc(UopBuilder::alu(1).value(5).build());
    let c = ctx.alloc(UopBuilder::alu(2).port(1).build());
    ctx.link(p, c, 0);
    ctx.ready(p);

    // Producer issue broadcasts its tag; the consumer issues the next cycle.
    ctx.tick();
    assert!(ctx.uop(c).exec.in_ready_queue);
    assert_eq!(ctx.uop(c).timing.when_ready, 1);

    ctx.run(3);
    let c = ctx.uop(c);
    assert_eq!(c.timing.when_issued, 1);
    assert_eq!(c.exec.ivalue[0], 5);
    assert_eq!(c.timing.when_ival_ready[0], 2);
    assert_eq!(c.timing.when_completed, 3);
    assert_eq!(ctx.engine.stats().uops_replayed, 0);
}

#[test]
fn test_one_issue_per_port_oldest_first() {
    let mut ctx = TestContext::new();
    let young = ctx.alloc(UopBuilder::alu(7).build());
    let old = ctx.alloc(UopBuilder::alu(3).build());
    ctx.ready(young);
    ctx.ready(old);

    ctx.tick();
    assert_eq!(ctx.uop(old).timing.when_issued, 0);
    assert_eq!(ctx.uop(young).timing.when_issued, TICK_NEVER);

    ctx.tick();
    assert_eq!(ctx.uop(young).timing.when_issued, 1);
}

#[test]
fn test_unpipelined_unit_blocks_issue() {
    let mut ctx = TestContext::new();
    let d1 = ctx.alloc(UopBuilder::alu(1).class(FuClass::Idiv).build());
    let d2 = ctx.alloc(UopBuilder::alu(2).class(FuClass::Idiv).build());
    ctx.ready(d1);
    ctx.ready(d2);

    ctx.run(13);
    assert_eq!(ctx.uop(d2).timing.when_issued, TICK_NEVER);
    ctx.tick();
    assert_eq!(ctx.uop(d2).timing.when_issued, 13);
}

#[test]
fn test_domain_crossing_adds_penalty() {
    let mut ctx = TestContext::new();
    let a = ctx.alloc(UopBuilder::alu(1).fp_result().build());
    ctx.ready(a);
    ctx.run(3);

    let u = ctx.uop(a);
    assert_eq!(u.timing.when_otag_ready, 2);
    assert_eq!(u.timing.when_completed, 3);
}

#[test]
fn test_deeper_payload_delays_execute() {
    let mut config = Config::default();
    config.exec.payload_depth = 3;
    let mut ctx = TestContext::with_config(&config);
    let a = ctx.alloc(UopBuilder::alu(1).build());
    ctx.ready(a);
    ctx.run(5);

    let u = ctx.uop(a);
    assert_eq!(u.timing.when_exec, 3);
    assert_eq!(u.timing.when_completed, 4);
}

#[test]
fn test_second_result_waits_for_bypass() {
    let mut config = Config::default();
    config.exec.units.imul = FuConfig::new(&[0], 2, 1);
    let mut ctx = TestContext::with_config(&config);

    // Both finish in the same cycle on port 0; only one may use the bypass.
    let mul = ctx.alloc(UopBuilder::alu(1).class(FuClass::Imul).build());
    let add = ctx.alloc(UopBuilder::alu(2).build());
    ctx.ready(mul);
    ctx.run(1);
    ctx.ready(add);
    ctx.run(4);

    let mul = ctx.uop(mul).timing.when_completed;
    let add = ctx.uop(add).timing.when_completed;
    assert_eq!(mul.min(add), 3);
    assert_eq!(mul.max(add), 4);
}

#[test]
fn test_insert_ready_rejects_bad_uops() {
    let mut ctx = TestContext::new();

    let wrong_port = ctx.pool.alloc(UopBuilder::alu(1).port(2).build());
    assert_eq!(
        ctx.engine.insert_ready_uop(&mut ctx.pool, wrong_port),
        Err(ExecError::NoFunctionalUnit { port: 2, class: "IEU" })
    );

    let no_port = ctx.pool.alloc(UopBuilder::new(2).class(FuClass::Ieu).build());
    assert_eq!(
        ctx.engine.insert_ready_uop(&mut ctx.pool, no_port),
        Err(ExecError::MissingSlot { seq: 2, slot: "port" })
    );

    let a = ctx.alloc(UopBuilder::alu(3).build());
    ctx.ready(a);
    assert!(matches!(
        ctx.engine.insert_ready_uop(&mut ctx.pool, a),
        Err(ExecError::NotSchedulable { seq: 3, .. })
    ));
}

#[test]
fn test_rs_full() {
    let mut config = Config::default();
    config.exec.rs_size = 2;
    let mut ctx = TestContext::with_config(&config);
    let _ = ctx.alloc(UopBuilder::alu(1).build());
    let _ = ctx.alloc(UopBuilder::alu(2).build());
    assert!(!ctx.engine.rs_available());

    let extra = ctx.pool.alloc(UopBuilder::alu(3).build());
    assert_eq!(
        ctx.engine.rs_insert(&mut ctx.pool, extra),
        Err(ExecError::QueueFull { queue: "RS", capacity: 2 })
    );
}
