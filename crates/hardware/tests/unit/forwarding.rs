//! # Store-to-Load Forwarding Tests
//!
//! Loads meeting older stores in the STQ: forwarding a covering store's
//! value, waiting for store data, partial overlaps, and order violations
//! found when a store resolves after a younger load.

use pretty_assertions::assert_eq;
use uarch_exec::ExecutionEngine;
use uarch_exec::common::TICK_NEVER;
use uarch_exec::config::Config;
use uarch_exec::core::pipeline::signals::PipelineSignal;
use uarch_exec::core::units::cache::MemTarget;
use uarch_exec::core::units::memdep::MemDepWrapper;

use crate::common::{MockHierarchy, TestContext, UopBuilder};

const STORE_VALUE: u64 = 0x1122_3344_5566_7788;

#[test]
fn test_forward_from_ready_store() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let sta = ctx.alloc(UopBuilder::sta(1, 0x1000, 8).build());
    let std = ctx.alloc(UopBuilder::std(2, 1, STORE_VALUE).build());
    let ld = ctx.alloc(UopBuilder::load(3, 0x1000, 4).build());
    ctx.ready(sta);
    ctx.ready(std);

    ctx.run_until(3);
    let entry = ctx.engine.stq.entry(0).unwrap();
    assert!(entry.addr_valid && entry.value_valid);
    ctx.ready(ld);

    // Issue 3, address 5, sent to the STQ search only, out of it at 7.
    ctx.run_until(6);
    let slot = ctx.uop(ld).alloc.ldq_index.unwrap();
    let lq = ctx.engine.ldq.entry(slot).unwrap();
    assert!(lq.forward_only);
    assert_eq!(lq.when_issued, 5);
    assert_eq!(ctx.uop(ld).timing.when_completed, TICK_NEVER);

    ctx.run_until(8);
    let u = ctx.uop(ld);
    assert_eq!(u.exec.ovalue, 0x5566_7788);
    assert!(u.exec.ovalue_valid);
    assert_eq!(u.timing.when_completed, 7);
    assert!(ctx.engine.ldq.entry(slot).unwrap().hit_in_stq);
    assert_eq!(ctx.engine.stats().stq_forwards, 1);
    assert!(ctx.mem.requests.is_empty());
}

#[test]
fn test_forward_extracts_upper_bytes() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let sta = ctx.alloc(UopBuilder::sta(1, 0x1000, 8).build());
    let std = ctx.alloc(UopBuilder::std(2, 1, STORE_VALUE).build());
    let ld = ctx.alloc(UopBuilder::load(3, 0x1006, 2).build());
    ctx.ready(sta);
    ctx.ready(std);
    ctx.run_until(3);
    ctx.ready(ld);
    ctx.run_until(8);

    assert_eq!(ctx.uop(ld).exec.ovalue, 0x1122);
    assert_eq!(ctx.engine.stats().stq_forwards, 1);
}

#[test]
fn test_load_waits_for_store_data() {
    let mut ctx = TestContext::new();
    let sta = ctx.alloc(UopBuilder::sta(1, 0x1000, 8).build());
    let std = ctx.alloc(UopBuilder::std(2, 1, STORE_VALUE).build());
    let ld = ctx.alloc(UopBuilder::load(3, 0x1000, 4).build());
    ctx.ready(sta);
    ctx.ready(ld);

    // The load goes to memory at 2 (no data to forward yet) and finds the
    // store's address, but not its value, at the end of the search at 4.
    ctx.run_until(3);
    let slot = ctx.uop(ld).alloc.ldq_index.unwrap();
    assert_eq!(ctx.engine.ldq.entry(slot).unwrap().when_issued, 2);
    assert_eq!(ctx.mem.in_flight(), 3);
    let issued_as = ctx.uop(ld).exec.action_id;

    ctx.run_until(5);
    let lq = ctx.engine.ldq.entry(slot).unwrap();
    assert!(!lq.first_byte_requested);
    assert!(!lq.speculative_broadcast);
    assert_eq!(lq.when_issued, 2);
    assert_ne!(ctx.uop(ld).exec.action_id, issued_as);
    assert_eq!(ctx.uop(ld).timing.when_completed, TICK_NEVER);

    // Store data executes at 7, completes at 8 and releases the load, which
    // re-issues for forwarding and leaves the search at 10.
    ctx.run_until(6);
    ctx.ready(std);
    ctx.run_until(11);
    let u = ctx.uop(ld);
    assert_eq!(u.exec.ovalue, 0x5566_7788);
    assert_eq!(u.timing.when_completed, 10);
    assert_eq!(ctx.engine.stats().stq_forwards, 1);

    // The cache reply for the first attempt arrives later and is dropped.
    ctx.run(30);
    assert_eq!(ctx.mem.in_flight(), 0);
    assert_eq!(ctx.uop(ld).timing.when_completed, 10);
    assert_eq!(ctx.uop(ld).exec.ovalue, 0x5566_7788);
    assert_eq!(ctx.engine.stats().load_nukes, 0);
}

#[test]
fn test_overwritten_bytes_do_not_flush() {
    let mut ctx = TestContext::new();
    let sta1 = ctx.alloc(UopBuilder::sta(1, 0x1000, 8).build());
    let std1 = ctx.alloc(UopBuilder::std(2, 1, STORE_VALUE).build());
    let sta2 = ctx.alloc(UopBuilder::sta(3, 0x1002, 2).build());
    let std2 = ctx.alloc(UopBuilder::std(4, 3, 0xbeef).build());
    let ld = ctx.alloc(UopBuilder::load(5, 0x1002, 2).build());
    for h in [sta1, sta2, std2, ld] {
        ctx.ready(h);
    }

    // The younger store covers the load and forwards to it.
    ctx.run_until(6);
    assert_eq!(ctx.uop(ld).exec.ovalue, 0xbeef);
    assert_eq!(ctx.uop(ld).timing.when_completed, 5);
    assert_eq!(ctx.engine.stats().stq_forwards, 1);

    // The older store's data arrives late, but every byte the load read
    // was overwritten by the younger store: no violation.
    ctx.ready(std1);
    ctx.run_until(12);
    assert!(ctx.engine.stq.entry(0).unwrap().value_valid);
    assert_eq!(ctx.engine.stats().load_nukes, 0);
    assert!(ctx.engine.take_signals().is_empty());
    assert_eq!(ctx.uop(ld).exec.ovalue, 0xbeef);
}

#[test]
fn test_late_store_address_flushes_completed_load() {
    let mut ctx = TestContext::new();
    let sta = ctx.alloc(UopBuilder::sta(1, 0x2000, 8).build());
    let std = ctx.alloc(UopBuilder::std(2, 1, STORE_VALUE).build());
    let ld = ctx.alloc(UopBuilder::load(3, 0x2004, 4).pc(0x400).build());
    ctx.ready(std);
    ctx.ready(ld);

    // The untrained predictor lets the load go past the unknown address; it
    // misses and completes from the cache at 25.
    ctx.run_until(26);
    assert_eq!(ctx.uop(ld).timing.when_completed, 25);
    assert_eq!(ctx.engine.stats().memdep_lookups, 1);

    ctx.ready(sta);
    ctx.run(3);
    assert_eq!(ctx.engine.stats().load_nukes, 1);
    assert_eq!(ctx.engine.stats().memdep_updates, 1);
    assert_eq!(
        ctx.engine.take_signals(),
        vec![PipelineSignal::Flush { mop_seq: 3, seq: 3 }]
    );
    match &ctx.engine.memdep {
        MemDepWrapper::Lwt(table) => assert!(table.is_marked(0x400)),
        other => panic!("unexpected predictor {other:?}"),
    }
}

#[test]
fn test_partial_overlap_blocks_load() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let sta = ctx.alloc(UopBuilder::sta(1, 0x3000, 2).build());
    let std = ctx.alloc(UopBuilder::std(2, 1, 0xffff).build());
    let ld = ctx.alloc(UopBuilder::load(3, 0x3000, 4).build());
    ctx.ready(sta);
    ctx.ready(std);
    ctx.run_until(3);
    ctx.ready(ld);
    ctx.run_until(12);

    // The store covers only half the load: it neither forwards nor issues.
    let slot = ctx.uop(ld).alloc.ldq_index.unwrap();
    let lq = ctx.engine.ldq.entry(slot).unwrap();
    assert!(lq.partial_forward);
    assert_eq!(lq.when_issued, TICK_NEVER);
    assert!(ctx.engine.stats().partial_forwards >= 1);
    assert_eq!(ctx.engine.stats().stq_forwards, 0);
    assert!(ctx.mem.sent_to(MemTarget::Dl1).is_empty());
    assert_eq!(ctx.uop(ld).timing.when_completed, TICK_NEVER);
}

#[test]
fn test_partial_overlap_released_by_senior_drain() {
    let mut config = Config::default();
    config.exec.throttle_partial = true;
    let mut ctx = TestContext::with_config(&config);
    let sta = ctx.alloc(UopBuilder::sta(1, 0x3000, 2).build());
    let std = ctx.alloc(UopBuilder::std(2, 1, 0xbeef).build());
    let ld = ctx.alloc(UopBuilder::load(3, 0x3001, 2).build());
    ctx.ready(sta);
    ctx.ready(std);
    ctx.run_until(3);
    ctx.ready(ld);
    ctx.run_until(12);

    // Bytes [1,3) against a store of [0,2): held while the store is queued.
    let slot = ctx.uop(ld).alloc.ldq_index.unwrap();
    let lq = ctx.engine.ldq.entry(slot).unwrap();
    assert!(lq.partial_forward);
    assert_eq!(lq.when_issued, TICK_NEVER);

    ctx.commit_store(std);
    ctx.drain_stores(100);
    assert!(ctx.engine.stq_empty());
    assert!(!ctx.engine.partial_throttle());
    let drained = ctx.now();

    ctx.run(60);
    let issued = ctx.engine.ldq.entry(slot).unwrap().when_issued;
    assert_ne!(issued, TICK_NEVER);
    assert!(issued >= drained);
    assert_ne!(ctx.uop(ld).timing.when_completed, TICK_NEVER);
    assert_eq!(ctx.engine.stats().stq_forwards, 0);
}
