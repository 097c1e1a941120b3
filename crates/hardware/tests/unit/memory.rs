//! # Memory Completion Tests
//!
//! Loads going to the DTLB, DL1 and repeater: hit and miss timing, the
//! reschedule of speculatively woken dependents, line-crossing loads,
//! and completions that arrive for a load that has moved on.

use pretty_assertions::assert_eq;
use uarch_exec::ExecutionEngine;
use uarch_exec::common::{BIG_LATENCY, TICK_NEVER, page_table_addr};
use uarch_exec::config::Config;
use uarch_exec::core::units::cache::{AccessHalf, AccessKind, CompletionEvent, MemTarget, TokenOwner};

use crate::common::{MockHierarchy, TestContext, UopBuilder};

#[test]
fn test_load_miss_reschedules_dependent() {
    let mut ctx = TestContext::new();
    let ld = ctx.alloc(UopBuilder::load(1, 0x8000, 8).value(0xabc).build());
    let add = ctx.alloc(UopBuilder::alu(2).build());
    ctx.link(ld, add, 0);
    ctx.ready(ld);

    // Woken for a DL1 hit: issue at 0, tag ready at 4.
    ctx.tick();
    assert_eq!(ctx.uop(add).timing.when_ready, 4);

    // Issued on the hit assumption, then pulled back by the miss notice
    // at 5 and retagged for the miss latency.
    ctx.run_until(6);
    assert_eq!(ctx.uop(add).timing.when_issued, TICK_NEVER);
    assert_eq!(ctx.uop(add).timing.when_itag_ready[0], 23);
    assert_eq!(ctx.uop(ld).timing.when_otag_ready, 23);
    assert_eq!(ctx.engine.stats().uops_snatched_back, 1);

    // Tag says 23 but the data only arrives at 25: one replay.
    ctx.run_until(30);
    let l = ctx.uop(ld);
    assert_eq!(l.timing.when_completed, 25);
    assert_eq!(l.timing.when_data_loaded, 25);
    assert_eq!(l.exec.ovalue, 0xabc);
    let a = ctx.uop(add);
    assert_eq!(a.exec.ivalue[0], 0xabc);
    assert_eq!(a.exec.num_replays, 1);
    assert_eq!(a.timing.when_issued, 25);
    assert_eq!(a.timing.when_completed, 27);
    assert_eq!(ctx.engine.stats().uops_replayed, 1);
}

#[test]
fn test_load_request_shape() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let ld = ctx.alloc(UopBuilder::load(1, 0x1234, 4).pc(0x40).build());
    ctx.ready(ld);
    ctx.run_until(3);

    let reqs = &ctx.mem.requests;
    assert_eq!(reqs.len(), 2);
    assert_eq!(reqs[0].target, MemTarget::Dtlb);
    assert_eq!(reqs[0].addr, page_table_addr(0, 0x1234));
    assert_eq!(reqs[1].target, MemTarget::Dl1);
    assert_eq!(reqs[1].addr, 0x1234);
    assert_eq!(reqs[1].pc, 0x40);
    assert_eq!(reqs[1].kind, AccessKind::Read);
    assert!(!reqs[1].split);
    assert!(matches!(reqs[1].token.owner, TokenOwner::Load { uop, .. } if uop == ld));
}

#[test]
fn test_load_completes_after_translation_and_data() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let ld = ctx.alloc(UopBuilder::load(1, 0x1234, 4).value(77).build());
    ctx.ready(ld);
    ctx.run_until(3);

    // Data first, translation later: completion waits for both.
    ctx.mem.reply(1, CompletionEvent::Data, 4);
    ctx.mem.reply(0, CompletionEvent::Translated, 6);
    ctx.run_until(6);
    assert_eq!(ctx.uop(ld).timing.when_completed, TICK_NEVER);
    ctx.tick();
    assert_eq!(ctx.uop(ld).timing.when_completed, 6);
    assert_eq!(ctx.uop(ld).exec.ovalue, 77);
}

#[test]
fn test_unknown_miss_latency_parks_dependents() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let ld = ctx.alloc(UopBuilder::load(1, 0x1234, 4).build());
    let add = ctx.alloc(UopBuilder::alu(2).build());
    ctx.link(ld, add, 0);
    ctx.ready(ld);
    ctx.run_until(3);

    ctx.mem.reply(1, CompletionEvent::Reschedule { latency: BIG_LATENCY }, 3);
    ctx.tick();
    assert_eq!(ctx.uop(ld).timing.when_otag_ready, TICK_NEVER);
    assert_eq!(ctx.uop(add).timing.when_itag_ready[0], TICK_NEVER);
    assert!(!ctx.uop(add).exec.in_ready_queue);

    // The data wakes it.
    ctx.mem.reply(0, CompletionEvent::Translated, 10);
    ctx.mem.reply(1, CompletionEvent::Data, 10);
    ctx.run_until(11);
    assert_eq!(ctx.uop(ld).timing.when_completed, 10);
    assert_eq!(ctx.uop(add).timing.when_itag_ready[0], 10);
    ctx.run_until(14);
    assert_eq!(ctx.uop(add).timing.when_completed, 12);
}

#[test]
fn test_split_load_sends_both_halves() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let ld = ctx.alloc(UopBuilder::load(1, 0x103c, 8).value(5).build());
    ctx.ready(ld);
    ctx.run_until(3);

    let dl1 = ctx.mem.sent_to(MemTarget::Dl1);
    assert_eq!(dl1.len(), 2);
    assert_eq!(dl1[0].token.half, AccessHalf::First);
    assert_eq!(dl1[1].token.half, AccessHalf::Last);
    assert_eq!(dl1[1].addr, 0x1044);
    assert!(dl1[1].split);
    assert_eq!(ctx.engine.stats().dl1_load_split_accesses, 1);

    ctx.mem.reply(0, CompletionEvent::Translated, 4);
    ctx.mem.reply(1, CompletionEvent::Data, 5);
    ctx.run_until(7);
    assert_eq!(ctx.uop(ld).timing.when_completed, TICK_NEVER);
    ctx.mem.reply(2, CompletionEvent::Data, 7);
    ctx.tick();
    assert_eq!(ctx.uop(ld).timing.when_completed, 7);
}

#[test]
fn test_repeated_load_uses_repeater() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let ld = ctx.alloc(UopBuilder::load(1, 0x1234, 4).value(3).repeated().build());
    ctx.ready(ld);
    ctx.run_until(3);

    assert!(ctx.mem.sent_to(MemTarget::Dl1).is_empty());
    let rep = ctx.mem.sent_to(MemTarget::Repeater);
    assert_eq!(rep.len(), 1);
    assert!(rep[0].token.repeated);

    ctx.mem.reply(0, CompletionEvent::Translated, 4);
    ctx.mem.reply(1, CompletionEvent::Repeater { hit: true }, 9);
    ctx.run_until(10);
    assert_eq!(ctx.uop(ld).timing.when_completed, 9);
}

#[test]
fn test_repeater_miss_falls_back_to_dl1() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let ld = ctx.alloc(UopBuilder::load(1, 0x1234, 4).repeated().build());
    ctx.ready(ld);
    ctx.run_until(3);
    ctx.mem.reply(0, CompletionEvent::Translated, 3);
    ctx.mem.reply(1, CompletionEvent::Repeater { hit: false }, 5);
    ctx.run_until(6);

    // Same cycle: the load is reissued, this time to the DL1.
    assert!(!ctx.uop(ld).oracle.is_repeated);
    let dl1 = ctx.mem.sent_to(MemTarget::Dl1);
    assert_eq!(dl1.len(), 1);
    assert!(!dl1[0].token.repeated);
    // Already translated: no second DTLB request.
    assert_eq!(ctx.mem.sent_to(MemTarget::Dtlb).len(), 1);
}

#[test]
fn test_back_pressure_delays_issue() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    ctx.mem.refuse = true;
    let ld = ctx.alloc(UopBuilder::load(1, 0x1234, 4).build());
    ctx.ready(ld);
    ctx.run_until(6);
    let slot = ctx.uop(ld).alloc.ldq_index.unwrap();
    assert_eq!(ctx.engine.ldq.entry(slot).unwrap().when_issued, TICK_NEVER);
    assert!(ctx.mem.requests.is_empty());

    ctx.mem.refuse = false;
    ctx.tick();
    assert_eq!(ctx.engine.ldq.entry(slot).unwrap().when_issued, 6);
    assert_eq!(ctx.mem.requests.len(), 2);
}

#[test]
fn test_stale_completion_after_squash_is_dropped() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let ld = ctx.alloc(UopBuilder::load(1, 0x1234, 4).build());
    ctx.ready(ld);
    ctx.run_until(3);

    ctx.engine.ldq_squash(&mut ctx.pool, ld).unwrap();
    ctx.engine.rs_deallocate(&mut ctx.pool, ld).unwrap();
    let _ = ctx.pool.free(ld);
    ctx.engine.recover(&ctx.pool);

    ctx.mem.reply(0, CompletionEvent::Translated, 4);
    ctx.mem.reply(1, CompletionEvent::Data, 4);
    ctx.run(3);
    assert!(ctx.engine.ldq.is_empty());
    assert!(ctx.engine.recover_check_assertions().is_ok());
}
