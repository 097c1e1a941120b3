//! # Fence Tests
//!
//! Fences live in the LDQ and complete only at its head. Loads behind an
//! incomplete fence are held; an MFENCE additionally waits for the older
//! store to commit (light) or to drain from the senior STQ (heavy).

use pretty_assertions::assert_eq;
use rstest::rstest;
use uarch_exec::ExecutionEngine;
use uarch_exec::common::TICK_NEVER;
use uarch_exec::config::Config;
use uarch_exec::core::units::cache::{CompletionEvent, MemTarget};
use uarch_exec::core::uop::{FenceKind, UopHandle};

use crate::common::{MockHierarchy, TestContext, UopBuilder};

/// Older store, a fence, then a load to an unrelated address.
fn store_fence_load(kind: FenceKind) -> (TestContext<MockHierarchy>, UopHandle, UopHandle, UopHandle) {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let sta = ctx.alloc(UopBuilder::sta(1, 0x3000, 8).build());
    let std = ctx.alloc(UopBuilder::std(2, 1, 7).build());
    let fence = ctx.alloc(UopBuilder::fence(3, kind).build());
    let ld = ctx.alloc(UopBuilder::load(4, 0x5000, 4).build());
    for h in [sta, std, ld] {
        ctx.ready(h);
    }
    ctx.run_until(10);
    (ctx, std, fence, ld)
}

fn load_issued(ctx: &TestContext<MockHierarchy>, ld: UopHandle) -> u64 {
    let slot = ctx.uop(ld).alloc.ldq_index.unwrap();
    ctx.engine.ldq.entry(slot).unwrap().when_issued
}

#[rstest]
#[case::lfence(FenceKind::Lfence)]
#[case::sfence(FenceKind::Sfence)]
fn test_fence_at_head_completes_at_once(#[case] kind: FenceKind) {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let fence = ctx.alloc(UopBuilder::fence(1, kind).build());
    ctx.tick();
    assert_eq!(ctx.uop(fence).timing.when_completed, 0);
}

#[test]
fn test_fence_behind_older_load_waits_for_head() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let first = ctx.alloc(UopBuilder::load(1, 0x1000, 4).build());
    let fence = ctx.alloc(UopBuilder::fence(2, FenceKind::Lfence).build());
    let second = ctx.alloc(UopBuilder::load(3, 0x2000, 4).build());
    ctx.ready(first);
    ctx.ready(second);
    ctx.run_until(8);

    assert_eq!(ctx.uop(fence).timing.when_completed, TICK_NEVER);
    assert_eq!(load_issued(&ctx, second), TICK_NEVER);
    assert_eq!(ctx.mem.sent_to(MemTarget::Dl1).len(), 1);

    // Retiring the older load puts the fence at the head.
    ctx.engine.ldq_deallocate(&mut ctx.pool, first).unwrap();
    ctx.tick();
    assert_eq!(ctx.uop(fence).timing.when_completed, 8);
    assert_eq!(load_issued(&ctx, second), 8);
}

#[test]
fn test_light_mfence_waits_for_store_commit() {
    let (mut ctx, std, fence, ld) = store_fence_load(FenceKind::Mfence { light: true });
    assert_eq!(ctx.uop(fence).timing.when_completed, TICK_NEVER);
    assert_eq!(load_issued(&ctx, ld), TICK_NEVER);
    assert!(ctx.mem.requests.is_empty());

    ctx.commit_store(std);
    ctx.tick();
    assert_eq!(ctx.uop(fence).timing.when_completed, 10);
    assert_eq!(load_issued(&ctx, ld), 10);
}

#[test]
fn test_heavy_mfence_waits_for_senior_drain() {
    let (mut ctx, std, fence, ld) = store_fence_load(FenceKind::Mfence { light: false });
    ctx.commit_store(std);
    ctx.run_until(12);

    // Committed but still writing back.
    assert_eq!(ctx.uop(fence).timing.when_completed, TICK_NEVER);
    assert_eq!(load_issued(&ctx, ld), TICK_NEVER);

    ctx.mem.reply(0, CompletionEvent::Data, 12);
    ctx.mem.reply(1, CompletionEvent::Translated, 12);
    ctx.tick();
    ctx.engine.stq_deallocate_senior();
    assert!(ctx.engine.stq_empty());

    ctx.tick();
    assert_eq!(ctx.uop(fence).timing.when_completed, 13);
    assert_eq!(load_issued(&ctx, ld), 13);
}

#[test]
fn test_heavy_mfence_without_older_store_completes() {
    let mut ctx = TestContext::with_memory(&Config::default(), MockHierarchy::new());
    let fence = ctx.alloc(UopBuilder::fence(1, FenceKind::Mfence { light: false }).build());
    ctx.tick();
    assert_eq!(ctx.uop(fence).timing.when_completed, 0);
}
