//! # Memory-Dependence Predictor Tests
//!
//! What each predictor does with a load behind a store whose address is
//! still unknown, and how the engine consults a custom predictor.

use pretty_assertions::assert_eq;
use rstest::rstest;
use uarch_exec::common::TICK_NEVER;
use uarch_exec::config::{Config, MemDepConfig, MemDepPredictor};
use uarch_exec::core::units::memdep::MemDepWrapper;
use uarch_exec::core::uop::UopHandle;
use uarch_exec::{ExecutionEngine, O3Engine};

use crate::common::{MockHierarchy, MockMemDep, TestContext, UopBuilder};

/// A store whose address never resolves, and a younger load at `load_addr`.
fn unresolved_store_then_load(ctx: &mut TestContext<MockHierarchy>, load_addr: u64) -> UopHandle {
    let _sta = ctx.alloc(UopBuilder::sta(1, 0x2000, 8).build());
    let std = ctx.alloc(UopBuilder::std(2, 1, 5).build());
    let ld = ctx.alloc(UopBuilder::load(3, load_addr, 4).pc(0x400).build());
    ctx.ready(std);
    ctx.ready(ld);
    ld
}

fn load_issued(ctx: &TestContext<MockHierarchy>, ld: UopHandle) -> u64 {
    let slot = ctx.uop(ld).alloc.ldq_index.unwrap();
    ctx.engine.ldq.entry(slot).unwrap().when_issued
}

#[rstest]
#[case::blind_conflict(MemDepPredictor::Blind, 0x2004, true)]
#[case::blind_independent(MemDepPredictor::Blind, 0x9000, true)]
#[case::none_conflict(MemDepPredictor::None, 0x2004, false)]
#[case::none_independent(MemDepPredictor::None, 0x9000, false)]
#[case::oracle_conflict(MemDepPredictor::Oracle, 0x2004, false)]
#[case::oracle_independent(MemDepPredictor::Oracle, 0x9000, true)]
#[case::lwt_untrained(MemDepPredictor::Lwt, 0x2004, true)]
fn test_load_past_unknown_store(#[case] predictor: MemDepPredictor, #[case] addr: u64, #[case] issues: bool) {
    let mut config = Config::default();
    config.memdep.predictor = predictor;
    let mut ctx = TestContext::with_memory(&config, MockHierarchy::new());
    let ld = unresolved_store_then_load(&mut ctx, addr);
    ctx.run_until(6);

    let expected = if issues { 2 } else { TICK_NEVER };
    assert_eq!(load_issued(&ctx, ld), expected);
    assert!(ctx.engine.stats().memdep_lookups >= 1);
}

#[test]
fn test_custom_predictor_holds_load() {
    let mut predictor = MockMemDep::new();
    let _ = predictor
        .expect_lookup()
        .withf(|&pc, &unknown, &conflict, &partial, _| pc == 0x400 && unknown && !conflict && !partial)
        .returning(|_, _, _, _, _| false);
    let _ = predictor.expect_update().never();

    let config = Config::default();
    let mut ctx = TestContext::with_memory(&config, MockHierarchy::new());
    ctx.engine = O3Engine::new(&config).unwrap().with_memdep(Box::new(predictor));
    let ld = unresolved_store_then_load(&mut ctx, 0x9000);
    ctx.run_until(10);

    // Consulted every cycle from address generation on.
    assert_eq!(load_issued(&ctx, ld), TICK_NEVER);
    assert_eq!(ctx.engine.stats().memdep_lookups, 8);
    assert_eq!(ctx.uop(ld).timing.when_completed, TICK_NEVER);
    assert!(ctx.mem.requests.is_empty());
}

#[test]
fn test_custom_predictor_sees_oracle_conflict() {
    let mut predictor = MockMemDep::new();
    let _ = predictor
        .expect_lookup()
        .withf(|_, &unknown, &conflict, _, _| unknown && conflict)
        .times(1)
        .returning(|_, _, _, _, _| true);

    let config = Config::default();
    let mut ctx = TestContext::with_memory(&config, MockHierarchy::new());
    ctx.engine = O3Engine::new(&config).unwrap().with_memdep(Box::new(predictor));
    let ld = unresolved_store_then_load(&mut ctx, 0x2004);
    ctx.run_until(4);
    assert_eq!(load_issued(&ctx, ld), 2);
}

#[rstest]
#[case("blind", "blind")]
#[case("none", "none")]
#[case("oracle", "oracle")]
#[case("lwt:LWT:1024:65536", "lwt")]
fn test_wrapper_follows_option(#[case] option: &str, #[case] name: &str) {
    let config: MemDepConfig = option.parse().unwrap();
    assert_eq!(MemDepWrapper::new(&config).name(), name);
}
