//! # Configuration Tests
//!
//! Defaults, JSON overrides, file loading and validation failures.

use std::io::Write;

use pretty_assertions::assert_eq;
use rstest::rstest;
use uarch_exec::O3Engine;
use uarch_exec::common::ConfigError;
use uarch_exec::config::{Config, FuConfig, MemDepConfig, MemDepPredictor};
use uarch_exec::core::uop::FuClass;

#[test]
fn test_default_machine() {
    let config = Config::default();
    assert_eq!(config.exec.rs_size, 32);
    assert_eq!(config.exec.ldq_size, 32);
    assert_eq!(config.exec.stq_size, 20);
    assert_eq!(config.exec.num_exec_ports, 6);
    assert_eq!(config.exec.payload_depth, 1);
    assert!(!config.exec.tornado_breaker);
    assert_eq!(config.exec.units.get(FuClass::Idiv), &FuConfig::new(&[0], 13, 13));
    assert_eq!(config.memory.dl1_latency, 3);
    assert_eq!(config.memory.dl1_line_bytes, 64);
    assert_eq!(config.memdep.predictor, MemDepPredictor::Lwt);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = Config::from_json(
        r#"{
            "exec": { "rs_size": 8, "tornado_breaker": true, "units": { "imul": { "ports": [1, 5], "latency": 3 } } },
            "memdep": { "predictor": "NoSpec" }
        }"#,
    )
    .unwrap();
    assert_eq!(config.exec.rs_size, 8);
    assert!(config.exec.tornado_breaker);
    assert_eq!(config.exec.units.imul, FuConfig::new(&[1, 5], 3, 1));
    assert_eq!(config.exec.units.ieu, FuConfig::new(&[0, 1, 5], 1, 1));
    assert_eq!(config.exec.ldq_size, 32);
    assert_eq!(config.memory.miss_latency, 20);
    assert_eq!(config.memdep.predictor, MemDepPredictor::None);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "general": {{ "asid": 3 }}, "memory": {{ "dl1_latency": 5 }} }}"#).unwrap();
    let config = Config::from_json_file(file.path()).unwrap();
    assert_eq!(config.general.asid, 3);
    assert_eq!(config.memory.dl1_latency, 5);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_malformed_json() {
    let err = Config::from_json(r#"{ "exec": { "rs_size": "many" } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}

#[rstest]
#[case::zero_rs(r#"{ "exec": { "rs_size": 0 } }"#, "exec.rs_size")]
#[case::port_out_of_range(r#"{ "exec": { "units": { "fadd": { "ports": [6], "latency": 3 } } } }"#, "exec.units.fadd.ports")]
#[case::zero_latency(r#"{ "exec": { "units": { "shift": { "ports": [0], "latency": 0 } } } }"#, "exec.units.shift.latency")]
#[case::odd_line(r#"{ "memory": { "dl1_line_bytes": 48 } }"#, "memory.dl1_line_bytes")]
#[case::odd_lwt(r#"{ "memdep": { "lwt": { "entries": 1000 } } }"#, "memdep.lwt.entries")]
fn test_validation_rejects(#[case] json: &str, #[case] bad_field: &str) {
    match Config::from_json(json) {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, bad_field),
        other => panic!("expected invalid {bad_field}, got {other:?}"),
    }
}

#[test]
fn test_engine_refuses_invalid_config() {
    let mut config = Config::default();
    config.exec.payload_depth = 0;
    assert!(matches!(O3Engine::new(&config), Err(ConfigError::Invalid { .. })));
}

#[rstest]
#[case("blind", MemDepPredictor::Blind)]
#[case("NONE", MemDepPredictor::None)]
#[case("oracle", MemDepPredictor::Oracle)]
fn test_memdep_option(#[case] option: &str, #[case] predictor: MemDepPredictor) {
    let config: MemDepConfig = option.parse().unwrap();
    assert_eq!(config.predictor, predictor);
}

#[test]
fn test_lwt_option_sets_table() {
    let config: MemDepConfig = "lwt:LWT:1024:65536".parse().unwrap();
    assert_eq!(config.predictor, MemDepPredictor::Lwt);
    assert_eq!(config.lwt.entries, 1024);
    assert_eq!(config.lwt.reset_interval, 65536);
}

#[rstest]
#[case("perfect")]
#[case("lwt:LWT:1000:65536")]
#[case("lwt:LWT:1024")]
#[case("oracle:extra")]
#[case("lwt:LWT:1024:0")]
fn test_bad_memdep_option(#[case] option: &str) {
    let err = option.parse::<MemDepConfig>().unwrap_err();
    assert!(matches!(err, ConfigError::MemDepOption(s) if s == option));
}
