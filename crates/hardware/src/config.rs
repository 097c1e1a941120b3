//! Configuration system for the execution core.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the engine. It provides:
//! 1. **Defaults:** Baseline core parameters (queue sizes, port bindings, FU latencies).
//! 2. **Structures:** Hierarchical config for general, execution, memory and memdep settings.
//! 3. **Enums:** Memory-dependence predictor selection.
//! 4. **Loading:** JSON parsing, file loading, validation and the compact predictor option string.
//!
//! Configuration is supplied as JSON, or use `Config::default()` for a Core-2-like machine.

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::common::error::ConfigError;
use crate::common::Tick;
use crate::core::uop::FuClass;

/// Default configuration constants for the engine.
///
/// These values describe the baseline machine when a field is not
/// explicitly overridden in the JSON configuration.
mod defaults {
    use crate::common::Tick;

    /// Reservation station entries.
    pub const RS_SIZE: usize = 32;

    /// Load queue entries.
    pub const LDQ_SIZE: usize = 32;

    /// Store queue entries (regular and senior together).
    pub const STQ_SIZE: usize = 20;

    /// Number of execution ports.
    pub const NUM_EXEC_PORTS: usize = 6;

    /// Payload RAM stages between issue and execute.
    pub const PAYLOAD_DEPTH: usize = 1;

    /// Extra cycles for bypassing between the integer and FP domains.
    pub const FP_PENALTY: Tick = 1;

    /// L1 data cache hit latency in cycles.
    ///
    /// Also sets the depth of the store-queue search pipeline.
    pub const DL1_LATENCY: Tick = 3;

    /// L1 data cache line size in bytes.
    pub const DL1_LINE_BYTES: u64 = 64;

    /// L1 data cache capacity (32 KiB).
    pub const DL1_SIZE_BYTES: usize = 32 * 1024;

    /// L1 data cache associativity.
    pub const DL1_WAYS: usize = 8;

    /// Extra cycles for a DL1 miss in the fixed-latency hierarchy.
    pub const MISS_LATENCY: Tick = 20;

    /// Data TLB latency.
    pub const TLB_LATENCY: Tick = 1;

    /// Memory repeater round trip.
    pub const REPEATER_LATENCY: Tick = 30;

    /// Outstanding requests per target before back-pressure.
    pub const MAX_OUTSTANDING: usize = 8;

    /// Load wait table entries.
    pub const LWT_ENTRIES: usize = 4096;

    /// Load wait table clear interval in cycles.
    pub const LWT_RESET_INTERVAL: Tick = 131_072;
}

/// Memory-dependence predictor algorithms.
///
/// Decides whether a load may issue while older stores have unresolved
/// addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemDepPredictor {
    /// Always let loads issue.
    Blind,
    /// Never issue past an unknown store address or a partial match.
    #[serde(alias = "NoSpec")]
    None,
    /// Perfect knowledge of true address conflicts.
    Oracle,
    /// Load wait table: PC-indexed bits set by order violations.
    #[default]
    #[serde(alias = "LWT")]
    Lwt,
}

/// Root configuration structure containing all engine settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use uarch_exec::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.exec.rs_size, 32);
/// assert_eq!(config.memory.dl1_latency, 3);
/// ```
///
/// Deserializing from JSON:
///
/// ```
/// use uarch_exec::config::{Config, MemDepPredictor};
///
/// let json = r#"{
///     "exec": {
///         "rs_size": 16,
///         "ldq_size": 8,
///         "stq_size": 8,
///         "payload_depth": 2,
///         "units": {
///             "ieu": { "ports": [0, 1], "latency": 1 }
///         }
///     },
///     "memory": { "dl1_latency": 4 },
///     "memdep": { "predictor": "Oracle" }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.exec.rs_size, 16);
/// assert_eq!(config.exec.units.ieu.ports, vec![0, 1]);
/// assert_eq!(config.memdep.predictor, MemDepPredictor::Oracle);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Scheduler, queue and functional-unit configuration
    #[serde(default)]
    pub exec: ExecConfig,
    /// Data cache parameters seen by the load/store queues
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Memory-dependence predictor configuration
    #[serde(default)]
    pub memdep: MemDepConfig,
}

impl Config {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on malformed input and
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Config::from_json`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks that the configuration describes a machine the engine can model.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let exec = &self.exec;
        for (field, value) in [
            ("exec.rs_size", exec.rs_size),
            ("exec.ldq_size", exec.ldq_size),
            ("exec.stq_size", exec.stq_size),
            ("exec.num_exec_ports", exec.num_exec_ports),
            ("exec.payload_depth", exec.payload_depth),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be non-zero"));
            }
        }

        for class in FuClass::ALL {
            let unit = exec.units.get(class);
            let name = class.name().to_ascii_lowercase();
            if unit.latency == 0 {
                return Err(ConfigError::invalid(
                    format!("exec.units.{name}.latency"),
                    "must be at least one cycle",
                ));
            }
            if unit.issue_rate == 0 {
                return Err(ConfigError::invalid(
                    format!("exec.units.{name}.issue_rate"),
                    "must be at least one cycle",
                ));
            }
            if let Some(port) = unit.ports.iter().find(|&&p| p >= exec.num_exec_ports) {
                return Err(ConfigError::invalid(
                    format!("exec.units.{name}.ports"),
                    format!("port {port} >= num_exec_ports {}", exec.num_exec_ports),
                ));
            }
        }

        if !self.memory.dl1_line_bytes.is_power_of_two() {
            return Err(ConfigError::invalid(
                "memory.dl1_line_bytes",
                "must be a power of two",
            ));
        }
        if self.memory.dl1_latency == 0 {
            return Err(ConfigError::invalid(
                "memory.dl1_latency",
                "must be at least one cycle",
            ));
        }
        if self.memdep.predictor == MemDepPredictor::Lwt {
            if !self.memdep.lwt.entries.is_power_of_two() {
                return Err(ConfigError::invalid(
                    "memdep.lwt.entries",
                    "must be a power of two",
                ));
            }
            if self.memdep.lwt.reset_interval == 0 {
                return Err(ConfigError::invalid(
                    "memdep.lwt.reset_interval",
                    "must be non-zero",
                ));
            }
        }
        Ok(())
    }
}

/// General simulation settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralConfig {
    /// Emit per-uop trace events in addition to hardware events
    #[serde(default)]
    pub trace: bool,

    /// Address-space id used for cache and TLB requests
    #[serde(default)]
    pub asid: u32,
}

/// Scheduler, queue and functional unit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecConfig {
    /// Reservation station entries
    #[serde(default = "ExecConfig::default_rs_size")]
    pub rs_size: usize,

    /// Load queue entries
    #[serde(default = "ExecConfig::default_ldq_size")]
    pub ldq_size: usize,

    /// Store queue entries
    #[serde(default = "ExecConfig::default_stq_size")]
    pub stq_size: usize,

    /// Number of execution ports
    #[serde(default = "ExecConfig::default_num_exec_ports")]
    pub num_exec_ports: usize,

    /// Payload RAM stages between issue and execute
    #[serde(default = "ExecConfig::default_payload_depth")]
    pub payload_depth: usize,

    /// Delay the next wakeup of frequently replayed uops
    #[serde(default)]
    pub tornado_breaker: bool,

    /// Stop all load issue after a partial store-forward until the next senior drain
    #[serde(default)]
    pub throttle_partial: bool,

    /// Extra bypass latency between the integer and FP domains
    #[serde(default = "ExecConfig::default_fp_penalty")]
    pub fp_penalty: Tick,

    /// Per-class functional unit bindings and timing
    #[serde(default)]
    pub units: FuTable,
}

impl ExecConfig {
    /// Returns the default reservation station size.
    const fn default_rs_size() -> usize {
        defaults::RS_SIZE
    }

    /// Returns the default load queue size.
    const fn default_ldq_size() -> usize {
        defaults::LDQ_SIZE
    }

    /// Returns the default store queue size.
    const fn default_stq_size() -> usize {
        defaults::STQ_SIZE
    }

    /// Returns the default port count.
    const fn default_num_exec_ports() -> usize {
        defaults::NUM_EXEC_PORTS
    }

    /// Returns the default payload depth.
    const fn default_payload_depth() -> usize {
        defaults::PAYLOAD_DEPTH
    }

    /// Returns the default cross-domain bypass penalty.
    const fn default_fp_penalty() -> Tick {
        defaults::FP_PENALTY
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            rs_size: defaults::RS_SIZE,
            ldq_size: defaults::LDQ_SIZE,
            stq_size: defaults::STQ_SIZE,
            num_exec_ports: defaults::NUM_EXEC_PORTS,
            payload_depth: defaults::PAYLOAD_DEPTH,
            tornado_breaker: false,
            throttle_partial: false,
            fp_penalty: defaults::FP_PENALTY,
            units: FuTable::default(),
        }
    }
}

/// Binding and timing of one functional unit class.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FuConfig {
    /// Ports that host an instance of this unit
    pub ports: Vec<usize>,

    /// Cycles from entering the unit to producing a result
    pub latency: Tick,

    /// Cycles between successive issues to the same instance
    #[serde(default = "FuConfig::default_issue_rate")]
    pub issue_rate: Tick,
}

impl FuConfig {
    /// Builds a unit description.
    pub fn new(ports: &[usize], latency: Tick, issue_rate: Tick) -> Self {
        Self {
            ports: ports.to_vec(),
            latency,
            issue_rate,
        }
    }

    /// Fully pipelined by default.
    const fn default_issue_rate() -> Tick {
        1
    }
}

/// Functional unit table, one entry per [`FuClass`].
#[derive(Debug, Clone, Deserialize)]
pub struct FuTable {
    /// Integer ALU
    #[serde(default = "FuTable::default_ieu")]
    pub ieu: FuConfig,
    /// Jump execution unit
    #[serde(default = "FuTable::default_jeu")]
    pub jeu: FuConfig,
    /// Integer multiplier
    #[serde(default = "FuTable::default_imul")]
    pub imul: FuConfig,
    /// Integer divider
    #[serde(default = "FuTable::default_idiv")]
    pub idiv: FuConfig,
    /// Shifter
    #[serde(default = "FuTable::default_shift")]
    pub shift: FuConfig,
    /// FP adder
    #[serde(default = "FuTable::default_fadd")]
    pub fadd: FuConfig,
    /// FP multiplier
    #[serde(default = "FuTable::default_fmul")]
    pub fmul: FuConfig,
    /// FP divider
    #[serde(default = "FuTable::default_fdiv")]
    pub fdiv: FuConfig,
    /// FP complex (transcendental) unit
    #[serde(default = "FuTable::default_fcplx")]
    pub fcplx: FuConfig,
    /// Load address generation
    #[serde(default = "FuTable::default_ld")]
    pub ld: FuConfig,
    /// Store address generation
    #[serde(default = "FuTable::default_sta")]
    pub sta: FuConfig,
    /// Store data
    #[serde(default = "FuTable::default_std")]
    pub std: FuConfig,
}

impl FuTable {
    /// Looks up the entry for one class.
    pub const fn get(&self, class: FuClass) -> &FuConfig {
        match class {
            FuClass::Ieu => &self.ieu,
            FuClass::Jeu => &self.jeu,
            FuClass::Imul => &self.imul,
            FuClass::Idiv => &self.idiv,
            FuClass::Shift => &self.shift,
            FuClass::Fadd => &self.fadd,
            FuClass::Fmul => &self.fmul,
            FuClass::Fdiv => &self.fdiv,
            FuClass::Fcplx => &self.fcplx,
            FuClass::Ld => &self.ld,
            FuClass::Sta => &self.sta,
            FuClass::Std => &self.std,
        }
    }

    fn default_ieu() -> FuConfig {
        FuConfig::new(&[0, 1, 5], 1, 1)
    }

    fn default_jeu() -> FuConfig {
        FuConfig::new(&[5], 1, 1)
    }

    fn default_imul() -> FuConfig {
        FuConfig::new(&[1], 4, 1)
    }

    fn default_idiv() -> FuConfig {
        FuConfig::new(&[0], 13, 13)
    }

    fn default_shift() -> FuConfig {
        FuConfig::new(&[0, 5], 1, 1)
    }

    fn default_fadd() -> FuConfig {
        FuConfig::new(&[1], 3, 1)
    }

    fn default_fmul() -> FuConfig {
        FuConfig::new(&[0], 5, 2)
    }

    fn default_fdiv() -> FuConfig {
        FuConfig::new(&[0], 32, 32)
    }

    fn default_fcplx() -> FuConfig {
        FuConfig::new(&[0], 58, 58)
    }

    fn default_ld() -> FuConfig {
        FuConfig::new(&[2], 1, 1)
    }

    fn default_sta() -> FuConfig {
        FuConfig::new(&[3], 1, 1)
    }

    fn default_std() -> FuConfig {
        FuConfig::new(&[4], 1, 1)
    }
}

impl Default for FuTable {
    fn default() -> Self {
        Self {
            ieu: Self::default_ieu(),
            jeu: Self::default_jeu(),
            imul: Self::default_imul(),
            idiv: Self::default_idiv(),
            shift: Self::default_shift(),
            fadd: Self::default_fadd(),
            fmul: Self::default_fmul(),
            fdiv: Self::default_fdiv(),
            fcplx: Self::default_fcplx(),
            ld: Self::default_ld(),
            sta: Self::default_sta(),
            std: Self::default_std(),
        }
    }
}

/// Data cache parameters the load/store queues depend on.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// L1 data cache hit latency
    #[serde(default = "MemoryConfig::default_dl1_latency")]
    pub dl1_latency: Tick,

    /// L1 data cache line size, for split-access detection
    #[serde(default = "MemoryConfig::default_dl1_line_bytes")]
    pub dl1_line_bytes: u64,

    /// Send repeated accesses to the DL1 as well as to the memory repeater
    #[serde(default)]
    pub dl1_rep_req: bool,

    /// DL1 capacity, used by the fixed-latency hierarchy
    #[serde(default = "MemoryConfig::default_dl1_size_bytes")]
    pub dl1_size_bytes: usize,

    /// DL1 associativity, used by the fixed-latency hierarchy
    #[serde(default = "MemoryConfig::default_dl1_ways")]
    pub dl1_ways: usize,

    /// Extra DL1 miss latency, used by the fixed-latency hierarchy
    #[serde(default = "MemoryConfig::default_miss_latency")]
    pub miss_latency: Tick,

    /// TLB latency, used by the fixed-latency hierarchy
    #[serde(default = "MemoryConfig::default_tlb_latency")]
    pub tlb_latency: Tick,

    /// Repeater latency, used by the fixed-latency hierarchy
    #[serde(default = "MemoryConfig::default_repeater_latency")]
    pub repeater_latency: Tick,

    /// Outstanding requests per target, used by the fixed-latency hierarchy
    #[serde(default = "MemoryConfig::default_max_outstanding")]
    pub max_outstanding: usize,
}

impl MemoryConfig {
    /// Returns the default DL1 latency.
    const fn default_dl1_latency() -> Tick {
        defaults::DL1_LATENCY
    }

    /// Returns the default DL1 line size.
    const fn default_dl1_line_bytes() -> u64 {
        defaults::DL1_LINE_BYTES
    }

    const fn default_dl1_size_bytes() -> usize {
        defaults::DL1_SIZE_BYTES
    }

    const fn default_dl1_ways() -> usize {
        defaults::DL1_WAYS
    }

    const fn default_miss_latency() -> Tick {
        defaults::MISS_LATENCY
    }

    const fn default_tlb_latency() -> Tick {
        defaults::TLB_LATENCY
    }

    const fn default_repeater_latency() -> Tick {
        defaults::REPEATER_LATENCY
    }

    const fn default_max_outstanding() -> usize {
        defaults::MAX_OUTSTANDING
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dl1_latency: defaults::DL1_LATENCY,
            dl1_line_bytes: defaults::DL1_LINE_BYTES,
            dl1_rep_req: false,
            dl1_size_bytes: defaults::DL1_SIZE_BYTES,
            dl1_ways: defaults::DL1_WAYS,
            miss_latency: defaults::MISS_LATENCY,
            tlb_latency: defaults::TLB_LATENCY,
            repeater_latency: defaults::REPEATER_LATENCY,
            max_outstanding: defaults::MAX_OUTSTANDING,
        }
    }
}

/// Memory-dependence predictor selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MemDepConfig {
    /// Predictor algorithm
    #[serde(default)]
    pub predictor: MemDepPredictor,

    /// Load wait table parameters
    #[serde(default)]
    pub lwt: LwtConfig,
}

/// Load wait table parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LwtConfig {
    /// Table entries (power of two)
    #[serde(default = "LwtConfig::default_entries")]
    pub entries: usize,

    /// Cycles between table clears
    #[serde(default = "LwtConfig::default_reset_interval")]
    pub reset_interval: Tick,
}

impl LwtConfig {
    /// Returns the default table size.
    const fn default_entries() -> usize {
        defaults::LWT_ENTRIES
    }

    /// Returns the default clear interval.
    const fn default_reset_interval() -> Tick {
        defaults::LWT_RESET_INTERVAL
    }
}

impl Default for LwtConfig {
    fn default() -> Self {
        Self {
            entries: defaults::LWT_ENTRIES,
            reset_interval: defaults::LWT_RESET_INTERVAL,
        }
    }
}

/// Parses the compact predictor option: `blind`, `none`, `oracle`, or
/// `lwt:NAME:ENTRIES:INTERVAL`.
///
/// ```
/// use uarch_exec::config::{MemDepConfig, MemDepPredictor};
///
/// let cfg: MemDepConfig = "lwt:LWT:1024:65536".parse().unwrap();
/// assert_eq!(cfg.predictor, MemDepPredictor::Lwt);
/// assert_eq!(cfg.lwt.entries, 1024);
/// ```
impl FromStr for MemDepConfig {
    type Err = ConfigError;

    fn from_str(opt: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::MemDepOption(opt.to_owned());
        let mut fields = opt.split(':');
        let kind = fields.next().ok_or_else(bad)?;
        let predictor = match kind.to_ascii_lowercase().as_str() {
            "blind" => MemDepPredictor::Blind,
            "none" => MemDepPredictor::None,
            "oracle" => MemDepPredictor::Oracle,
            "lwt" => MemDepPredictor::Lwt,
            _ => return Err(bad()),
        };
        if predictor != MemDepPredictor::Lwt {
            if fields.next().is_some() {
                return Err(bad());
            }
            return Ok(Self {
                predictor,
                lwt: LwtConfig::default(),
            });
        }

        let _name = fields.next().ok_or_else(bad)?;
        let entries = fields
            .next()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(bad)?;
        let reset_interval = fields
            .next()
            .and_then(|s| s.parse::<Tick>().ok())
            .ok_or_else(bad)?;
        if fields.next().is_some() || !entries.is_power_of_two() || reset_interval == 0 {
            return Err(bad());
        }
        Ok(Self {
            predictor,
            lwt: LwtConfig {
                entries,
                reset_interval,
            },
        })
    }
}
