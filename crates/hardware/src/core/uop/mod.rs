//! Micro-operation records and the pool that owns them.
//!
//! A [`Uop`] is created by the front end and lives in a [`UopPool`] for its
//! whole lifetime; the execution engine only ever holds [`UopHandle`]s and
//! must resolve them before use. The record is split the way the pipeline
//! fills it in:
//! 1. **Decode:** Static properties (class, memory size, fence kind, fusion links).
//! 2. **Fetch/Oracle:** Predicted and true control flow, address and value.
//! 3. **Alloc:** Port and queue slots assigned at allocation.
//! 4. **Timing:** Per-stage timestamps, [`TICK_NEVER`] until reached.
//! 5. **Exec:** Mutable scheduling state (epoch, operand values, replay count).

/// Dependency edges between producers and consumers.
pub mod deps;

use std::fmt;

use crate::common::{ActionId, Arena, Handle, MAX_IDEPS, TICK_NEVER, Tick};

pub use deps::{Dependent, EdgePool};

/// Handle to a uop in a [`UopPool`].
pub type UopHandle = Handle<Uop>;

/// Functional unit classes a uop can execute on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FuClass {
    /// Integer ALU.
    Ieu,
    /// Jump execution unit.
    Jeu,
    /// Integer multiplier.
    Imul,
    /// Integer divider.
    Idiv,
    /// Shifter.
    Shift,
    /// FP adder.
    Fadd,
    /// FP multiplier.
    Fmul,
    /// FP divider.
    Fdiv,
    /// FP complex unit.
    Fcplx,
    /// Load address generation.
    Ld,
    /// Store address generation.
    Sta,
    /// Store data.
    Std,
}

impl FuClass {
    /// Every class, in table order.
    pub const ALL: [Self; 12] = [
        Self::Ieu,
        Self::Jeu,
        Self::Imul,
        Self::Idiv,
        Self::Shift,
        Self::Fadd,
        Self::Fmul,
        Self::Fdiv,
        Self::Fcplx,
        Self::Ld,
        Self::Sta,
        Self::Std,
    ];

    /// Number of classes.
    pub const COUNT: usize = Self::ALL.len();

    /// Position in [`FuClass::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Upper-case unit name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ieu => "IEU",
            Self::Jeu => "JEU",
            Self::Imul => "IMUL",
            Self::Idiv => "IDIV",
            Self::Shift => "SHIFT",
            Self::Fadd => "FADD",
            Self::Fmul => "FMUL",
            Self::Fdiv => "FDIV",
            Self::Fcplx => "FCPLX",
            Self::Ld => "LD",
            Self::Sta => "STA",
            Self::Std => "STD",
        }
    }

    /// Integer-domain units counted as integer FU occupancy.
    pub const fn is_int(self) -> bool {
        matches!(self, Self::Ieu | Self::Jeu | Self::Shift)
    }

    /// FP units.
    pub const fn is_fp(self) -> bool {
        matches!(self, Self::Fadd | Self::Fmul | Self::Fdiv | Self::Fcplx)
    }

    /// Multiply/divide units.
    pub const fn is_mul(self) -> bool {
        matches!(self, Self::Imul | Self::Idiv)
    }
}

impl fmt::Display for FuClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Memory fence flavours tracked in the load queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceKind {
    /// Orders loads only.
    Lfence,
    /// Orders stores only; never blocks in the load queue.
    Sfence,
    /// Orders loads against older stores.
    ///
    /// A light fence waits for the older store to leave the regular STQ; a
    /// heavy one waits until it has also drained from the senior STQ.
    Mfence {
        /// Wait only for the store to commit.
        light: bool,
    },
}

/// Static properties from decode.
#[derive(Clone, Debug, Default)]
pub struct Decode {
    /// Global program-order sequence number.
    pub seq: u64,
    /// Sequence number of the enclosing macro-op.
    pub mop_seq: u64,
    /// Unit this uop executes on; `None` for fences.
    pub fu_class: Option<FuClass>,
    /// Reads memory.
    pub is_load: bool,
    /// Store address half.
    pub is_sta: bool,
    /// Store data half.
    pub is_std: bool,
    /// Control transfer that can redirect the front end.
    pub is_ctrl: bool,
    /// Fence kind, if this uop is a fence.
    pub fence: Option<FenceKind>,
    /// Access size in bytes for loads and stores.
    pub mem_size: u64,
    /// Writes an FP register.
    pub writes_fpr: bool,
    /// Computes in the FP domain.
    pub fp_compute: bool,
    /// Member of a fused group.
    pub in_fusion: bool,
    /// First member of its fused group.
    pub is_fusion_head: bool,
    /// Head of the fused group (itself for the head).
    pub fusion_head: Option<UopHandle>,
    /// Next member of the fused group.
    pub fusion_next: Option<UopHandle>,
}

impl Decode {
    /// Loads and both store halves.
    pub const fn is_mem(&self) -> bool {
        self.is_load || self.is_sta || self.is_std
    }
}

/// Predicted control flow.
#[derive(Clone, Debug, Default)]
pub struct Fetch {
    /// Instruction address.
    pub pc: u64,
    /// Predicted next PC.
    pub pred_npc: u64,
}

/// Ground truth supplied by the functional oracle.
#[derive(Clone, Debug, Default)]
pub struct Oracle {
    /// Virtual address of a memory access.
    pub virt_addr: u64,
    /// Result value.
    pub ovalue: u64,
    /// Actual next PC.
    pub next_pc: u64,
    /// On a mispredicted (wrong) path.
    pub spec_mode: bool,
    /// Access goes through the memory repeater.
    pub is_repeated: bool,
    /// Producers of each input operand.
    pub producers: [Option<UopHandle>; MAX_IDEPS],
}

/// Slots assigned at allocation.
#[derive(Clone, Debug, Default)]
pub struct Alloc {
    /// Execution port.
    pub port: Option<usize>,
    /// Reservation station slot.
    pub rs_index: Option<usize>,
    /// Load queue slot (loads and fences).
    pub ldq_index: Option<usize>,
    /// Store queue slot (both store halves).
    pub stq_index: Option<usize>,
    /// Whole fused group has been allocated (set on the head).
    pub full_fusion_allocated: bool,
}

/// Per-stage timestamps.
#[derive(Clone, Debug)]
pub struct Timing {
    /// All input tags ready.
    pub when_ready: Tick,
    /// Issued into a payload pipe.
    pub when_issued: Tick,
    /// Entered a functional unit.
    pub when_exec: Tick,
    /// Result produced.
    pub when_completed: Tick,
    /// Predicted output availability broadcast to dependents.
    pub when_otag_ready: Tick,
    /// Per-input tag availability.
    pub when_itag_ready: [Tick; MAX_IDEPS],
    /// Per-input value availability.
    pub when_ival_ready: [Tick; MAX_IDEPS],
    /// Load data arrived from the data cache.
    pub when_data_loaded: Tick,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            when_ready: TICK_NEVER,
            when_issued: TICK_NEVER,
            when_exec: TICK_NEVER,
            when_completed: TICK_NEVER,
            when_otag_ready: TICK_NEVER,
            when_itag_ready: [0; MAX_IDEPS],
            when_ival_ready: [0; MAX_IDEPS],
            when_data_loaded: TICK_NEVER,
        }
    }
}

impl Timing {
    /// Latest input tag time; the uop is ready when this is reached.
    pub fn max_itag(&self) -> Tick {
        self.when_itag_ready.iter().copied().max().unwrap_or(0)
    }

    /// Forget issue, execution and completion.
    pub const fn reset_execution(&mut self) {
        self.when_issued = TICK_NEVER;
        self.when_exec = TICK_NEVER;
        self.when_completed = TICK_NEVER;
        self.when_otag_ready = TICK_NEVER;
    }
}

/// Address translation state of a load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Translation {
    /// No DTLB request made yet.
    #[default]
    NotRequested,
    /// DTLB request outstanding.
    Pending,
    /// Translated at the given cycle.
    Done(Tick),
}

impl Translation {
    /// Translation is complete by `now`.
    pub const fn is_done_by(self, now: Tick) -> bool {
        matches!(self, Self::Done(t) if t <= now)
    }
}

/// Mutable scheduling state.
#[derive(Clone, Debug)]
pub struct Exec {
    /// Current epoch; references carrying an older id are stale.
    pub action_id: ActionId,
    /// A live ready-queue node refers to this uop.
    pub in_ready_queue: bool,
    /// Each input value has been bypassed.
    pub ivalue_valid: [bool; MAX_IDEPS],
    /// Input values.
    pub ivalue: [u64; MAX_IDEPS],
    /// Output value.
    pub ovalue: u64,
    /// Output value has been produced.
    pub ovalue_valid: bool,
    /// Times this uop reached execute unprepared.
    pub num_replays: u32,
    /// Members of this fused group still in the RS (head only).
    pub uops_in_rs: u32,
    /// Load address translation.
    pub translation: Translation,
}

impl Default for Exec {
    fn default() -> Self {
        Self {
            action_id: ActionId::NONE,
            in_ready_queue: false,
            ivalue_valid: [true; MAX_IDEPS],
            ivalue: [0; MAX_IDEPS],
            ovalue: 0,
            ovalue_valid: false,
            num_replays: 0,
            uops_in_rs: 0,
            translation: Translation::NotRequested,
        }
    }
}

/// One micro-operation.
#[derive(Clone, Debug, Default)]
pub struct Uop {
    /// Static decode information.
    pub decode: Decode,
    /// Predicted control flow.
    pub fetch: Fetch,
    /// Oracle ground truth.
    pub oracle: Oracle,
    /// Allocated slots.
    pub alloc: Alloc,
    /// Stage timestamps.
    pub timing: Timing,
    /// Scheduling state.
    pub exec: Exec,
    pub(crate) odep_head: Option<u32>,
}

impl Uop {
    /// Creates a uop with the given sequence number.
    pub fn new(seq: u64) -> Self {
        let mut uop = Self::default();
        uop.decode.seq = seq;
        uop.decode.mop_seq = seq;
        uop
    }

    /// All inputs have been bypassed.
    pub fn inputs_valid(&self) -> bool {
        self.exec.ivalue_valid.iter().all(|&v| v)
    }

    /// The oracle disagrees with the predicted next PC.
    pub const fn mispredicted(&self) -> bool {
        self.fetch.pred_npc != self.oracle.next_pc
    }

    /// Extra bypass cycles when the value crosses between integer and FP domains.
    pub const fn domain_penalty(&self, fp_penalty: Tick) -> Tick {
        if self.decode.writes_fpr != self.decode.fp_compute {
            fp_penalty
        } else {
            0
        }
    }

    /// Bypass penalty for a load result.
    pub const fn load_penalty(&self, fp_penalty: Tick) -> Tick {
        if self.decode.writes_fpr { fp_penalty } else { 0 }
    }
}

/// Owner of all in-flight uops and their dependency edges.
///
/// The front end allocates and frees uops; the engine borrows the pool on
/// every call and reaches uops only through handles.
#[derive(Debug, Default)]
pub struct UopPool {
    uops: Arena<Uop>,
    edges: EdgePool,
}

impl UopPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live uops.
    pub const fn len(&self) -> usize {
        self.uops.len()
    }

    /// Returns `true` if no uop is live.
    pub const fn is_empty(&self) -> bool {
        self.uops.is_empty()
    }

    /// Stores a uop and returns its handle.
    pub fn alloc(&mut self, uop: Uop) -> UopHandle {
        self.uops.insert(uop)
    }

    /// Frees a uop and its outgoing dependency edges.
    ///
    /// Edges from other producers that point at this uop are left in place;
    /// they no longer resolve and are skipped when walked.
    pub fn free(&mut self, handle: UopHandle) -> Option<Uop> {
        let uop = self.uops.remove(handle)?;
        self.edges.release_chain(uop.odep_head);
        Some(uop)
    }

    /// Borrows a uop; `None` if the handle is stale.
    pub fn resolve(&self, handle: UopHandle) -> Option<&Uop> {
        self.uops.resolve(handle)
    }

    /// Mutably borrows a uop; `None` if the handle is stale.
    pub fn resolve_mut(&mut self, handle: UopHandle) -> Option<&mut Uop> {
        self.uops.resolve_mut(handle)
    }

    /// Records that input `op_num` of `consumer` is produced by `producer`.
    ///
    /// The consumer's input tag and value start out pending unless the
    /// producer has already completed. Returns `false` if either handle is
    /// stale or `op_num` is out of range.
    pub fn add_dependency(&mut self, producer: UopHandle, consumer: UopHandle, op_num: usize) -> bool {
        if op_num >= MAX_IDEPS {
            return false;
        }
        let Some(prod) = self.uops.resolve(producer) else {
            return false;
        };
        let (otag, completed, ovalue, head) = (
            prod.timing.when_otag_ready,
            prod.timing.when_completed,
            prod.exec.ovalue,
            prod.odep_head,
        );
        let Some(cons) = self.uops.resolve_mut(consumer) else {
            return false;
        };
        cons.oracle.producers[op_num] = Some(producer);
        if completed == TICK_NEVER {
            cons.timing.when_itag_ready[op_num] = otag;
            cons.timing.when_ival_ready[op_num] = TICK_NEVER;
            cons.exec.ivalue_valid[op_num] = false;
        } else {
            cons.timing.when_itag_ready[op_num] = completed;
            cons.timing.when_ival_ready[op_num] = completed;
            cons.exec.ivalue_valid[op_num] = true;
            cons.exec.ivalue[op_num] = ovalue;
        }

        let edge = self.edges.push(consumer, op_num, head);
        if let Some(prod) = self.uops.resolve_mut(producer) {
            prod.odep_head = Some(edge);
        }
        true
    }

    /// Live consumers of `producer`, most recently added first.
    pub fn dependents(&self, producer: UopHandle) -> Vec<Dependent> {
        let head = self.uops.resolve(producer).and_then(|u| u.odep_head);
        self.edges
            .iter_chain(head)
            .filter(|d| self.uops.contains(d.consumer))
            .collect()
    }
}
