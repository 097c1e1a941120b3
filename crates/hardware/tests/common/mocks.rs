use mockall::mock;
use uarch_exec::common::Tick;
use uarch_exec::core::units::cache::{
    Completion, CompletionEvent, MemRequest, MemTarget, MemoryHierarchy,
};
use uarch_exec::core::units::memdep::MemDepPredictor;

mock! {
    pub MemDep {}

    impl MemDepPredictor for MemDep {
        fn lookup(
            &mut self,
            pc: u64,
            sta_unknown: bool,
            conflict_exists: bool,
            partial_match: bool,
            now: Tick,
        ) -> bool;
        fn update(&mut self, pc: u64, now: Tick);
    }
}

/// A memory hierarchy that records every request and only answers when told.
///
/// `reply` schedules a completion for the request at `index` in
/// [`MockHierarchy::requests`]; nothing completes on its own.
#[derive(Debug, Default)]
pub struct MockHierarchy {
    pub requests: Vec<MemRequest>,
    pub refuse: bool,
    scripted: Vec<(Tick, Completion)>,
}

impl MockHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers request `index` with `event` at cycle `at`.
    pub fn reply(&mut self, index: usize, event: CompletionEvent, at: Tick) {
        let token = self.requests[index].token;
        self.scripted.push((at, Completion { token, event }));
    }

    /// Requests sent to `target`, in order.
    pub fn sent_to(&self, target: MemTarget) -> Vec<&MemRequest> {
        self.requests.iter().filter(|r| r.target == target).collect()
    }
}

impl MemoryHierarchy for MockHierarchy {
    fn enqueuable(&self, _target: MemTarget, _asid: u32, _addr: u64) -> bool {
        !self.refuse
    }

    fn enqueue(&mut self, request: MemRequest) {
        self.requests.push(request);
    }

    fn process(&mut self, now: Tick, completions: &mut Vec<Completion>) {
        let (due, later): (Vec<_>, Vec<_>) = self.scripted.drain(..).partition(|(at, _)| *at <= now);
        self.scripted = later;
        completions.extend(due.into_iter().map(|(_, c)| c));
    }
}
