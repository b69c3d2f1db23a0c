//! Architectural events and per-epoch samples

// Imports
use std::collections::VecDeque;

/// Microarchitectural event kind.
///
/// Closed set of committed-instruction events the architectural core
/// reports each epoch.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
pub enum EventKind {
	/// Branch, taken
	BranchTaken,

	/// Branch, not taken
	BranchNotTaken,

	/// Branch mispredicted
	BranchMispredict,

	/// Memory-order misspeculation
	MemOrderViolation,

	/// I-cache miss
	IcacheMiss,

	/// D-cache miss
	DcacheMiss,

	/// L2 miss
	L2Miss,

	/// L3 miss
	L3Miss,

	/// D-TLB miss
	DtlbMiss,

	/// I-TLB miss
	ItlbMiss,
}

impl EventKind {
	/// Number of event kinds
	pub const COUNT: usize = 10;
	/// All event kinds, in counter order
	pub const ALL: [Self; Self::COUNT] = [
		Self::BranchTaken,
		Self::BranchNotTaken,
		Self::BranchMispredict,
		Self::MemOrderViolation,
		Self::IcacheMiss,
		Self::DcacheMiss,
		Self::L2Miss,
		Self::L3Miss,
		Self::DtlbMiss,
		Self::ItlbMiss,
	];

	/// Returns the counter index of this event kind
	pub fn index(self) -> usize {
		self as usize
	}

	/// Returns the event kind with counter index `idx`, if any
	pub fn from_index(idx: usize) -> Option<Self> {
		Self::ALL.get(idx).copied()
	}

	/// Returns the display name of this event kind
	pub fn name(self) -> &'static str {
		match self {
			Self::BranchTaken => "branch_taken",
			Self::BranchNotTaken => "branch_not_taken",
			Self::BranchMispredict => "branch_mispredict",
			Self::MemOrderViolation => "mem_order_violation",
			Self::IcacheMiss => "icache_miss",
			Self::DcacheMiss => "dcache_miss",
			Self::L2Miss => "l2_miss",
			Self::L3Miss => "l3_miss",
			Self::DtlbMiss => "dtlb_miss",
			Self::ItlbMiss => "itlb_miss",
		}
	}
}

/// A single epoch's worth of telemetry from the architectural core
#[derive(Clone, Copy, Debug)]
pub struct EpochSample {
	/// Cycle index at the start of the epoch
	pub cycle: u64,

	/// Anchor program counter of the last committed instruction
	pub pc: u64,

	/// Instantaneous current draw estimate (amps)
	pub current: f64,

	/// Instructions queued behind the current stall, if any
	pub pending_insts: u32,

	/// Whether the core spent this epoch stalled
	pub stalled: bool,

	/// Event occurrence counts, indexed by [`EventKind::index`]
	pub event_counts: [u32; EventKind::COUNT],
}

impl EpochSample {
	/// Returns an iterator over the events of this epoch, each kind
	/// repeated once per occurrence, in counter order.
	pub fn events(&self) -> impl Iterator<Item = EventKind> + '_ {
		EventKind::ALL
			.iter()
			.flat_map(|&kind| std::iter::repeat(kind).take(self.event_counts[kind.index()] as usize))
	}

	/// Returns the total number of events in this epoch
	pub fn total_events(&self) -> u64 {
		self.event_counts.iter().map(|&count| u64::from(count)).sum()
	}
}

/// Event history register.
///
/// Fixed-length shift register of the most recent events, anchored by the
/// pc of the epoch that last shifted it. Event-driven predictors derive
/// their lookup signatures from it.
#[derive(Clone, Debug)]
pub struct HistoryRegister {
	/// Most recent events, newest first
	events: VecDeque<EventKind>,

	/// Anchor pc
	pc: u64,

	/// History length
	capacity: usize,

	/// Whether the register shifted since the last signature was taken
	updated: bool,
}

impl HistoryRegister {
	/// Creates an empty history register of length `capacity`
	pub fn new(capacity: usize) -> Self {
		Self {
			events: VecDeque::with_capacity(capacity),
			pc: 0,
			capacity,
			updated: false,
		}
	}

	/// Shifts a single event into the register
	pub fn add_event(&mut self, event: EventKind) {
		if self.events.len() == self.capacity {
			let _ = self.events.pop_back();
		}
		self.events.push_front(event);
		self.updated = true;
	}

	/// Feeds a full epoch sample into the register.
	///
	/// Sets the anchor pc, then shifts every event of the epoch in.
	pub fn observe(&mut self, sample: &EpochSample) {
		self.pc = sample.pc;
		for event in sample.events() {
			self.add_event(event);
		}
	}

	/// Returns whether the register shifted since the last call, and
	/// clears the flag.
	pub fn take_updated(&mut self) -> bool {
		std::mem::take(&mut self.updated)
	}

	/// Returns whether the register holds a full-length history yet
	pub fn is_full(&self) -> bool {
		self.events.len() == self.capacity
	}

	/// Returns the anchor pc
	pub fn pc(&self) -> u64 {
		self.pc
	}

	/// Returns the current events, newest first
	pub fn events(&self) -> impl Iterator<Item = EventKind> + '_ {
		self.events.iter().copied()
	}

	/// Returns the most recent `len` entries as numeric inputs for
	/// learned-weight predictors, newest first, zero-padded to `len`.
	///
	/// Each event maps to `index + 1` so that padding is distinguishable
	/// from the first event kind.
	pub fn values(&self, len: usize) -> Vec<f64> {
		(0..len)
			.map(|idx| match self.events.get(idx) {
				Some(event) => (event.index() + 1) as f64,
				None => 0.0,
			})
			.collect()
	}
}
