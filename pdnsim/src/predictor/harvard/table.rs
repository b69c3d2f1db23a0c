//! Correlation table
//!
//! Bounded signature store with LRU replacement, optional approximate
//! (hamming-bounded) matching and an optional bloom filter that keeps
//! remembering hot signatures after they get evicted.

// Imports
use {
	crate::events::EventKind,
	itertools::Itertools,
	std::{
		collections::hash_map::DefaultHasher,
		hash::{Hash, Hasher},
	},
};

/// Number of hash functions used by the bloom filter
const BLOOM_HASHES: u64 = 3;

/// Accesses an entry needs before eviction promotes it into the bloom filter
const BLOOM_PROMOTE_ACCESSES: u64 = 3;

/// Lookup signature: anchor pc plus recent event history, newest first
#[derive(PartialEq, Eq, Clone, Hash, Debug)]
pub struct Signature {
	/// Anchor pc (already shifted/masked by the predictor)
	pub pc: u64,

	/// Event history, newest first
	pub events: Vec<EventKind>,
}

impl Signature {
	/// Returns whether `other` matches this signature.
	///
	/// The first `events_to_drop` (newest) events are ignored, which lets a
	/// partially-formed history match an older insertion and buys lead
	/// time. Up to `hamming_distance` of the remaining positions may
	/// differ.
	pub fn matches(&self, other: &Self, hamming_distance: usize, events_to_drop: usize) -> bool {
		if self.pc != other.pc || self.events.len() != other.events.len() {
			return false;
		}

		let differing = self
			.events
			.iter()
			.zip(&other.events)
			.skip(events_to_drop)
			.filter(|(lhs, rhs)| lhs != rhs)
			.count();
		differing <= hamming_distance
	}
}

/// Table entry
#[derive(Clone, Debug)]
struct Entry {
	/// Stored signature
	signature: Signature,

	/// LRU clock value at last access
	last_used: u64,

	/// Total accesses since insertion
	accesses: u64,
}

/// Correlation table
#[derive(Clone, Debug)]
pub struct Table {
	/// Entries, at most `capacity`
	entries: Vec<Entry>,

	/// Maximum number of entries
	capacity: usize,

	/// Maximum differing event positions for an approximate match
	hamming_distance: usize,

	/// Newest events ignored during matching
	events_to_drop: usize,

	/// Optional bloom filter over evicted hot signatures
	bloom: Option<BloomFilter>,

	/// LRU clock, advanced once per epoch
	clock: u64,

	/// Total insertions
	pub insertions: u64,

	/// Exact/approximate table matches
	pub matches: u64,

	/// Matches answered by the bloom filter alone
	pub bloom_matches: u64,

	/// Lookup misses
	pub misses: u64,
}

impl Table {
	/// Creates an empty table.
	///
	/// A `bloom_filter_size` of 0 disables the bloom filter.
	pub fn new(capacity: usize, hamming_distance: usize, events_to_drop: usize, bloom_filter_size: usize) -> Self {
		Self {
			entries: Vec::with_capacity(capacity),
			capacity,
			hamming_distance,
			events_to_drop,
			bloom: (bloom_filter_size > 0).then(|| BloomFilter::new(bloom_filter_size)),
			clock: 0,
			insertions: 0,
			matches: 0,
			bloom_matches: 0,
			misses: 0,
		}
	}

	/// Advances the LRU clock by one epoch
	pub fn tick(&mut self) {
		self.clock += 1;
	}

	/// Looks up a signature, updating LRU/access metadata on a hit
	pub fn find(&mut self, signature: &Signature) -> bool {
		let (hamming_distance, events_to_drop, clock) = (self.hamming_distance, self.events_to_drop, self.clock);
		if let Some(entry) = self
			.entries
			.iter_mut()
			.find(|entry| entry.signature.matches(signature, hamming_distance, events_to_drop))
		{
			entry.last_used = clock;
			entry.accesses += 1;
			self.matches += 1;
			return true;
		}

		if let Some(bloom) = &self.bloom {
			if bloom.contains(signature) {
				self.bloom_matches += 1;
				return true;
			}
		}

		self.misses += 1;
		false
	}

	/// Inserts a signature.
	///
	/// An exact duplicate refreshes the existing entry. Otherwise the
	/// least-recently-used entry is evicted; if it was accessed often
	/// enough it is remembered in the bloom filter on the way out.
	pub fn insert(&mut self, signature: Signature) {
		self.insertions += 1;

		if let Some(entry) = self.entries.iter_mut().find(|entry| entry.signature == signature) {
			entry.last_used = self.clock;
			return;
		}

		let entry = Entry {
			signature,
			last_used: self.clock,
			accesses: 0,
		};

		if self.entries.len() < self.capacity {
			self.entries.push(entry);
			return;
		}

		// Full: evict the least-recently-used entry
		let evict_idx = match self.entries.iter().position_min_by_key(|entry| entry.last_used) {
			Some(lru) => lru,
			// A zero-capacity table stores nothing
			None => return,
		};

		let evicted = std::mem::replace(&mut self.entries[evict_idx], entry);
		if evicted.accesses >= BLOOM_PROMOTE_ACCESSES {
			if let Some(bloom) = &mut self.bloom {
				tracing::trace!(?evicted.signature, "Promoting evicted signature to bloom filter");
				bloom.insert(&evicted.signature);
			}
		}
	}

	/// Returns the number of live entries
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns whether the table is empty
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// Bloom filter over signatures
#[derive(Clone, Debug)]
pub struct BloomFilter {
	/// Bit array, packed
	bits: Vec<u64>,

	/// Number of usable bits
	num_bits: usize,
}

impl BloomFilter {
	/// Creates an empty filter of `num_bits` bits
	pub fn new(num_bits: usize) -> Self {
		Self {
			bits: vec![0; num_bits.div_ceil(64)],
			num_bits,
		}
	}

	/// Inserts a signature
	pub fn insert(&mut self, signature: &Signature) {
		for seed in 0..BLOOM_HASHES {
			let bit = self.bit_index(signature, seed);
			self.bits[bit / 64] |= 1 << (bit % 64);
		}
	}

	/// Returns whether a signature may have been inserted
	pub fn contains(&self, signature: &Signature) -> bool {
		(0..BLOOM_HASHES).all(|seed| {
			let bit = self.bit_index(signature, seed);
			self.bits[bit / 64] & (1 << (bit % 64)) != 0
		})
	}

	/// Hashes a signature with one of the seeded hash functions
	fn bit_index(&self, signature: &Signature, seed: u64) -> usize {
		let mut hasher = DefaultHasher::new();
		seed.hash(&mut hasher);
		signature.hash(&mut hasher);
		(hasher.finish() % self.num_bits as u64) as usize
	}
}
