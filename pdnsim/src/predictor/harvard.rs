//! Event-correlation (Harvard-style) predictor
//!
//! Learns the event signatures that precede voltage emergencies: whenever
//! a ground-truth emergency fires, the current history-register signature
//! is inserted into a bounded correlation table; afterwards, seeing that
//! signature again predicts the droop before it happens.

// Modules
pub mod table;

// Exports
pub use table::{BloomFilter, Signature, Table};

// Imports
use {
	super::{Feedback, Prediction, PredictorInput},
	crate::events::HistoryRegister,
};

/// Policy for combining the table lookup with the voltage cross-check
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinePolicy {
	/// Table lookup only
	TableOnly,

	/// Table lookup OR voltage at/below the emergency level.
	///
	/// The more conservative trigger wins; this is the default.
	#[default]
	Or,

	/// Table lookup AND voltage at/below the emergency level
	And,
}

/// Harvard predictor configuration
#[derive(Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct HarvardConfig {
	/// Correlation table capacity
	pub table_size: usize,

	/// Events per signature
	pub signature_length: usize,

	/// Bloom filter size in bits (0 disables it)
	#[serde(default)]
	pub bloom_filter_size: usize,

	/// Differing event positions tolerated by an approximate match
	#[serde(default)]
	pub hamming_distance: usize,

	/// Newest events ignored during matching, trading accuracy for lead time
	#[serde(default)]
	pub events_to_drop: usize,

	/// Bits to right-shift the anchor pc by before masking
	pub pc_start: u32,

	/// Anchor pc bits kept after the shift
	pub num_correlation_bits: u32,

	/// How to combine the table lookup with the voltage cross-check
	#[serde(default)]
	pub combine: CombinePolicy,
}

impl HarvardConfig {
	/// Validates this configuration
	pub fn validate(&self) -> Result<(), anyhow::Error> {
		anyhow::ensure!(self.table_size > 0, "Harvard table size must be non-zero");
		anyhow::ensure!(self.signature_length > 0, "Harvard signature length must be non-zero");
		anyhow::ensure!(
			self.num_correlation_bits > 0 && self.num_correlation_bits <= 64,
			"Harvard correlation bits must be in 1..=64"
		);
		anyhow::ensure!(
			self.events_to_drop < self.signature_length,
			"Cannot drop the whole signature"
		);
		Ok(())
	}
}

/// Event-correlation predictor
#[derive(Clone, Debug)]
pub struct Harvard {
	/// Configuration
	config: HarvardConfig,

	/// Event history register
	history: HistoryRegister,

	/// Correlation table
	table: Table,

	/// Signature captured at the last observation, pending feedback
	last_signature: Option<Signature>,
}

impl Harvard {
	/// Creates a new predictor.
	///
	/// # Errors
	/// Returns an error if the configuration is invalid.
	pub fn new(config: HarvardConfig) -> Result<Self, anyhow::Error> {
		config.validate()?;

		Ok(Self {
			config,
			history: HistoryRegister::new(config.signature_length),
			table: Table::new(
				config.table_size,
				config.hamming_distance,
				config.events_to_drop,
				config.bloom_filter_size,
			),
			last_signature: None,
		})
	}

	/// Masks an anchor pc down to the configured correlation bits
	fn mask_pc(&self, pc: u64) -> u64 {
		let shifted = pc >> self.config.pc_start;
		match self.config.num_correlation_bits {
			64 => shifted,
			bits => shifted & ((1 << bits) - 1),
		}
	}

	/// Returns the current lookup signature
	fn signature(&self) -> Signature {
		Signature {
			pc:     self.mask_pc(self.history.pc()),
			events: self.history.events().collect(),
		}
	}

	/// Evaluates this epoch
	pub fn observe(&mut self, input: &PredictorInput<'_>) -> Prediction {
		self.table.tick();
		self.history.observe(input.sample);

		// Only a freshly-shifted history is worth looking up
		let table_hit = match self.history.take_updated() {
			true => {
				let signature = self.signature();
				let hit = self.table.find(&signature);
				self.last_signature = Some(signature);
				hit
			},
			false => false,
		};

		let voltage_low = input.voltage <= input.emergency_level;
		let emergency = match self.config.combine {
			CombinePolicy::TableOnly => table_hit,
			CombinePolicy::Or => table_hit || voltage_low,
			CombinePolicy::And => table_hit && voltage_low,
		};

		Prediction {
			emergency,
			confidence: None,
		}
	}

	/// Trains on ground truth: an actual emergency stores the signature
	/// that led into it.
	pub fn train(&mut self, feedback: &Feedback) {
		if feedback.actual_emergency {
			if let Some(signature) = self.last_signature.clone() {
				tracing::trace!(?signature, "Inserting emergency signature");
				self.table.insert(signature);
			}
		}
	}

	/// Returns the correlation table (for statistics)
	pub fn table(&self) -> &Table {
		&self.table
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::events::{EpochSample, EventKind},
	};

	fn config() -> HarvardConfig {
		HarvardConfig {
			table_size: 16,
			signature_length: 4,
			bloom_filter_size: 0,
			hamming_distance: 0,
			events_to_drop: 0,
			pc_start: 2,
			num_correlation_bits: 16,
			combine: CombinePolicy::TableOnly,
		}
	}

	fn sample(pc: u64, counts: [u32; EventKind::COUNT]) -> EpochSample {
		EpochSample {
			cycle: 0,
			pc,
			current: 1.0,
			pending_insts: 0,
			stalled: false,
			event_counts: counts,
		}
	}

	fn droop_counts() -> [u32; EventKind::COUNT] {
		let mut counts = [0; EventKind::COUNT];
		counts[EventKind::L2Miss.index()] = 2;
		counts[EventKind::BranchMispredict.index()] = 2;
		counts
	}

	#[test]
	fn validates_config() {
		let mut bad = config();
		bad.table_size = 0;
		assert!(Harvard::new(bad).is_err());

		let mut bad = config();
		bad.events_to_drop = bad.signature_length;
		assert!(Harvard::new(bad).is_err());
	}

	#[test]
	fn predicts_repeated_emergency_signature() {
		let mut harvard = Harvard::new(config()).expect("Valid config");
		let sample = sample(0x4000, droop_counts());
		let input = PredictorInput {
			sample: &sample,
			voltage: 0.93,
			prev_voltage: 1.0,
			emergency_level: 0.9,
		};

		// First encounter: unknown signature, no prediction
		assert!(!harvard.observe(&input).emergency);

		// The droop materializes; the signature is learned
		harvard.train(&Feedback {
			actual_emergency: true,
			predicted:        false,
		});

		// Same event pattern again: predicted this time
		assert!(harvard.observe(&input).emergency);
	}

	#[test]
	fn quiet_epochs_do_not_predict() {
		let mut harvard = Harvard::new(config()).expect("Valid config");
		let noisy = sample(0x4000, droop_counts());
		let quiet = sample(0x4000, [0; EventKind::COUNT]);

		let noisy_input = PredictorInput {
			sample: &noisy,
			voltage: 0.93,
			prev_voltage: 1.0,
			emergency_level: 0.9,
		};
		let quiet_input = PredictorInput {
			sample: &quiet,
			voltage: 1.0,
			prev_voltage: 1.0,
			emergency_level: 0.9,
		};

		let _ = harvard.observe(&noisy_input);
		harvard.train(&Feedback {
			actual_emergency: true,
			predicted:        false,
		});

		// A quiet epoch leaves the history unshifted: no lookup, no firing
		assert!(!harvard.observe(&quiet_input).emergency);
	}

	#[test]
	fn or_policy_adds_voltage_cross_check() {
		let mut cfg = config();
		cfg.combine = CombinePolicy::Or;
		let mut harvard = Harvard::new(cfg).expect("Valid config");

		let quiet = sample(0x4000, [0; EventKind::COUNT]);
		let input = PredictorInput {
			sample: &quiet,
			voltage: 0.85,
			prev_voltage: 1.0,
			emergency_level: 0.9,
		};

		// No table hit possible, but the voltage is already at emergency
		assert!(harvard.observe(&input).emergency);
	}

	#[test]
	fn and_policy_requires_both() {
		let mut cfg = config();
		cfg.combine = CombinePolicy::And;
		let mut harvard = Harvard::new(cfg).expect("Valid config");

		let noisy = sample(0x4000, droop_counts());
		let low_voltage = PredictorInput {
			sample: &noisy,
			voltage: 0.85,
			prev_voltage: 1.0,
			emergency_level: 0.9,
		};

		// Table miss: even a low voltage does not fire under AND
		assert!(!harvard.observe(&low_voltage).emergency);
		harvard.train(&Feedback {
			actual_emergency: true,
			predicted:        false,
		});

		// Table hit + low voltage: fires
		assert!(harvard.observe(&low_voltage).emergency);

		// Table hit + healthy voltage: does not fire
		let healthy = PredictorInput {
			sample: &noisy,
			voltage: 1.0,
			prev_voltage: 1.0,
			emergency_level: 0.9,
		};
		assert!(!harvard.observe(&healthy).emergency);
	}
}
