//! Output data
//!
//! Serializable summary of a simulation run, written as JSON by the
//! binary once the epoch loop finishes.

// Imports
use {
	crate::{stats::MitigationStats, throttle::Throttle},
	std::ops::Range,
};

/// Run summary
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Summary {
	/// Predictor strategy name
	pub predictor: String,

	/// Epochs replayed
	pub epochs: u64,

	/// Cycle span covered by the trace
	pub cycle_span: Option<Range<u64>>,

	/// Prediction accuracy
	pub classification: Classification,

	/// Supply voltage distribution
	pub voltage: VoltageDist,

	/// Throttle utilization
	pub throttle: ThrottleSummary,
}

/// Prediction accuracy
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Classification {
	/// Total predictions
	pub predictions: u64,

	/// Total ground-truth emergencies
	pub emergencies: u64,

	/// True positives
	pub true_positives: u64,

	/// False positives
	pub false_positives: u64,

	/// False negatives
	pub false_negatives: u64,

	/// True negatives
	pub true_negatives: u64,

	/// Precision over classified predictions
	pub precision: f64,

	/// Recall over ground-truth emergencies
	pub recall: f64,

	/// True-positive lead times, indexed by epochs of warning
	pub lead_histogram: Vec<u64>,
}

/// Supply voltage distribution
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct VoltageDist {
	/// Minimum voltage observed
	pub min: f64,

	/// Maximum voltage observed
	pub max: f64,

	/// Histogram lower bound
	pub hist_min: f64,

	/// Histogram upper bound
	pub hist_max: f64,

	/// Histogram buckets
	pub histogram: Vec<u64>,
}

/// Throttle utilization
#[derive(Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ThrottleSummary {
	/// Total activations
	pub activations: u64,

	/// Activations caused by ground-truth emergencies
	pub emergency_activations: u64,

	/// Total throttled epochs
	pub throttled_epochs: u64,

	/// Fraction of all epochs spent throttled
	pub utilization: f64,
}

impl Summary {
	/// Builds a summary from a finished run
	pub fn new(
		predictor: &str,
		cycle_span: Option<Range<u64>>,
		stats: &MitigationStats,
		throttle: &Throttle,
		hist_min: f64,
		hist_max: f64,
	) -> Self {
		Self {
			predictor: predictor.to_owned(),
			epochs: stats.epochs,
			cycle_span,
			classification: Classification {
				predictions: stats.predictions,
				emergencies: stats.emergencies,
				true_positives: stats.true_positives,
				false_positives: stats.false_positives,
				false_negatives: stats.false_negatives,
				true_negatives: stats.true_negatives,
				precision: stats.precision(),
				recall: stats.recall(),
				lead_histogram: stats.lead_histogram().to_vec(),
			},
			voltage: VoltageDist {
				min: stats.min_voltage,
				max: stats.max_voltage,
				hist_min,
				hist_max,
				histogram: stats.histogram().to_vec(),
			},
			throttle: ThrottleSummary {
				activations: throttle.activations,
				emergency_activations: throttle.emergency_activations,
				throttled_epochs: throttle.throttled_epochs,
				utilization: match stats.epochs {
					0 => 0.0,
					epochs => throttle.throttled_epochs as f64 / epochs as f64,
				},
			},
		}
	}
}
