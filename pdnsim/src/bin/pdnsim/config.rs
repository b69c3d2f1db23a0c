//! Configuration

// Imports
use {
	pdnsim::{
		pdn::PdnParams,
		predictor::{HarvardConfig, IdealSensorConfig, PerceptronConfig, StallHeuristicConfig},
	},
	std::path::PathBuf,
};

/// Configuration
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
	/// Cycles per epoch.
	///
	/// Cross-checked against the trace header.
	pub period: u64,

	/// Maximum samples to replay (all, if unspecified)
	#[serde(default)]
	pub max_samples: Option<u64>,

	/// Debug output period (seconds)
	pub debug_output_period_secs: f64,

	/// Lower clamp on the per-epoch current draw (amps)
	pub min_current: f64,

	/// Upper clamp on the per-epoch current draw (amps)
	pub max_current: f64,

	/// PDN circuit constants
	pub pdn: PdnParams,

	/// Emergency voltage level (volts)
	pub emergency: f64,

	/// Throttled epochs per reactive (ground-truth) emergency
	pub emergency_duration: u64,

	/// Throttle controller
	pub throttle: Throttle,

	/// Lead-time band for classifying predictions
	pub lead_time: LeadTime,

	/// Voltage distribution histogram
	pub voltage_dist: VoltageDist,

	/// Predictor strategy
	pub predictor: Predictor,

	/// External analog solver (in-process PDN model, if unspecified)
	#[serde(default)]
	pub external_psu: Option<ExternalPsu>,
}

/// Throttle configuration
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Throttle {
	/// Throttled epochs per predicted trigger
	pub duration: u64,

	/// Voltage margin above the emergency level required before restoring
	#[serde(default)]
	pub hysteresis: f64,

	/// Whether restoring costs one extra throttled epoch
	#[serde(default)]
	pub throttle_on_restore: bool,

	/// Multiplier applied to the core's current draw while throttled
	pub throttle_scale: f64,
}

/// Lead-time band
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct LeadTime {
	/// Minimum epochs between a prediction and its emergency
	#[serde(default)]
	pub min: usize,

	/// Maximum epochs between a prediction and its emergency
	pub max: usize,
}

/// Voltage distribution histogram
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct VoltageDist {
	/// Lower bound (volts)
	pub v_min: f64,

	/// Upper bound (volts)
	pub v_max: f64,

	/// Bucket count
	pub buckets: usize,
}

/// Predictor strategy
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predictor {
	/// Reactive voltage-threshold sensor
	Sensor(IdealSensorConfig),

	/// Event-correlation table
	Harvard(HarvardConfig),

	/// Learned-weight (perceptron) model
	Perceptron(PerceptronConfig),

	/// Dependency-stall heuristic
	Stall(StallHeuristicConfig),
}

/// External analog solver
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ExternalPsu {
	/// Solver executable
	pub program: PathBuf,

	/// Solver arguments
	#[serde(default)]
	pub args: Vec<String>,
}
