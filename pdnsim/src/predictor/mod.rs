//! Voltage-emergency predictors
//!
//! A closed set of interchangeable prediction strategies behind one
//! dispatch surface. Each variant carries only the state its strategy
//! needs; the session drives all of them identically.

// Modules
pub mod harvard;
pub mod perceptron;
pub mod sensor;
pub mod stall;

// Exports
pub use self::{
	harvard::{CombinePolicy, Harvard, HarvardConfig},
	perceptron::{Perceptron, PerceptronConfig},
	sensor::{IdealSensor, IdealSensorConfig},
	stall::{StallHeuristic, StallHeuristicConfig},
};

// Imports
use crate::events::EpochSample;

/// Per-epoch input shared by every predictor
#[derive(Clone, Copy, Debug)]
pub struct PredictorInput<'a> {
	/// The epoch's telemetry sample
	pub sample: &'a EpochSample,

	/// Supply voltage after this epoch's PDN step
	pub voltage: f64,

	/// Supply voltage one epoch ago
	pub prev_voltage: f64,

	/// The configured emergency voltage level
	pub emergency_level: f64,
}

/// A predictor's per-epoch output
#[derive(Clone, Copy, Debug)]
pub struct Prediction {
	/// Whether a voltage emergency is imminent
	pub emergency: bool,

	/// Strategy-specific confidence, if the strategy produces one
	pub confidence: Option<f64>,
}

impl Prediction {
	/// A quiet (no-emergency) prediction
	pub const QUIET: Self = Self {
		emergency:  false,
		confidence: None,
	};
}

/// Ground-truth feedback delivered after each epoch's prediction
#[derive(Clone, Copy, Debug)]
pub struct Feedback {
	/// Whether an actual emergency materialized this epoch
	pub actual_emergency: bool,

	/// What the predictor answered this epoch
	pub predicted: bool,
}

/// A voltage-emergency predictor.
///
/// Tagged variant over the strategy set rather than an open trait object:
/// the set is closed and each strategy carries different state.
#[derive(Clone, Debug)]
pub enum Predictor {
	/// Reactive voltage-threshold sensor
	Sensor(IdealSensor),

	/// Event-correlation table
	Harvard(Harvard),

	/// Learned-weight (perceptron) model
	Perceptron(Perceptron),

	/// Dependency-stall heuristic
	Stall(StallHeuristic),
}

impl Predictor {
	/// Evaluates this epoch's emergency risk
	pub fn observe(&mut self, input: &PredictorInput<'_>) -> Prediction {
		match self {
			Self::Sensor(sensor) => sensor.observe(input),
			Self::Harvard(harvard) => harvard.observe(input),
			Self::Perceptron(perceptron) => perceptron.observe(input),
			Self::Stall(stall) => stall.observe(input),
		}
	}

	/// Delivers ground-truth feedback for online training
	pub fn train(&mut self, feedback: &Feedback) {
		match self {
			Self::Sensor(_) | Self::Stall(_) => (),
			Self::Harvard(harvard) => harvard.train(feedback),
			Self::Perceptron(perceptron) => perceptron.train(feedback),
		}
	}

	/// Returns the strategy name
	pub fn kind_name(&self) -> &'static str {
		match self {
			Self::Sensor(_) => "sensor",
			Self::Harvard(_) => "harvard",
			Self::Perceptron(_) => "perceptron",
			Self::Stall(_) => "stall",
		}
	}
}
