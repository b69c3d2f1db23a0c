//! Learned-weight (perceptron) predictor
//!
//! Keeps a row of trainable weights per pc hash over the most recent
//! event-history entries and fires when the weighted sum goes positive.
//! Trained online from ground-truth feedback, or preloaded from a model
//! file produced by an earlier run.

// Imports
use {
	super::{Feedback, Prediction, PredictorInput},
	crate::events::HistoryRegister,
	anyhow::Context,
	std::{fs, path::Path},
};

/// Perceptron configuration
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct PerceptronConfig {
	/// Number of weight rows
	pub table_size: usize,

	/// Event-history entries consumed per evaluation
	pub events: usize,

	/// Online learning rate
	pub eta: f64,

	/// Optional pretrained model file (JSON weight rows)
	#[serde(default)]
	pub model_file: Option<std::path::PathBuf>,
}

impl PerceptronConfig {
	/// Validates this configuration
	pub fn validate(&self) -> Result<(), anyhow::Error> {
		anyhow::ensure!(self.table_size > 0, "Perceptron table size must be non-zero");
		anyhow::ensure!(self.events > 0, "Perceptron event count must be non-zero");
		anyhow::ensure!(
			self.eta.is_finite() && self.eta >= 0.0,
			"Perceptron learning rate must be non-negative"
		);
		Ok(())
	}
}

/// Learned-weight predictor
#[derive(Clone, Debug)]
pub struct Perceptron {
	/// Configuration
	config: PerceptronConfig,

	/// Event history register
	history: HistoryRegister,

	/// Weight rows, indexed by pc hash
	weights: Vec<Vec<f64>>,

	/// Inputs used by the last evaluation, pending feedback
	last_inputs: Option<(usize, Vec<f64>)>,

	/// Whether the last evaluation fired
	last_pred: bool,
}

impl Perceptron {
	/// Creates a new predictor, loading the model file if configured.
	///
	/// Untrained weights start at 1.0 so an untrained model is
	/// conservative (any event activity fires).
	///
	/// # Errors
	/// Returns an error if the configuration or model file is invalid.
	pub fn new(config: PerceptronConfig) -> Result<Self, anyhow::Error> {
		config.validate()?;

		let weights = match &config.model_file {
			Some(path) => Self::load_model(path, config.table_size, config.events)
				.with_context(|| format!("Unable to load model file {path:?}"))?,
			None => vec![vec![1.0; config.events]; config.table_size],
		};

		Ok(Self {
			history: HistoryRegister::new(config.events),
			config,
			weights,
			last_inputs: None,
			last_pred: false,
		})
	}

	/// Loads pretrained weight rows from a JSON file
	fn load_model(path: &Path, table_size: usize, events: usize) -> Result<Vec<Vec<f64>>, anyhow::Error> {
		let file = fs::File::open(path).context("Unable to open model file")?;
		let weights: Vec<Vec<f64>> = serde_json::from_reader(file).context("Unable to parse model file")?;

		anyhow::ensure!(
			weights.len() == table_size,
			"Model has {} rows, expected {table_size}",
			weights.len()
		);
		for (idx, row) in weights.iter().enumerate() {
			anyhow::ensure!(row.len() == events, "Model row {idx} has {} weights, expected {events}", row.len());
		}

		Ok(weights)
	}

	/// Evaluates this epoch
	pub fn observe(&mut self, input: &PredictorInput<'_>) -> Prediction {
		self.history.observe(input.sample);
		if !self.history.take_updated() {
			// No new evaluation happened, so there is nothing to train on
			self.last_inputs = None;
			self.last_pred = false;
			return Prediction::QUIET;
		}

		let idx = (self.history.pc() % self.config.table_size as u64) as usize;
		let inputs = self.history.values(self.config.events);
		let sum: f64 = self.weights[idx]
			.iter()
			.zip(&inputs)
			.map(|(weight, input)| weight * input)
			.sum();

		self.last_inputs = Some((idx, inputs));
		self.last_pred = sum > 0.0;

		Prediction {
			emergency:  self.last_pred,
			confidence: Some(sum),
		}
	}

	/// Trains on ground truth.
	///
	/// A missed emergency reinforces the inputs that preceded it; a quiet
	/// epoch with no prediction decays them. Epochs where we fired are
	/// left alone: throttling makes the counterfactual unobservable.
	pub fn train(&mut self, feedback: &Feedback) {
		let Some((idx, inputs)) = &self.last_inputs else { return };

		let direction = match (feedback.actual_emergency, self.last_pred) {
			(true, false) => 1.0,
			(false, false) => -1.0,
			_ => return,
		};

		for (weight, input) in self.weights[*idx].iter_mut().zip(inputs) {
			*weight += direction * self.config.eta * input;
		}
	}

	/// Returns the weight rows (for model dumping)
	pub fn weights(&self) -> &[Vec<f64>] {
		&self.weights
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::events::{EpochSample, EventKind},
	};

	fn config() -> PerceptronConfig {
		PerceptronConfig {
			table_size: 8,
			events: 4,
			eta: 0.5,
			model_file: None,
		}
	}

	fn sample(pc: u64) -> EpochSample {
		let mut counts = [0; EventKind::COUNT];
		counts[EventKind::L3Miss.index()] = 2;
		EpochSample {
			cycle: 0,
			pc,
			current: 1.0,
			pending_insts: 0,
			stalled: false,
			event_counts: counts,
		}
	}

	fn input(sample: &EpochSample) -> PredictorInput<'_> {
		PredictorInput {
			sample,
			voltage: 1.0,
			prev_voltage: 1.0,
			emergency_level: 0.9,
		}
	}

	#[test]
	fn untrained_model_fires_on_activity() {
		let mut perceptron = Perceptron::new(config()).expect("Valid config");
		let sample = sample(0x40);

		let prediction = perceptron.observe(&input(&sample));
		assert!(prediction.emergency);
		assert!(prediction.confidence.expect("Perceptron must report confidence") > 0.0);
	}

	#[test]
	fn quiet_epochs_decay_weights_to_silence() {
		let mut perceptron = Perceptron::new(config()).expect("Valid config");
		let sample = sample(0x40);

		// Keep telling it no emergency follows this pattern; eventually the
		// weighted sum goes non-positive and it stops firing.
		let mut fired = true;
		for _ in 0..64 {
			fired = perceptron.observe(&input(&sample)).emergency;
			perceptron.train(&Feedback {
				actual_emergency: false,
				predicted:        fired,
			});
			if !fired {
				break;
			}
		}
		assert!(!fired, "weights never decayed below the firing threshold");
	}

	#[test]
	fn missed_emergency_reinforces_weights() {
		let mut perceptron = Perceptron::new(config()).expect("Valid config");
		let sample = sample(0x40);

		// Decay until quiet
		loop {
			let fired = perceptron.observe(&input(&sample)).emergency;
			perceptron.train(&Feedback {
				actual_emergency: false,
				predicted:        fired,
			});
			if !fired {
				break;
			}
		}

		// Now a missed emergency on that pattern: reinforce until it fires
		let mut fired = false;
		for _ in 0..64 {
			fired = perceptron.observe(&input(&sample)).emergency;
			if fired {
				break;
			}
			perceptron.train(&Feedback {
				actual_emergency: true,
				predicted:        false,
			});
		}
		assert!(fired, "reinforcement never pushed the sum back over the threshold");
	}

	#[test]
	fn idle_epochs_leave_weights_untouched() {
		let mut perceptron = Perceptron::new(config()).expect("Valid config");
		let active = sample(0x40);
		let idle = EpochSample {
			event_counts: [0; EventKind::COUNT],
			..active
		};

		let fired = perceptron.observe(&input(&active)).emergency;
		perceptron.train(&Feedback {
			actual_emergency: false,
			predicted:        fired,
		});
		let weights = perceptron.weights().to_vec();

		// Event-free epochs produce no evaluation: training feedback for
		// them must not keep decaying the last evaluated row
		for _ in 0..5 {
			let prediction = perceptron.observe(&input(&idle));
			assert!(!prediction.emergency);
			perceptron.train(&Feedback {
				actual_emergency: false,
				predicted:        false,
			});
		}
		assert_eq!(perceptron.weights(), weights);
	}

	#[test]
	fn rejects_bad_model_dimensions() {
		let dir = std::env::temp_dir();
		let path = dir.join("pdnsim_test_model_bad.json");
		std::fs::write(&path, "[[1.0, 2.0]]").expect("Unable to write model");

		let mut cfg = config();
		cfg.model_file = Some(path.clone());
		assert!(Perceptron::new(cfg).is_err());

		let _ = std::fs::remove_file(path);
	}
}
