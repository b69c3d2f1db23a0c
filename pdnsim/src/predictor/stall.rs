//! Dependency-stall heuristic
//!
//! Exploits the classic droop precursor: a pipeline stall drains current
//! draw, and the burst of pending instructions issued right after the
//! stall resolves yields a steep di/dt edge. Predicts an emergency when
//! the pending-instruction count spikes within a short window after a
//! stall ends.

// Imports
use super::{Prediction, PredictorInput};

/// Stall heuristic configuration
#[derive(Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct StallHeuristicConfig {
	/// Pending-instruction count above which a post-stall epoch fires
	#[serde(alias = "threshold")]
	pub pending_threshold: u32,

	/// Epochs after a stall ends during which the threshold is armed
	pub window: u32,
}

impl StallHeuristicConfig {
	/// Validates this configuration
	pub fn validate(&self) -> Result<(), anyhow::Error> {
		anyhow::ensure!(self.window > 0, "Stall heuristic window must be non-zero");
		Ok(())
	}
}

/// Heuristic state
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum State {
	/// No stall in sight
	Normal,

	/// Currently stalled
	Stalled,

	/// Stall just ended; threshold armed for `remaining` more epochs
	Window {
		/// Armed epochs left
		remaining: u32,
	},
}

/// Dependency-stall predictor
#[derive(Clone, Debug)]
pub struct StallHeuristic {
	/// Configuration
	config: StallHeuristicConfig,

	/// Current state
	state: State,
}

impl StallHeuristic {
	/// Creates a new predictor.
	///
	/// # Errors
	/// Returns an error if the configuration is invalid.
	pub fn new(config: StallHeuristicConfig) -> Result<Self, anyhow::Error> {
		config.validate()?;
		Ok(Self {
			config,
			state: State::Normal,
		})
	}

	/// Evaluates this epoch
	pub fn observe(&mut self, input: &PredictorInput<'_>) -> Prediction {
		let sample = input.sample;

		self.state = match (self.state, sample.stalled) {
			(_, true) => State::Stalled,
			(State::Stalled, false) => State::Window {
				remaining: self.config.window,
			},
			(State::Window { remaining }, false) if remaining > 1 => State::Window {
				remaining: remaining - 1,
			},
			(State::Window { .. }, false) => State::Normal,
			(state, false) => state,
		};

		let emergency = matches!(self.state, State::Window { .. }) && sample.pending_insts > self.config.pending_threshold;
		if emergency {
			tracing::trace!(
				cycle = sample.cycle,
				pending = sample.pending_insts,
				"Post-stall instruction burst"
			);
		}

		Prediction {
			emergency,
			confidence: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::events::{EpochSample, EventKind},
	};

	fn sample(stalled: bool, pending_insts: u32) -> EpochSample {
		EpochSample {
			cycle: 0,
			pc: 0,
			current: 1.0,
			pending_insts,
			stalled,
			event_counts: [0; EventKind::COUNT],
		}
	}

	fn observe(heuristic: &mut StallHeuristic, stalled: bool, pending: u32) -> bool {
		let sample = sample(stalled, pending);
		heuristic
			.observe(&PredictorInput {
				sample: &sample,
				voltage: 1.0,
				prev_voltage: 1.0,
				emergency_level: 0.9,
			})
			.emergency
	}

	#[test]
	fn fires_on_post_stall_burst() {
		let mut heuristic = StallHeuristic::new(StallHeuristicConfig {
			pending_threshold: 8,
			window:            2,
		})
		.expect("Valid config");

		assert!(!observe(&mut heuristic, false, 32));
		assert!(!observe(&mut heuristic, true, 0));
		assert!(observe(&mut heuristic, false, 32));
	}

	#[test]
	fn window_expires() {
		let mut heuristic = StallHeuristic::new(StallHeuristicConfig {
			pending_threshold: 8,
			window:            2,
		})
		.expect("Valid config");

		assert!(!observe(&mut heuristic, true, 0));
		assert!(!observe(&mut heuristic, false, 2));
		assert!(observe(&mut heuristic, false, 32));

		// Window was 2 epochs; the third post-stall epoch is disarmed
		assert!(!observe(&mut heuristic, false, 32));
	}

	#[test]
	fn quiet_burst_below_threshold_does_not_fire() {
		let mut heuristic = StallHeuristic::new(StallHeuristicConfig {
			pending_threshold: 8,
			window:            4,
		})
		.expect("Valid config");

		assert!(!observe(&mut heuristic, true, 0));
		assert!(!observe(&mut heuristic, false, 8));
		assert!(!observe(&mut heuristic, false, 5));
	}

	#[test]
	fn renewed_stall_rearms_window() {
		let mut heuristic = StallHeuristic::new(StallHeuristicConfig {
			pending_threshold: 8,
			window:            1,
		})
		.expect("Valid config");

		assert!(!observe(&mut heuristic, true, 0));
		assert!(observe(&mut heuristic, false, 32));
		assert!(!observe(&mut heuristic, false, 32));
		assert!(!observe(&mut heuristic, true, 0));
		assert!(observe(&mut heuristic, false, 32));
	}
}
