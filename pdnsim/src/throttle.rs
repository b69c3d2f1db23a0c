//! Throttle controller
//!
//! Small state machine that converts emergency triggers into a bounded
//! throttle actuation. A hysteresis watermark keeps the core throttled
//! until the supply voltage has genuinely recovered, so the controller
//! never flaps around the emergency level.

// Imports
use serde::{Deserialize, Serialize};

/// What asked for throttling this epoch
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ThrottleTrigger {
	/// Nothing
	None,

	/// A predictor fired ahead of the droop
	Predicted,

	/// A ground-truth emergency (reactive rollback path)
	Emergency,
}

/// Throttle configuration
#[derive(Clone, Copy, Debug)]
#[derive(Serialize, Deserialize)]
pub struct ThrottleConfig {
	/// Throttled epochs per predicted trigger
	pub duration: u64,

	/// Throttled epochs per ground-truth emergency trigger
	pub emergency_duration: u64,

	/// Voltage margin above the emergency level required before restoring
	#[serde(default)]
	pub hysteresis: f64,

	/// Whether restoring costs one extra throttled epoch
	#[serde(default)]
	pub throttle_on_restore: bool,

	/// Multiplier applied to the core's current draw while throttled
	pub throttle_scale: f64,
}

impl ThrottleConfig {
	/// Validates this configuration
	pub fn validate(&self) -> Result<(), anyhow::Error> {
		anyhow::ensure!(self.duration > 0, "Throttle duration must be non-zero");
		anyhow::ensure!(self.emergency_duration > 0, "Emergency throttle duration must be non-zero");
		anyhow::ensure!(
			self.hysteresis >= 0.0 && self.hysteresis.is_finite(),
			"Throttle hysteresis must be non-negative"
		);
		anyhow::ensure!(
			(0.0..=1.0).contains(&self.throttle_scale),
			"Throttle scale must be within [0, 1]"
		);
		Ok(())
	}
}

/// Controller state
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum State {
	/// Not throttling
	Idle,

	/// Actively throttling
	Throttling {
		/// Throttled epochs left before the watermark check
		remaining: u64,
	},

	/// One final throttled epoch on the way back to idle
	Restoring,
}

/// Throttle controller
#[derive(Clone, Debug)]
pub struct Throttle {
	/// Configuration
	config: ThrottleConfig,

	/// Current state
	state: State,

	/// Total throttle activations
	pub activations: u64,

	/// Activations caused by ground-truth emergencies
	pub emergency_activations: u64,

	/// Total throttled epochs
	pub throttled_epochs: u64,
}

impl Throttle {
	/// Creates an idle controller.
	///
	/// # Errors
	/// Returns an error if the configuration is invalid.
	pub fn new(config: ThrottleConfig) -> Result<Self, anyhow::Error> {
		config.validate()?;
		Ok(Self {
			config,
			state: State::Idle,
			activations: 0,
			emergency_activations: 0,
			throttled_epochs: 0,
		})
	}

	/// Returns the current draw multiplier while throttled
	pub fn scale(&self) -> f64 {
		self.config.throttle_scale
	}

	/// Returns whether the controller is currently actuating
	pub fn is_active(&self) -> bool {
		self.state != State::Idle
	}

	/// Advances the controller by one epoch.
	///
	/// Returns whether the core is throttled this epoch. A trigger from
	/// any state arms the counter; re-triggers while actuating re-arm it
	/// rather than stack, and a predicted re-trigger never cuts a longer
	/// armed response short.
	pub fn update(&mut self, trigger: ThrottleTrigger, voltage: f64, emergency_level: f64) -> bool {
		let watermark = emergency_level + self.config.hysteresis;

		let throttled = match (self.state, trigger) {
			(State::Idle, ThrottleTrigger::None) => false,
			(State::Idle | State::Restoring, ThrottleTrigger::Predicted) => {
				self.activations += 1;
				self.state = State::Throttling {
					remaining: self.config.duration,
				};
				true
			},
			(State::Idle | State::Restoring, ThrottleTrigger::Emergency) => {
				self.activations += 1;
				self.emergency_activations += 1;
				self.state = State::Throttling {
					remaining: self.config.emergency_duration,
				};
				true
			},

			// Re-triggers re-arm the counter, they never accumulate
			(State::Throttling { remaining }, ThrottleTrigger::Predicted) => {
				self.state = State::Throttling {
					remaining: remaining.max(self.config.duration),
				};
				true
			},
			(State::Throttling { .. }, ThrottleTrigger::Emergency) => {
				self.emergency_activations += 1;
				self.state = State::Throttling {
					remaining: self.config.emergency_duration,
				};
				true
			},
			(State::Throttling { .. }, ThrottleTrigger::None) => true,

			(State::Restoring, ThrottleTrigger::None) => {
				self.state = State::Idle;
				true
			},
		};

		// Count down, but hold below the hysteresis watermark
		if let State::Throttling { remaining } = self.state {
			self.state = match remaining {
				1 if voltage >= watermark => match self.config.throttle_on_restore {
					true => State::Restoring,
					false => State::Idle,
				},
				1 => State::Throttling { remaining: 1 },
				remaining => State::Throttling {
					remaining: remaining - 1,
				},
			};
		}

		if throttled {
			self.throttled_epochs += 1;
		}
		throttled
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config() -> ThrottleConfig {
		ThrottleConfig {
			duration: 3,
			emergency_duration: 5,
			hysteresis: 0.0,
			throttle_on_restore: false,
			throttle_scale: 0.5,
		}
	}

	#[test]
	fn predicted_trigger_throttles_for_duration() {
		let mut throttle = Throttle::new(config()).expect("Valid config");

		assert!(!throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::Predicted, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert!(!throttle.update(ThrottleTrigger::None, 1.0, 0.9));

		assert_eq!(throttle.activations, 1);
		assert_eq!(throttle.throttled_epochs, 3);
	}

	#[test]
	fn retrigger_resets_counter() {
		let mut throttle = Throttle::new(config()).expect("Valid config");

		// Trigger at epoch 0, re-trigger at epoch 2: the counter re-arms
		// to the full duration, so epochs 3 and 4 stay throttled
		assert!(throttle.update(ThrottleTrigger::Predicted, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::Predicted, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert!(!throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert_eq!(throttle.activations, 1);
	}

	#[test]
	fn retrigger_rearms_without_accumulating() {
		let mut throttle = Throttle::new(config()).expect("Valid config");

		// Back-to-back triggers reset the counter, they do not add up:
		// the last trigger is at epoch 1, so epoch 4 is free (not 6)
		assert!(throttle.update(ThrottleTrigger::Predicted, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::Predicted, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert!(!throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert_eq!(throttle.activations, 1);
		assert_eq!(throttle.throttled_epochs, 4);
	}

	#[test]
	fn predicted_retrigger_does_not_shorten_emergency_response() {
		let mut throttle = Throttle::new(config()).expect("Valid config");

		// Emergency arms 5 epochs; a predicted re-trigger (duration 3)
		// one epoch in must not cut the remaining response short
		assert!(throttle.update(ThrottleTrigger::Emergency, 0.85, 0.9));
		assert!(throttle.update(ThrottleTrigger::Predicted, 0.88, 0.9));
		for _ in 0..3 {
			assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		}
		assert!(!throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert_eq!(throttle.throttled_epochs, 5);
	}

	#[test]
	fn trigger_during_restore_starts_a_new_cycle() {
		let mut throttle = Throttle::new(ThrottleConfig {
			duration: 1,
			throttle_on_restore: true,
			..config()
		})
		.expect("Valid config");

		// Epoch 1 is the Restoring epoch; a fresh prediction there must
		// begin a new throttle cycle, not fall through to idle
		assert!(throttle.update(ThrottleTrigger::Predicted, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::Predicted, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert!(!throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert_eq!(throttle.activations, 2);
	}

	#[test]
	fn emergency_rearms_counter() {
		let mut throttle = Throttle::new(config()).expect("Valid config");

		assert!(throttle.update(ThrottleTrigger::Predicted, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));

		// The droop hit anyway: full emergency response from here
		assert!(throttle.update(ThrottleTrigger::Emergency, 0.85, 0.9));
		for _ in 0..4 {
			assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		}
		assert!(!throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert_eq!(throttle.emergency_activations, 1);
	}

	#[test]
	fn hysteresis_holds_throttle_until_recovery() {
		let mut throttle = Throttle::new(ThrottleConfig {
			duration: 1,
			hysteresis: 0.05,
			..config()
		})
		.expect("Valid config");

		// Duration expires but the voltage sits below the watermark
		assert!(throttle.update(ThrottleTrigger::Predicted, 0.92, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 0.93, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 0.94, 0.9));

		// Watermark (0.95) reached: released
		assert!(throttle.update(ThrottleTrigger::None, 0.96, 0.9));
		assert!(!throttle.update(ThrottleTrigger::None, 1.0, 0.9));
	}

	#[test]
	fn throttle_on_restore_costs_an_extra_epoch() {
		let mut throttle = Throttle::new(ThrottleConfig {
			duration: 1,
			throttle_on_restore: true,
			..config()
		})
		.expect("Valid config");

		assert!(throttle.update(ThrottleTrigger::Predicted, 1.0, 0.9));
		assert!(throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert!(!throttle.update(ThrottleTrigger::None, 1.0, 0.9));
		assert_eq!(throttle.throttled_epochs, 2);
	}
}
