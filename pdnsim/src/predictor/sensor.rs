//! Ideal voltage sensor
//!
//! Purely reactive oracle baseline: fires when the sampled supply voltage
//! is at or below a threshold, optionally after a fixed detection latency.
//! Zero lead time by construction.

// Imports
use super::{Prediction, PredictorInput};

/// Ideal sensor configuration
#[derive(Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct IdealSensorConfig {
	/// Emergency threshold (volts)
	pub threshold: f64,

	/// Detection latency in epochs (0 = fire at the crossing epoch)
	#[serde(default)]
	pub latency: u32,
}

/// Ideal voltage sensor
#[derive(Clone, Debug)]
pub struct IdealSensor {
	/// Configuration
	config: IdealSensorConfig,

	/// Epochs spent below threshold waiting out the latency
	delay_count: u32,
}

impl IdealSensor {
	/// Creates a new sensor
	pub fn new(config: IdealSensorConfig) -> Self {
		Self { config, delay_count: 0 }
	}

	/// Evaluates this epoch
	pub fn observe(&mut self, input: &PredictorInput<'_>) -> Prediction {
		if input.voltage > self.config.threshold {
			self.delay_count = 0;
			return Prediction::QUIET;
		}

		// Below threshold: wait out the sensing latency, then fire
		match self.delay_count >= self.config.latency {
			true => Prediction {
				emergency:  true,
				confidence: None,
			},
			false => {
				self.delay_count += 1;
				Prediction::QUIET
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::events::{EpochSample, EventKind},
	};

	fn input(sample: &EpochSample, voltage: f64, prev_voltage: f64) -> PredictorInput<'_> {
		PredictorInput {
			sample,
			voltage,
			prev_voltage,
			emergency_level: 0.9,
		}
	}

	fn quiet_sample() -> EpochSample {
		EpochSample {
			cycle: 0,
			pc: 0,
			current: 0.0,
			pending_insts: 0,
			stalled: false,
			event_counts: [0; EventKind::COUNT],
		}
	}

	#[test]
	fn fires_at_crossing_epoch_and_not_before() {
		let mut sensor = IdealSensor::new(IdealSensorConfig {
			threshold: 0.95,
			latency:   0,
		});
		let sample = quiet_sample();

		// Voltage trace crossing the threshold downward at the fourth epoch
		let trace = [1.0, 0.99, 0.97, 0.94, 0.92];
		let fired: Vec<bool> = trace
			.iter()
			.enumerate()
			.map(|(idx, &v)| {
				let prev = if idx == 0 { 1.0 } else { trace[idx - 1] };
				sensor.observe(&input(&sample, v, prev)).emergency
			})
			.collect();

		assert_eq!(fired, vec![false, false, false, true, true]);
	}

	#[test]
	fn latency_delays_detection() {
		let mut sensor = IdealSensor::new(IdealSensorConfig {
			threshold: 0.95,
			latency:   2,
		});
		let sample = quiet_sample();

		assert!(!sensor.observe(&input(&sample, 0.90, 1.0)).emergency);
		assert!(!sensor.observe(&input(&sample, 0.90, 0.90)).emergency);
		assert!(sensor.observe(&input(&sample, 0.90, 0.90)).emergency);

		// Recovery resets the latency counter
		assert!(!sensor.observe(&input(&sample, 1.0, 0.90)).emergency);
		assert!(!sensor.observe(&input(&sample, 0.90, 1.0)).emergency);
	}

	#[test]
	fn exact_threshold_counts_as_emergency() {
		let mut sensor = IdealSensor::new(IdealSensorConfig {
			threshold: 0.95,
			latency:   0,
		});
		let sample = quiet_sample();
		assert!(sensor.observe(&input(&sample, 0.95, 1.0)).emergency);
	}
}
