//! Simulation session
//!
//! Long-lived object owning the analog source, the predictor, the
//! throttle controller and the statistics aggregator. All mutable run
//! state lives here; the simulator loop just feeds it epochs.

// Imports
use {
	crate::{
		analog::AnalogSource,
		data::Summary,
		events::EpochSample,
		predictor::{Feedback, Predictor, PredictorInput},
		sim::EpochHandler,
		stats::{EpochRow, MitigationStats, StatsConfig},
		throttle::{Throttle, ThrottleConfig, ThrottleTrigger},
	},
	average::{Estimate, Variance},
	std::{fmt, ops::Range},
};

/// Session configuration
#[derive(Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
	/// Emergency voltage level (volts)
	pub emergency: f64,

	/// Lower clamp on the per-epoch current draw (amps)
	pub min_current: f64,

	/// Upper clamp on the per-epoch current draw (amps)
	pub max_current: f64,
}

impl SessionConfig {
	/// Validates this configuration
	pub fn validate(&self) -> Result<(), anyhow::Error> {
		anyhow::ensure!(
			self.emergency > 0.0 && self.emergency.is_finite(),
			"Emergency level must be positive"
		);
		anyhow::ensure!(
			self.min_current <= self.max_current,
			"Current clamp is inverted ({} > {})",
			self.min_current,
			self.max_current
		);
		Ok(())
	}
}

/// Simulation session
pub struct Session {
	/// Configuration
	config: SessionConfig,

	/// Analog supply source
	analog: AnalogSource,

	/// Emergency predictor
	predictor: Predictor,

	/// Throttle controller
	throttle: Throttle,

	/// Statistics aggregator
	stats: MitigationStats,

	/// Supply voltage one epoch ago
	last_voltage: f64,

	/// Whether the previous epoch left the core throttled
	throttled: bool,

	/// Running voltage aggregate for debug output
	voltage_agg: Variance,
}

impl Session {
	/// Creates a new session.
	///
	/// # Errors
	/// Returns an error if any configuration is invalid.
	pub fn new(
		config: SessionConfig,
		analog: AnalogSource,
		predictor: Predictor,
		throttle_config: ThrottleConfig,
		stats_config: StatsConfig,
	) -> Result<Self, anyhow::Error> {
		config.validate()?;

		let last_voltage = analog.vdc();
		Ok(Self {
			config,
			analog,
			predictor,
			throttle: Throttle::new(throttle_config)?,
			stats: MitigationStats::new(stats_config)?,
			last_voltage,
			throttled: false,
			voltage_agg: Variance::new(),
		})
	}

	/// Advances the session by one epoch
	pub fn step(&mut self, sample: &EpochSample) -> Result<(), anyhow::Error> {
		// Clamp the reported draw, then apply the previous epoch's
		// throttle decision to it
		let mut current = sample.current.clamp(self.config.min_current, self.config.max_current);
		if self.throttled {
			current *= self.throttle.scale();
		}

		let voltage = self.analog.step(current)?;
		self.voltage_agg.add(voltage);

		// Ground truth is the downward crossing, not the level itself
		let actual = voltage < self.config.emergency && self.last_voltage >= self.config.emergency;
		if actual {
			tracing::debug!(cycle = sample.cycle, voltage, "Voltage emergency");
		}

		let prediction = self.predictor.observe(&PredictorInput {
			sample,
			voltage,
			prev_voltage: self.last_voltage,
			emergency_level: self.config.emergency,
		});

		let trigger = match (actual, prediction.emergency) {
			(true, _) => ThrottleTrigger::Emergency,
			(false, true) => ThrottleTrigger::Predicted,
			(false, false) => ThrottleTrigger::None,
		};
		self.throttled = self.throttle.update(trigger, voltage, self.config.emergency);

		self.predictor.train(&Feedback {
			actual_emergency: actual,
			predicted:        prediction.emergency,
		});

		self.stats.record(EpochRow {
			cycle: sample.cycle,
			voltage,
			current,
			predicted: prediction.emergency,
			actual,
			throttled: self.throttled,
		});

		self.last_voltage = voltage;
		Ok(())
	}

	/// Finishes the session: flushes the lead-time window and shuts the
	/// analog source down.
	pub fn finish(&mut self) -> Result<(), anyhow::Error> {
		self.stats.finish();
		self.analog.shutdown()
	}

	/// Builds the run summary
	pub fn summary(&self, cycle_span: Option<Range<u64>>) -> Summary {
		let stats_config = self.stats.config();
		Summary::new(
			self.predictor.kind_name(),
			cycle_span,
			&self.stats,
			&self.throttle,
			stats_config.hist_min,
			stats_config.hist_max,
		)
	}

	/// Returns the predictor
	pub fn predictor(&self) -> &Predictor {
		&self.predictor
	}

	/// Returns the statistics aggregator
	pub fn stats(&self) -> &MitigationStats {
		&self.stats
	}

	/// Returns the throttle controller
	pub fn throttle(&self) -> &Throttle {
		&self.throttle
	}

	/// Returns the supply voltage after the last epoch
	pub fn voltage(&self) -> f64 {
		self.last_voltage
	}
}

impl EpochHandler for Session {
	fn handle_epoch(&mut self, sample: &EpochSample) -> Result<(), anyhow::Error> {
		self.step(sample)
	}

	fn fmt_debug(&mut self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
		write!(
			f,
			"v: {:.4} (μ {:.4} σ {:.4}, min {:.4}), emergencies: {}, predictions: {}, throttled: {}/{}",
			self.last_voltage,
			self.voltage_agg.mean(),
			self.voltage_agg.sample_variance().sqrt(),
			self.stats.min_voltage,
			self.stats.emergencies,
			self.stats.predictions,
			self.throttle.throttled_epochs,
			self.stats.epochs,
		)
	}
}
