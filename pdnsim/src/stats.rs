//! Mitigation statistics
//!
//! Classifies every prediction against the emergencies that actually
//! materialize. A prediction is a true positive only if an emergency
//! fires within the configured lead-time band after it; each emergency
//! consumes at most one prediction, and predictions that age out of the
//! band unconsumed become false positives.

// Imports
use {
	serde::{Deserialize, Serialize},
	std::collections::VecDeque,
};

/// Statistics configuration
#[derive(Clone, Copy, Debug)]
#[derive(Serialize, Deserialize)]
pub struct StatsConfig {
	/// Minimum epochs between a prediction and its emergency
	#[serde(default)]
	pub lead_time_min: usize,

	/// Maximum epochs between a prediction and its emergency
	pub lead_time_max: usize,

	/// Voltage histogram lower bound
	pub hist_min: f64,

	/// Voltage histogram upper bound
	pub hist_max: f64,

	/// Voltage histogram bucket count
	pub hist_buckets: usize,

	/// Whether to retain the per-epoch rows for the csv dump
	#[serde(default)]
	pub record_rows: bool,
}

impl StatsConfig {
	/// Validates this configuration
	pub fn validate(&self) -> Result<(), anyhow::Error> {
		anyhow::ensure!(
			self.lead_time_min <= self.lead_time_max,
			"Lead-time band is inverted ({} > {})",
			self.lead_time_min,
			self.lead_time_max
		);
		anyhow::ensure!(self.hist_buckets > 0, "Histogram must have at least one bucket");
		anyhow::ensure!(
			self.hist_min < self.hist_max,
			"Histogram bounds are inverted ({} >= {})",
			self.hist_min,
			self.hist_max
		);
		Ok(())
	}
}

/// One epoch's prediction, pending classification
#[derive(Clone, Copy, Debug)]
struct PredictionMark {
	/// Whether the predictor fired this epoch
	predicted: bool,

	/// Whether an emergency has already consumed this prediction
	matched: bool,
}

/// Per-epoch row retained for the csv dump
#[derive(Clone, Copy, Debug)]
pub struct EpochRow {
	/// Epoch cycle
	pub cycle: u64,

	/// Supply voltage
	pub voltage: f64,

	/// Core current draw
	pub current: f64,

	/// Predictor fired
	pub predicted: bool,

	/// Ground-truth emergency
	pub actual: bool,

	/// Core was throttled
	pub throttled: bool,
}

/// Mitigation statistics aggregator
#[derive(Clone, Debug)]
pub struct MitigationStats {
	/// Configuration
	config: StatsConfig,

	/// Recent predictions, newest first
	window: VecDeque<PredictionMark>,

	/// True positives
	pub true_positives: u64,

	/// False positives
	pub false_positives: u64,

	/// False negatives
	pub false_negatives: u64,

	/// True negatives
	pub true_negatives: u64,

	/// Total predictions
	pub predictions: u64,

	/// Total ground-truth emergencies
	pub emergencies: u64,

	/// Total epochs recorded
	pub epochs: u64,

	/// Minimum voltage observed
	pub min_voltage: f64,

	/// Maximum voltage observed
	pub max_voltage: f64,

	/// Voltage histogram buckets
	histogram: Vec<u64>,

	/// True-positive lead times, indexed by epochs of warning
	lead_histogram: Vec<u64>,

	/// Per-epoch rows, when enabled
	rows: Vec<EpochRow>,
}

impl MitigationStats {
	/// Creates an empty aggregator.
	///
	/// # Errors
	/// Returns an error if the configuration is invalid.
	pub fn new(config: StatsConfig) -> Result<Self, anyhow::Error> {
		config.validate()?;
		Ok(Self {
			window: VecDeque::with_capacity(config.lead_time_max + 1),
			true_positives: 0,
			false_positives: 0,
			false_negatives: 0,
			true_negatives: 0,
			predictions: 0,
			emergencies: 0,
			epochs: 0,
			min_voltage: f64::INFINITY,
			max_voltage: f64::NEG_INFINITY,
			histogram: vec![0; config.hist_buckets],
			lead_histogram: vec![0; config.lead_time_max + 1],
			rows: vec![],
			config,
		})
	}

	/// Records one epoch
	pub fn record(&mut self, row: EpochRow) {
		self.epochs += 1;
		self.min_voltage = self.min_voltage.min(row.voltage);
		self.max_voltage = self.max_voltage.max(row.voltage);
		*self.bucket_mut(row.voltage) += 1;

		if row.predicted {
			self.predictions += 1;
		}

		self.window.push_front(PredictionMark {
			predicted: row.predicted,
			matched:   false,
		});

		// Oldest mark leaves the lead-time band
		if self.window.len() > self.config.lead_time_max + 1 {
			if let Some(expired) = self.window.pop_back() {
				if expired.predicted && !expired.matched {
					self.false_positives += 1;
				}
			}
		}

		if row.actual {
			self.emergencies += 1;
			self.classify_emergency();
		} else if !row.predicted {
			self.true_negatives += 1;
		}

		if self.config.record_rows {
			self.rows.push(row);
		}
	}

	/// Matches an emergency against the lead-time band, consuming the
	/// oldest eligible prediction
	fn classify_emergency(&mut self) {
		let band = self.config.lead_time_min..=self.config.lead_time_max;
		let hit = self
			.window
			.iter_mut()
			.enumerate()
			.filter(|(lead, _)| band.contains(lead))
			.rev()
			.find(|(_, mark)| mark.predicted && !mark.matched);

		match hit {
			Some((lead, mark)) => {
				mark.matched = true;
				self.true_positives += 1;
				self.lead_histogram[lead] += 1;
			},
			None => self.false_negatives += 1,
		}
	}

	/// Flushes the remaining window, classifying still-unmatched
	/// predictions as false positives. Call once, at end of input.
	pub fn finish(&mut self) {
		for mark in self.window.drain(..) {
			if mark.predicted && !mark.matched {
				self.false_positives += 1;
			}
		}
	}

	/// Resets all counters and the window
	pub fn reset(&mut self) {
		self.window.clear();
		self.true_positives = 0;
		self.false_positives = 0;
		self.false_negatives = 0;
		self.true_negatives = 0;
		self.predictions = 0;
		self.emergencies = 0;
		self.epochs = 0;
		self.min_voltage = f64::INFINITY;
		self.max_voltage = f64::NEG_INFINITY;
		self.histogram.fill(0);
		self.lead_histogram.fill(0);
		self.rows.clear();
	}

	/// Returns the configuration
	pub fn config(&self) -> &StatsConfig {
		&self.config
	}

	/// Returns the histogram bucket for a voltage
	fn bucket_mut(&mut self, voltage: f64) -> &mut u64 {
		let span = self.config.hist_max - self.config.hist_min;
		let frac = (voltage - self.config.hist_min) / span;
		let idx = ((frac * self.config.hist_buckets as f64) as usize).min(self.config.hist_buckets - 1);
		let idx = if frac < 0.0 { 0 } else { idx };
		&mut self.histogram[idx]
	}

	/// Returns the voltage histogram buckets
	pub fn histogram(&self) -> &[u64] {
		&self.histogram
	}

	/// Returns the true-positive lead-time histogram, indexed by epochs
	/// of warning
	pub fn lead_histogram(&self) -> &[u64] {
		&self.lead_histogram
	}

	/// Returns the retained per-epoch rows
	pub fn rows(&self) -> &[EpochRow] {
		&self.rows
	}

	/// Precision over classified predictions
	pub fn precision(&self) -> f64 {
		match self.true_positives + self.false_positives {
			0 => 0.0,
			total => self.true_positives as f64 / total as f64,
		}
	}

	/// Recall over ground-truth emergencies
	pub fn recall(&self) -> f64 {
		match self.true_positives + self.false_negatives {
			0 => 0.0,
			total => self.true_positives as f64 / total as f64,
		}
	}

	/// Writes the per-epoch rows as csv
	pub fn dump_csv(&self, writer: &mut impl std::io::Write) -> Result<(), anyhow::Error> {
		writeln!(writer, "epoch,cycle,voltage,current,predicted,actual,throttled")?;
		for (epoch, row) in self.rows.iter().enumerate() {
			writeln!(
				writer,
				"{epoch},{},{},{},{},{},{}",
				row.cycle,
				row.voltage,
				row.current,
				u8::from(row.predicted),
				u8::from(row.actual),
				u8::from(row.throttled),
			)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config() -> StatsConfig {
		StatsConfig {
			lead_time_min: 1,
			lead_time_max: 3,
			hist_min: 0.8,
			hist_max: 1.1,
			hist_buckets: 30,
			record_rows: false,
		}
	}

	fn row(predicted: bool, actual: bool) -> EpochRow {
		EpochRow {
			cycle: 0,
			voltage: 1.0,
			current: 1.0,
			predicted,
			actual,
			throttled: false,
		}
	}

	#[test]
	fn prediction_within_band_is_true_positive() {
		let mut stats = MitigationStats::new(config()).expect("Valid config");

		stats.record(row(true, false));
		stats.record(row(false, false));
		stats.record(row(false, true));
		stats.finish();

		assert_eq!(stats.true_positives, 1);
		assert_eq!(stats.false_positives, 0);
		assert_eq!(stats.false_negatives, 0);
		assert_eq!(stats.lead_histogram(), [0, 0, 1, 0]);
	}

	#[test]
	fn same_epoch_prediction_is_outside_band() {
		// lead_time_min = 1: a prediction in the emergency epoch itself
		// gave no usable warning
		let mut stats = MitigationStats::new(config()).expect("Valid config");

		stats.record(row(true, true));
		stats.finish();

		assert_eq!(stats.true_positives, 0);
		assert_eq!(stats.false_negatives, 1);
		assert_eq!(stats.false_positives, 1);
	}

	#[test]
	fn unmatched_prediction_ages_out_as_false_positive() {
		let mut stats = MitigationStats::new(config()).expect("Valid config");

		stats.record(row(true, false));
		for _ in 0..4 {
			stats.record(row(false, false));
		}

		assert_eq!(stats.false_positives, 1);
		assert_eq!(stats.true_negatives, 4);
	}

	#[test]
	fn each_emergency_consumes_one_prediction() {
		let mut stats = MitigationStats::new(config()).expect("Valid config");

		stats.record(row(true, false));
		stats.record(row(false, true));
		stats.record(row(false, true));
		stats.finish();

		// One prediction cannot cover two emergencies
		assert_eq!(stats.true_positives, 1);
		assert_eq!(stats.false_negatives, 1);
	}

	#[test]
	fn oldest_eligible_prediction_matches_first() {
		let mut stats = MitigationStats::new(config()).expect("Valid config");

		stats.record(row(true, false));
		stats.record(row(true, false));
		stats.record(row(false, true));
		stats.finish();

		// The older prediction is consumed; the newer one still ages out
		assert_eq!(stats.true_positives, 1);
		assert_eq!(stats.false_positives, 1);
	}

	#[test]
	fn histogram_clamps_out_of_range_voltages() {
		let mut stats = MitigationStats::new(config()).expect("Valid config");

		let mut low = row(false, false);
		low.voltage = 0.5;
		let mut high = row(false, false);
		high.voltage = 2.0;
		stats.record(low);
		stats.record(high);

		assert_eq!(stats.histogram()[0], 1);
		assert_eq!(stats.histogram()[29], 1);
		assert_eq!(stats.min_voltage, 0.5);
		assert_eq!(stats.max_voltage, 2.0);
	}

	#[test]
	fn reset_clears_everything() {
		let mut stats = MitigationStats::new(config()).expect("Valid config");
		stats.record(row(true, false));
		stats.reset();

		assert_eq!(stats.epochs, 0);
		assert_eq!(stats.predictions, 0);
		assert!(stats.histogram().iter().all(|&count| count == 0));
	}
}
