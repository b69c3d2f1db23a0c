//! Simulator
//!
//! Drives an epoch trace through an [`EpochHandler`], with an optional
//! sample cutoff and periodic debug output.

// Imports
use {
	crate::epoch_trace::EpochTraceReader,
	anyhow::Context,
	std::{
		fmt,
		io,
		ops::Range,
		time::{Duration, Instant},
	},
};

/// Simulator
#[derive(Debug)]
pub struct Simulator {
	/// Maximum samples to replay.
	///
	/// `None` replays the whole trace.
	max_samples: Option<u64>,

	/// Debug output period
	///
	/// Interval in which to output debug output for the handler
	debug_output_period: Duration,
}

impl Simulator {
	/// Creates a new simulator
	pub fn new(max_samples: Option<u64>, debug_output_period: Duration) -> Self {
		Self {
			max_samples,
			debug_output_period,
		}
	}

	/// Runs the simulator on all records from `trace_reader` with handler `handler`
	pub fn run<H: EpochHandler>(
		&mut self,
		trace_reader: &mut EpochTraceReader<impl io::Read + io::Seek>,
		handler: &mut H,
	) -> Result<RunOutput, anyhow::Error> {
		// Note: We start in the past so that we output right away at the start
		let mut last_debug_time = Instant::now() - self.debug_output_period;

		// Create the record iterator
		let total_records = match self.max_samples {
			Some(max_samples) => u64::min(max_samples, trace_reader.records_remaining()),
			None => trace_reader.records_remaining(),
		};
		let record_it = std::iter::from_fn(|| trace_reader.read_next().transpose());

		// Go through all records
		let mut first_cycle = None;
		let mut last_cycle = None;
		let mut samples = 0_u64;
		for (record_idx, record_res) in record_it.enumerate() {
			if let Some(max_samples) = self.max_samples {
				if samples >= max_samples {
					tracing::debug!(max_samples, "Reached sample cutoff");
					break;
				}
			}

			let record = record_res.context("Unable to read next record")?;
			samples += 1;

			first_cycle.get_or_insert(record.cycle);
			last_cycle = Some(record.cycle);

			// Handle each epoch
			handler
				.handle_epoch(&record)
				.context("Unable to handle epoch with handler")?;

			// Then show debug output, if it's been long enough
			let cur_time = Instant::now();
			if cur_time.duration_since(last_debug_time) >= self.debug_output_period {
				let records_processed_percentage = 100.0 * (record_idx as f64 / total_records as f64);
				tracing::info!(
					"[{records_processed_percentage:.2}%] Debug: {}",
					pdnsim_util::DisplayWrapper::new(|f| handler.fmt_debug(f))
				);
				last_debug_time = cur_time;
			}
		}

		Ok(RunOutput {
			cycle_span: first_cycle
				.zip(last_cycle)
				.map(|(first, last)| first..(last + trace_reader.period())),
			samples,
		})
	}
}

/// Output for [`Simulator::run`]
#[derive(Clone, Debug)]
pub struct RunOutput {
	/// Cycle span covered by the replayed records
	pub cycle_span: Option<Range<u64>>,

	/// Records replayed
	pub samples: u64,
}

/// Epoch handler
pub trait EpochHandler {
	/// Handles an epoch sample
	fn handle_epoch(&mut self, sample: &crate::events::EpochSample) -> Result<(), anyhow::Error>;

	/// Formats debug output to `f`.
	fn fmt_debug(&mut self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error>;
}
