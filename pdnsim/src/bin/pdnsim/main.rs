//! Power-delivery network transient simulator (`pdnsim`)

// Modules
mod args;
mod config;

// Imports
use {
	self::args::Args,
	anyhow::Context,
	clap::Parser,
	pdnsim::{
		analog::{AnalogSource, ExternalPsu, ExternalPsuConfig},
		pdn::Pdn,
		predictor::{Harvard, IdealSensor, Perceptron, StallHeuristic},
		session::{Session, SessionConfig},
		stats::StatsConfig,
		throttle::ThrottleConfig,
		EpochTraceReader,
		Predictor,
		Simulator,
	},
	pdnsim_util::logger,
	std::{fs, time::Duration},
};

fn main() -> Result<(), anyhow::Error> {
	// Get arguments
	let args = Args::parse();
	logger::pre_init::debug(format!("Args: {args:?}"));

	// Initialize logging
	logger::init(args.log_file.as_deref(), args.log_file_append);

	// Read the config file
	let config = {
		let config_file = fs::File::open(&args.config_file).context("Unable to open config file")?;
		serde_json::from_reader::<_, self::config::Config>(config_file).context("Unable to parse config file")?
	};

	// Read the trace file
	let mut trace_file = fs::File::open(&args.trace_file).context("Unable to open trace file")?;
	let mut trace_reader = EpochTraceReader::from_reader(&mut trace_file).context("Unable to parse epoch trace")?;
	tracing::trace!(target: "pdnsim::parse_epoch_trace", ?trace_reader, "Parsed epoch trace");
	if trace_reader.period() != config.period {
		tracing::warn!(
			trace_period = trace_reader.period(),
			config_period = config.period,
			"Trace epoch period differs from the configured period"
		);
	}

	// Build the analog source
	let analog = match &config.external_psu {
		Some(external_psu) => AnalogSource::External(
			ExternalPsu::new(&ExternalPsuConfig {
				program: external_psu.program.clone(),
				args:    external_psu.args.clone(),
				vdc:     config.pdn.vdc,
			})
			.context("Unable to start external analog solver")?,
		),
		None => AnalogSource::Model(Pdn::new(config.pdn).context("Unable to build PDN model")?),
	};

	// Build the predictor
	let predictor = match config.predictor {
		self::config::Predictor::Sensor(sensor) => Predictor::Sensor(IdealSensor::new(sensor)),
		self::config::Predictor::Harvard(harvard) =>
			Predictor::Harvard(Harvard::new(harvard).context("Unable to build harvard predictor")?),
		self::config::Predictor::Perceptron(perceptron) =>
			Predictor::Perceptron(Perceptron::new(perceptron).context("Unable to build perceptron predictor")?),
		self::config::Predictor::Stall(stall) =>
			Predictor::Stall(StallHeuristic::new(stall).context("Unable to build stall predictor")?),
	};

	// Build the session
	let mut session = Session::new(
		SessionConfig {
			emergency:   config.emergency,
			min_current: config.min_current,
			max_current: config.max_current,
		},
		analog,
		predictor,
		ThrottleConfig {
			duration: config.throttle.duration,
			emergency_duration: config.emergency_duration,
			hysteresis: config.throttle.hysteresis,
			throttle_on_restore: config.throttle.throttle_on_restore,
			throttle_scale: config.throttle.throttle_scale,
		},
		StatsConfig {
			lead_time_min: config.lead_time.min,
			lead_time_max: config.lead_time.max,
			hist_min: config.voltage_dist.v_min,
			hist_max: config.voltage_dist.v_max,
			hist_buckets: config.voltage_dist.buckets,
			record_rows: args.csv_file.is_some(),
		},
	)
	.context("Unable to build session")?;

	// Run the simulator
	let mut sim = Simulator::new(config.max_samples, Duration::from_secs_f64(config.debug_output_period_secs));
	let run_output = sim
		.run(&mut trace_reader, &mut session)
		.context("Unable to run simulator")?;
	session.finish().context("Unable to finish session")?;
	tracing::info!(samples = run_output.samples, "Replay finished");

	// Write the outputs
	if let Some(output_path) = &args.output_file {
		let summary = session.summary(run_output.cycle_span.clone());
		let output_file = fs::File::create(output_path).context("Unable to create output file")?;
		serde_json::to_writer_pretty(output_file, &summary).context("Unable to write to output file")?;
	}

	if let Some(csv_path) = &args.csv_file {
		let mut csv_file = fs::File::create(csv_path).context("Unable to create csv output file")?;
		session
			.stats()
			.dump_csv(&mut csv_file)
			.context("Unable to write csv output")?;
	}

	if let Some(model_path) = &args.model_file {
		match session.predictor() {
			Predictor::Perceptron(perceptron) => {
				let model_file = fs::File::create(model_path).context("Unable to create model output file")?;
				serde_json::to_writer(model_file, perceptron.weights()).context("Unable to write model output")?;
			},
			predictor => tracing::warn!(
				kind = predictor.kind_name(),
				"Model output requested, but the predictor has no model to dump"
			),
		}
	}

	Ok(())
}
