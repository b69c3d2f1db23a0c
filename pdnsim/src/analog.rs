//! Analog supply source
//!
//! Where the per-epoch supply voltage comes from: either the built-in
//! discretized PDN model, or an external analog solver driven over a
//! line protocol on its stdin/stdout.

// Imports
use {
	crate::pdn::Pdn,
	anyhow::Context,
	std::{
		io::{BufRead, BufReader, Write},
		path::PathBuf,
		process,
	},
};

/// External solver configuration
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ExternalPsuConfig {
	/// Solver executable
	pub program: PathBuf,

	/// Solver arguments
	#[serde(default)]
	pub args: Vec<String>,

	/// Supply setpoint (volts)
	pub vdc: f64,
}

/// Handle to an external analog solver process.
///
/// Protocol: one request line `set <setpoint> <load> <terminate>` per
/// epoch, answered by one `<voltage> <current>` line. Requests block
/// until answered; the solver closing its stdout is fatal.
#[derive(Debug)]
pub struct ExternalPsu {
	/// Supply setpoint
	vdc: f64,

	/// Solver process
	child: process::Child,

	/// Solver stdin
	stdin: process::ChildStdin,

	/// Solver stdout, buffered
	stdout: BufReader<process::ChildStdout>,
}

impl ExternalPsu {
	/// Spawns the solver process
	pub fn new(config: &ExternalPsuConfig) -> Result<Self, anyhow::Error> {
		anyhow::ensure!(config.vdc > 0.0 && config.vdc.is_finite(), "Supply setpoint must be positive");

		let mut child = process::Command::new(&config.program)
			.args(&config.args)
			.stdin(process::Stdio::piped())
			.stdout(process::Stdio::piped())
			.spawn()
			.with_context(|| format!("Unable to spawn analog solver {:?}", config.program))?;

		let stdin = child.stdin.take().context("Solver stdin unavailable")?;
		let stdout = child.stdout.take().context("Solver stdout unavailable")?;

		tracing::debug!(program = ?config.program, "Spawned analog solver");
		Ok(Self {
			vdc: config.vdc,
			child,
			stdin,
			stdout: BufReader::new(stdout),
		})
	}

	/// Runs one exchange with the solver
	fn request(&mut self, setpoint: f64, load: f64, terminate: bool) -> Result<(f64, f64), anyhow::Error> {
		writeln!(self.stdin, "set {setpoint} {load} {}", u8::from(terminate)).context("Unable to write to analog solver")?;
		self.stdin.flush().context("Unable to flush analog solver stdin")?;

		let mut line = String::new();
		let read = self
			.stdout
			.read_line(&mut line)
			.context("Unable to read from analog solver")?;
		anyhow::ensure!(read != 0, "Analog solver closed its stdout");

		let mut fields = line.split_whitespace();
		let voltage = fields
			.next()
			.context("Analog solver reply missing voltage")?
			.parse::<f64>()
			.context("Unable to parse analog solver voltage")?;
		let current = fields
			.next()
			.context("Analog solver reply missing current")?
			.parse::<f64>()
			.context("Unable to parse analog solver current")?;

		Ok((voltage, current))
	}

	/// Advances the solver one epoch under `load` amps
	pub fn step(&mut self, load: f64) -> Result<f64, anyhow::Error> {
		let (voltage, _) = self.request(self.vdc, load, false)?;
		Ok(voltage)
	}

	/// Tells the solver to shut down and reaps it
	pub fn shutdown(&mut self) -> Result<(), anyhow::Error> {
		// The terminate flag may race the solver exiting on its own
		let _ = self.request(self.vdc, 0.0, true);
		let status = self.child.wait().context("Unable to reap analog solver")?;
		anyhow::ensure!(status.success(), "Analog solver exited with {status}");
		Ok(())
	}
}

impl Drop for ExternalPsu {
	fn drop(&mut self) {
		let _ = self.child.kill();
		let _ = self.child.wait();
	}
}

/// Analog supply source
#[derive(Debug)]
pub enum AnalogSource {
	/// Built-in discretized PDN model
	Model(Pdn),

	/// External analog solver process
	External(ExternalPsu),
}

impl AnalogSource {
	/// Returns the supply setpoint
	pub fn vdc(&self) -> f64 {
		match self {
			Self::Model(pdn) => pdn.params().vdc,
			Self::External(psu) => psu.vdc,
		}
	}

	/// Advances the supply one epoch under `load` amps, returning the
	/// new supply voltage
	pub fn step(&mut self, load: f64) -> Result<f64, anyhow::Error> {
		match self {
			Self::Model(pdn) => Ok(pdn.step(load)),
			Self::External(psu) => psu.step(load),
		}
	}

	/// Shuts the source down cleanly
	pub fn shutdown(&mut self) -> Result<(), anyhow::Error> {
		match self {
			Self::Model(_) => Ok(()),
			Self::External(psu) => psu.shutdown(),
		}
	}
}
