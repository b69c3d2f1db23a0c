//! Parses per-epoch mcpat power output from stdin,
//! converting it to an epoch trace.
//!
//! Input is one csv row per epoch:
//! `cycle,power,pc,pending,stalled,ev0,...,ev9`,
//! with `pc` in hex and missing trailing event counters taken as 0.

// Imports
use {
	anyhow::Context,
	pdnsim::{
		epoch_trace::Record,
		events::EventKind,
		EpochTraceWriter,
	},
	std::{
		fs,
		io::{BufRead, BufWriter},
	},
};

fn main() -> Result<(), anyhow::Error> {
	// Nominal supply voltage used to convert power to current draw
	// TODO: Allow customizing this and the output trace file.
	let vdc = match std::env::args().nth(1) {
		Some(arg) => arg.parse::<f64>().context("Unable to parse vdc argument")?,
		None => 1.0,
	};
	anyhow::ensure!(vdc > 0.0 && vdc.is_finite(), "vdc must be positive");

	// Start reading the output
	let mut records = Vec::new();
	let mut stdin = std::io::stdin().lock();
	let mut line = String::new();
	while let Ok(1..) = {
		line.clear();
		stdin.read_line(&mut line)
	} {
		// Pop the newline, if any (the final line may lack one)
		if line.ends_with('\n') {
			line.pop();
		}
		if line.ends_with('\r') {
			line.pop();
		}
		if line.is_empty() || line.starts_with('#') {
			continue;
		}

		let mut fields = line.split(',').map(str::trim);
		let cycle = fields
			.next()
			.context("Missing cycle field")?
			.parse::<u64>()
			.context("Unable to parse cycle")?;
		let power = fields
			.next()
			.context("Missing power field")?
			.parse::<f64>()
			.context("Unable to parse power")?;
		let pc = match fields.next() {
			Some(pc) => u64::from_str_radix(pc, 16).context("Unable to parse pc")?,
			None => 0,
		};
		let pending_insts = match fields.next() {
			Some(pending) => pending.parse::<u32>().context("Unable to parse pending instructions")?,
			None => 0,
		};
		let stalled = match fields.next() {
			Some(stalled) => stalled.parse::<u8>().context("Unable to parse stalled flag")? != 0,
			None => false,
		};

		// Missing trailing counters are taken as 0
		let mut event_counts = [0u32; EventKind::COUNT];
		for count in &mut event_counts {
			match fields.next() {
				Some(field) => *count = field.parse::<u32>().context("Unable to parse event counter")?,
				None => break,
			}
		}

		records.push(Record {
			cycle,
			pc,
			current: power / vdc,
			pending_insts,
			stalled,
			event_counts,
		});
	}

	// Derive the epoch period from the first two cycle stamps
	let period = match records.as_slice() {
		[first, second, ..] => second.cycle.saturating_sub(first.cycle).max(1),
		_ => 1,
	};

	// Then write all records out
	let file = fs::File::create("output.trace").context("Unable to create output file")?;
	let file = BufWriter::new(file);
	let mut trace_writer = EpochTraceWriter::new(file, period).context("Unable to create epoch trace writer")?;
	for record in &records {
		trace_writer.write(record).context("Unable to write record")?;
	}

	// Finally finish writing the epoch trace
	trace_writer.finish().context("Unable to finish writing epoch trace")?;

	Ok(())
}
