//! Epoch trace parsing.
//!
//! Binary format carrying one record per simulation epoch: current draw,
//! anchor pc and architectural event counters.

// Imports
use {
	crate::events::{EpochSample, EventKind},
	anyhow::Context,
	byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt},
	pdnsim_util::ReadByteArray,
	std::io,
};

/// Epoch trace reader
#[derive(Clone, Debug)]
pub struct EpochTraceReader<R> {
	/// Header
	header: Header,

	/// Records remaining
	records_remaining: u64,

	/// Reader
	reader: R,
}

impl<R: io::Read + io::Seek> EpochTraceReader<R> {
	/// Parses an epoch trace from a reader
	pub fn from_reader(mut reader: R) -> Result<Self, anyhow::Error> {
		// Read the magic
		let magic = reader.read_byte_array().context("Unable to read magic")?;
		anyhow::ensure!(magic == MAGIC, "Found wrong magic {magic:?}, expected {MAGIC:?}",);

		// Read the header
		let header = Header::from_reader(&mut reader).context("Unable to read header")?;
		tracing::trace!(?header, "Parsed header");

		// Get the total number of records from the stream length, warning
		// if the header disagrees.
		let total_records = {
			let magic_size = MAGIC.len() as u64;
			let header_size = Header::BYTE_SIZE as u64;
			let record_size = Record::BYTE_SIZE as u64;

			let cur_pos = reader.stream_position().context("Unable to get stream position")?;
			let total_actual_size = reader
				.seek(io::SeekFrom::End(0))
				.context("Unable to seek to stream end")?;
			let _ = reader
				.seek(io::SeekFrom::Start(cur_pos))
				.context("Unable to seek back to records")?;

			let total_expected_size = magic_size + header_size + header.records * record_size;
			if total_actual_size != total_expected_size {
				tracing::warn!(
					"Epoch trace size differs from expected. Found {total_actual_size}, expected {total_expected_size}"
				);
			}

			(total_actual_size - magic_size - header_size) / record_size
		};

		Ok(Self {
			header,
			records_remaining: total_records,
			reader,
		})
	}

	/// Reads the next record
	pub fn read_next(&mut self) -> Result<Option<Record>, anyhow::Error> {
		// If we're done, return `None`
		if self.records_remaining == 0 {
			return Ok(None);
		}

		// Else parse the next record and reduce the remaining records
		let record = Record::from_reader(&mut self.reader).context("Unable to read record")?;
		self.records_remaining -= 1;

		Ok(Some(record))
	}

	/// Returns the remaining records
	pub fn records_remaining(&self) -> u64 {
		self.records_remaining
	}

	/// Returns the epoch period (cycles per epoch) declared by the trace
	pub fn period(&self) -> u64 {
		self.header.period
	}
}

/// Epoch trace writer
#[derive(Debug)]
pub struct EpochTraceWriter<W> {
	/// Cycles per epoch
	period: u64,

	/// Records written
	records_written: u64,

	/// Writer
	writer: W,
}

impl<W: io::Write + io::Seek> EpochTraceWriter<W> {
	/// Creates a new writer
	pub fn new(mut writer: W, period: u64) -> Result<Self, anyhow::Error> {
		// Write the magic
		// Note: We rewind to ensure we write at the start, because we then
		//       later come back to write the header
		writer.rewind().context("Unable to rewind to start")?;
		writer.write_all(&MAGIC).context("Unable to write magic")?;

		// Skip over the header
		let _ = writer
			.seek(io::SeekFrom::Current(Header::BYTE_SIZE as i64))
			.context("Unable to seek past header")?;

		Ok(Self {
			period,
			records_written: 0,
			writer,
		})
	}

	/// Writes a record
	pub fn write(&mut self, record: &Record) -> Result<(), anyhow::Error> {
		record.to_writer(&mut self.writer).context("Unable to write record")?;

		self.records_written += 1;
		Ok(())
	}

	/// Finishes writing, patching the header with the record count
	pub fn finish(mut self) -> Result<W, anyhow::Error> {
		// Rewind the writer and write the header
		let _ = self
			.writer
			.seek(io::SeekFrom::Start(MAGIC.len() as u64))
			.context("Unable to seek to header")?;

		let header = Header {
			records: self.records_written,
			period:  self.period,
		};
		header.to_writer(&mut self.writer).context("Unable to write header")?;

		Ok(self.writer)
	}
}

/// Magic
pub const MAGIC: [u8; 8] = *b"PDNT v0\0";

/// Header
#[derive(Clone, Copy, Debug)]
pub struct Header {
	/// Total records
	records: u64,

	/// Cycles per epoch
	period: u64,
}

impl Header {
	/// Returns the size of this header (including any padding)
	pub const BYTE_SIZE: usize = 0x18;

	/// Parses a header from a reader
	pub fn from_reader<R: io::Read + io::Seek>(reader: &mut R) -> Result<Self, anyhow::Error> {
		let records = reader.read_u64::<LittleEndian>().context("Unable to read records")?;
		let period = reader.read_u64::<LittleEndian>().context("Unable to read period")?;

		// Then seek over the padding
		let _ = reader
			.seek(io::SeekFrom::Current(8))
			.context("Unable to seek over padding")?;

		Ok(Self { records, period })
	}

	/// Writes a header to a writer
	pub fn to_writer<W: io::Write + io::Seek>(&self, writer: &mut W) -> Result<(), anyhow::Error> {
		writer
			.write_u64::<LittleEndian>(self.records)
			.context("Unable to write records")?;
		writer
			.write_u64::<LittleEndian>(self.period)
			.context("Unable to write period")?;

		writer.write_all(&[0; 8]).context("Unable to write padding")?;

		Ok(())
	}
}

/// Record flag bit for a stalled epoch
const FLAG_STALLED: u32 = 1;

/// Record
pub type Record = EpochSample;

impl Record {
	/// Returns the size of this record
	pub const BYTE_SIZE: usize = 0x48;

	/// Parses a record from a reader
	pub fn from_reader<R: io::Read>(reader: &mut R) -> Result<Self, anyhow::Error> {
		let cycle = reader.read_u64::<LittleEndian>().context("Unable to read cycle")?;
		let pc = reader.read_u64::<LittleEndian>().context("Unable to read pc")?;
		let current = reader.read_f64::<LittleEndian>().context("Unable to read current")?;
		let pending_insts = reader
			.read_u32::<LittleEndian>()
			.context("Unable to read pending instructions")?;
		let flags = reader.read_u32::<LittleEndian>().context("Unable to read flags")?;

		let mut event_counts = [0u32; EventKind::COUNT];
		for (idx, count) in event_counts.iter_mut().enumerate() {
			*count = reader
				.read_u32::<LittleEndian>()
				.with_context(|| format!("Unable to read event counter {idx}"))?;
		}

		Ok(Self {
			cycle,
			pc,
			current,
			pending_insts,
			stalled: flags & FLAG_STALLED != 0,
			event_counts,
		})
	}

	/// Writes a record to a writer
	pub fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<(), anyhow::Error> {
		writer
			.write_u64::<LittleEndian>(self.cycle)
			.context("Unable to write cycle")?;
		writer.write_u64::<LittleEndian>(self.pc).context("Unable to write pc")?;
		writer
			.write_f64::<LittleEndian>(self.current)
			.context("Unable to write current")?;
		writer
			.write_u32::<LittleEndian>(self.pending_insts)
			.context("Unable to write pending instructions")?;

		let flags = if self.stalled { FLAG_STALLED } else { 0 };
		writer
			.write_u32::<LittleEndian>(flags)
			.context("Unable to write flags")?;

		for (idx, count) in self.event_counts.iter().enumerate() {
			writer
				.write_u32::<LittleEndian>(*count)
				.with_context(|| format!("Unable to write event counter {idx}"))?;
		}

		Ok(())
	}
}
