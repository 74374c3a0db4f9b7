//! Measurement data model and accumulator sinks.
//!
//! A collector pushes each decoded response into an [`Accumulator`] as a
//! `(measurement, fields, tags)` triple. Two sinks are provided:
//! [`MemoryAccumulator`] keeps records in memory and [`LineProtocolWriter`]
//! renders them as InfluxDB line protocol.

use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::{DateTime, Utc};

/// Decoded metric name to integer value mapping for one response.
pub type FieldSet = BTreeMap<String, i64>;

/// Tag name to tag value mapping attached to a measurement.
pub type Tags = BTreeMap<String, String>;

/// One measurement handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRecord {
    pub measurement: String,
    pub fields: FieldSet,
    pub tags: Tags,
    pub timestamp: DateTime<Utc>,
}

impl MeasurementRecord {
    /// Creates a record stamped with the current time.
    pub fn new(measurement: impl Into<String>, fields: FieldSet, tags: Tags) -> Self {
        Self {
            measurement: measurement.into(),
            fields,
            tags,
            timestamp: Utc::now(),
        }
    }

    /// Returns the value of a tag, if present.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

/// Outbound sink for measurements.
pub trait Accumulator {
    /// Pushes one named measurement set with its tags.
    fn add_fields(&mut self, measurement: &str, fields: FieldSet, tags: Tags);
}

/// Accumulator that retains every record in memory.
#[derive(Debug, Default)]
pub struct MemoryAccumulator {
    records: Vec<MeasurementRecord>,
}

impl MemoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records accumulated so far, in emission order.
    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Removes and returns all accumulated records.
    pub fn drain(&mut self) -> Vec<MeasurementRecord> {
        std::mem::take(&mut self.records)
    }
}

impl Accumulator for MemoryAccumulator {
    fn add_fields(&mut self, measurement: &str, fields: FieldSet, tags: Tags) {
        self.records.push(MeasurementRecord::new(measurement, fields, tags));
    }
}

/// Accumulator that writes records as InfluxDB line protocol.
///
/// Each record becomes one line:
/// `measurement,tag=value field=1i,other=2i 1700000000000000000`.
/// Records without fields cannot be expressed in line protocol and are skipped.
///
/// The [`Accumulator`] interface is infallible, so the first write error is
/// kept and subsequent records are dropped until [`take_error`](Self::take_error)
/// is called.
pub struct LineProtocolWriter<W: Write> {
    out: W,
    written: u64,
    skipped: u64,
    error: Option<io::Error>,
}

impl<W: Write> LineProtocolWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
            skipped: 0,
            error: None,
        }
    }

    /// Number of lines written successfully.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Number of records skipped because they carried no fields.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Returns and clears the pending write error, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_record(&mut self, record: &MeasurementRecord) -> io::Result<()> {
        let line = format_line(record);
        self.out.write_all(line.as_bytes())
    }
}

impl<W: Write> Accumulator for LineProtocolWriter<W> {
    fn add_fields(&mut self, measurement: &str, fields: FieldSet, tags: Tags) {
        if self.error.is_some() {
            return;
        }
        if fields.is_empty() {
            self.skipped += 1;
            return;
        }

        let record = MeasurementRecord::new(measurement, fields, tags);
        match self.write_record(&record) {
            Ok(()) => self.written += 1,
            Err(e) => self.error = Some(e),
        }
    }
}

/// Renders a record as one newline-terminated line-protocol line.
pub fn format_line(record: &MeasurementRecord) -> String {
    let mut line = escape(&record.measurement, &[',', ' ']);

    for (key, value) in &record.tags {
        line.push(',');
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&escape(value, &[',', '=', ' ']));
    }

    let mut first = true;
    for (key, value) in &record.fields {
        line.push(if first { ' ' } else { ',' });
        first = false;
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&value.to_string());
        line.push('i');
    }

    if let Some(nanos) = record.timestamp.timestamp_nanos_opt() {
        line.push(' ');
        line.push_str(&nanos.to_string());
    }
    line.push('\n');
    line
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
