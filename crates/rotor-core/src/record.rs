//! Structured record logging and process-unique ID allocation.
//!
//! Components log schema'd records instead of printf lines: lower overhead
//! (records go to a bulk sink), no spliced stdout, and a uniform shape that
//! downstream analysis can rely on. A [`RecordHeader`] fixes the schema; a
//! [`Record`] is one row; a [`RecordLogger`] is the sink; a
//! [`RecordCoalescer`] batches rows so sinks can insert in bulk.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::clock::TimePoint;

/// The column types a record schema may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Bool,
    DurationNs,
    TimePoint,
    Str,
    F64,
}

/// A single typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    DurationNs(i64),
    TimePoint(TimePoint),
    Str(String),
    F64(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Bool(_) => ValueKind::Bool,
            Value::DurationNs(_) => ValueKind::DurationNs,
            Value::TimePoint(_) => ValueKind::TimePoint,
            Value::Str(_) => ValueKind::Str,
            Value::F64(_) => ValueKind::F64,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::DurationNs(v.as_nanos() as i64)
    }
}

impl From<TimePoint> for Value {
    fn from(v: TimePoint) -> Self {
        Value::TimePoint(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

/// The schema of a record: a globally unique name plus an ordered list of
/// `(column name, column kind)` pairs.
#[derive(Debug)]
pub struct RecordHeader {
    id: u64,
    name: String,
    columns: Vec<(String, ValueKind)>,
}

impl RecordHeader {
    pub fn new(name: impl Into<String>, columns: &[(&str, ValueKind)]) -> Self {
        let name = name.into();
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self {
            id: hasher.finish(),
            name,
            columns: columns
                .iter()
                .map(|(n, k)| (n.to_string(), *k))
                .collect(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_name(&self, column: usize) -> &str {
        &self.columns[column].0
    }

    pub fn column_kind(&self, column: usize) -> ValueKind {
        self.columns[column].1
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }
}

impl PartialEq for RecordHeader {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name && self.columns == other.columns
    }
}

impl Eq for RecordHeader {}

/// One logged row: a header plus a vector of values matching it.
#[derive(Debug, Clone)]
pub struct Record {
    header: Arc<RecordHeader>,
    values: Vec<Value>,
}

impl Record {
    /// Builds a record, checking the values against the schema.
    ///
    /// # Panics
    ///
    /// Panics if the value count or any value's kind disagrees with the
    /// header. A mismatch is a build integration bug in the caller.
    pub fn new(header: Arc<RecordHeader>, values: Vec<Value>) -> Self {
        assert_eq!(
            values.len(),
            header.columns(),
            "record for '{}' has {} values but the header specifies {} columns",
            header.name(),
            values.len(),
            header.columns(),
        );
        for (column, value) in values.iter().enumerate() {
            assert_eq!(
                value.kind(),
                header.column_kind(column),
                "wrong type for column '{}' of '{}': got {:?}, header specifies {:?}",
                header.column_name(column),
                header.name(),
                value.kind(),
                header.column_kind(column),
            );
        }
        Self { header, values }
    }

    pub fn header(&self) -> &Arc<RecordHeader> {
        &self.header
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, column: usize) -> &Value {
        &self.values[column]
    }
}

/// A sink for structured records.
///
/// The default implementation in the runtime crate writes one table per
/// header from a dedicated insertion thread; tests substitute in-memory
/// capture sinks.
pub trait RecordLogger: Send + Sync {
    /// Writes one record.
    fn log(&self, record: Record);

    /// Writes many records of the same schema. More efficient than calling
    /// [`log`](Self::log) repeatedly for sinks that support bulk insertion.
    fn log_many(&self, records: Vec<Record>) {
        for record in records {
            self.log(record);
        }
    }
}

/// How long the [`RecordCoalescer`] buffers before flushing.
pub const LOG_BUFFER_DELAY: Duration = Duration::from_secs(1);

/// Buffers records of one schema and writes them back in bulk.
///
/// Clients produce one record at a time; sinks prefer batches. The coalescer
/// resolves the mismatch by accumulating until the oldest buffered record is
/// [`LOG_BUFFER_DELAY`] old. Remaining records are flushed on drop.
pub struct RecordCoalescer {
    logger: Option<Arc<dyn RecordLogger>>,
    buffer: Vec<Record>,
    last_flush: Instant,
}

impl RecordCoalescer {
    /// A coalescer over `logger`; pass `None` to disable logging entirely.
    pub fn new(logger: Option<Arc<dyn RecordLogger>>) -> Self {
        Self {
            logger,
            buffer: Vec::new(),
            last_flush: Instant::now(),
        }
    }

    /// Whether a sink is attached.
    pub fn is_enabled(&self) -> bool {
        self.logger.is_some()
    }

    /// Appends a record to the buffer; may trigger a flush.
    pub fn log(&mut self, record: Record) {
        if self.logger.is_some() {
            debug_assert!(
                self.buffer
                    .first()
                    .is_none_or(|first| first.header() == record.header()),
                "coalescer for '{}' was handed a '{}' record",
                self.buffer
                    .first()
                    .map(|r| r.header().name())
                    .unwrap_or_default(),
                record.header().name(),
            );
            self.buffer.push(record);
            self.maybe_flush();
        }
    }

    fn maybe_flush(&mut self) {
        if self.last_flush.elapsed() > LOG_BUFFER_DELAY {
            self.flush();
        }
    }

    /// Flushes buffered records to the underlying sink.
    pub fn flush(&mut self) {
        if let Some(logger) = &self.logger {
            if !self.buffer.is_empty() {
                logger.log_many(std::mem::take(&mut self.buffer));
            }
            self.last_flush = Instant::now();
        }
    }
}

impl Drop for RecordCoalescer {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Allocates IDs unique within a 3-level namespace.
///
/// Components claim their plugin IDs from the global namespace; a component
/// with sub-components can scope further calls under its own ID so the tuple
/// `(component id, sub id)` stays unique while the small integers themselves
/// may repeat across namespaces.
#[derive(Default)]
pub struct GenGuid {
    counters: Mutex<HashMap<(usize, usize, usize), usize>>,
}

impl GenGuid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next ID in the global namespace.
    pub fn get(&self) -> usize {
        self.get_scoped(0, 0, 0)
    }

    /// Next ID unique among calls with the same `(ns, sub, subsub)` triple.
    pub fn get_scoped(&self, ns: usize, sub: usize, subsub: usize) -> usize {
        let mut counters = self.counters.lock();
        let counter = counters.entry((ns, sub, subsub)).or_insert(1);
        let id = *counter;
        *counter += 1;
        id
    }
}
