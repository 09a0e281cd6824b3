//! Record sinks: where the fabric's structured records end up.
//!
//! [`CsvRecordLogger`] is the default sink: one table per schema, written
//! from a dedicated insertion thread so logging never blocks the fabric's
//! hot paths. [`MetricsTap`] wraps any sink and prints coarse per-schema
//! totals to stdout at shutdown.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, error};

use rotor_core::record::{Record, RecordHeader, RecordLogger, Value};

fn format_value(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        // Integer column, matching the other numeric kinds.
        Value::Bool(v) => (*v as i64).to_string(),
        Value::DurationNs(v) => v.to_string(),
        Value::TimePoint(v) => v.as_nanos().to_string(),
        Value::Str(v) => v.clone(),
        Value::F64(v) => v.to_string(),
    }
}

struct Table {
    sender: Option<Sender<Vec<Record>>>,
    worker: Option<JoinHandle<()>>,
}

impl Table {
    fn spawn(root: &PathBuf, header: &Arc<RecordHeader>) -> io::Result<Self> {
        let path = root.join(format!("{}.csv", header.name()));
        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header.column_names())?;

        let (sender, receiver) = crossbeam_channel::unbounded::<Vec<Record>>();
        let table_name = header.name().to_string();
        let worker = std::thread::Builder::new()
            .name(format!("log-{table_name}"))
            .spawn(move || {
                while let Ok(batch) = receiver.recv() {
                    for record in &batch {
                        let row = record.values().iter().map(format_value);
                        if let Err(err) = writer.write_record(row) {
                            error!(table = %table_name, error = %err, "failed to write record");
                        }
                    }
                    if let Err(err) = writer.flush() {
                        error!(table = %table_name, error = %err, "failed to flush records");
                    }
                }
            })?;

        debug!(path = %path.display(), "record table created");
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

/// The default record sink: one CSV file per schema under a metrics
/// directory, each fed by its own insertion thread.
pub struct CsvRecordLogger {
    root: PathBuf,
    tables: Mutex<HashMap<u64, Table>>,
}

impl CsvRecordLogger {
    /// Creates the metrics directory and an empty sink.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            tables: Mutex::new(HashMap::new()),
        })
    }

    fn send(&self, batch: Vec<Record>) {
        let header = batch[0].header().clone();
        let mut tables = self.tables.lock();
        let table = tables.entry(header.id()).or_insert_with(|| {
            Table::spawn(&self.root, &header).unwrap_or_else(|err| {
                error!(table = header.name(), error = %err, "failed to create record table");
                Table {
                    sender: None,
                    worker: None,
                }
            })
        });
        if let Some(sender) = &table.sender {
            let _ = sender.send(batch);
        }
    }
}

impl RecordLogger for CsvRecordLogger {
    fn log(&self, record: Record) {
        self.log_many(vec![record]);
    }

    fn log_many(&self, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        // Batches are usually homogeneous (coalescers guarantee it); split
        // into per-header runs to be safe.
        let mut run: Vec<Record> = Vec::with_capacity(records.len());
        for record in records {
            if run
                .last()
                .is_some_and(|prev| prev.header().id() != record.header().id())
            {
                self.send(std::mem::take(&mut run));
            }
            run.push(record);
        }
        if !run.is_empty() {
            self.send(run);
        }
    }
}

impl Drop for CsvRecordLogger {
    fn drop(&mut self) {
        let mut tables = self.tables.lock();
        for (_, table) in tables.drain() {
            drop(table.sender);
            if let Some(worker) = table.worker {
                let _ = worker.join();
            }
        }
    }
}

/// A pass-through sink that counts records per schema and prints the totals
/// to stdout when dropped. Enabled by `ILLIXR_STDOUT_METRICS`.
pub struct MetricsTap {
    inner: Arc<dyn RecordLogger>,
    counts: Mutex<HashMap<String, u64>>,
}

impl MetricsTap {
    pub fn new(inner: Arc<dyn RecordLogger>) -> Self {
        Self {
            inner,
            counts: Mutex::new(HashMap::new()),
        }
    }

    fn count(&self, name: &str, by: u64) {
        *self.counts.lock().entry(name.to_string()).or_insert(0) += by;
    }
}

impl RecordLogger for MetricsTap {
    fn log(&self, record: Record) {
        self.count(record.header().name(), 1);
        self.inner.log(record);
    }

    fn log_many(&self, records: Vec<Record>) {
        if let Some(first) = records.first() {
            self.count(first.header().name(), records.len() as u64);
        }
        self.inner.log_many(records);
    }
}

impl Drop for MetricsTap {
    fn drop(&mut self) {
        let counts = self.counts.lock();
        let mut names: Vec<_> = counts.keys().collect();
        names.sort();
        for name in names {
            println!("{name}: {} records", counts[name]);
        }
    }
}
