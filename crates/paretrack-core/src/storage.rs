//! Storage layer: loads metric events from JSON/YAML/Parquet event files and
//! from experiment directories (`<base>/<experiment>/<run>/metrics.parquet`).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
    TimestampNanosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use tracing::{debug, trace, warn};

use crate::error::{ParetrackError, Result};
use crate::models::{MetricEvent, RunMetricRow};

pub const RUN_METRICS_FILE: &str = "metrics.parquet";

// ─── Directory helpers ────────────────────────────────────────────────────────

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

pub fn list_experiments(base_dir: &Path) -> Result<Vec<String>> {
    if !base_dir.exists() {
        return Ok(vec![]);
    }
    let mut names = vec![];
    for entry in fs::read_dir(base_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

pub fn list_runs(experiment_dir: &Path) -> Result<Vec<String>> {
    if !experiment_dir.exists() {
        return Ok(vec![]);
    }
    let mut names = vec![];
    for entry in fs::read_dir(experiment_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                if name != "artifacts" {
                    names.push(name.to_string());
                }
            }
        }
    }
    names.sort_by(|a, b| b.cmp(a)); // newest first
    Ok(names)
}

// ─── Event sources ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventFormat {
    Json,
    Yaml,
    Parquet,
}

fn event_format(path: &Path) -> Result<EventFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "json" => Ok(EventFormat::Json),
        "yaml" | "yml" => Ok(EventFormat::Yaml),
        "parquet" => Ok(EventFormat::Parquet),
        _ => Err(ParetrackError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Load events from a file, a run directory or an experiment directory.
pub fn load_events(path: &Path) -> Result<Vec<MetricEvent>> {
    if path.is_dir() {
        if path.join(RUN_METRICS_FILE).exists() {
            read_run_events(path)
        } else {
            experiment_events(path)
        }
    } else {
        read_event_file(path)
    }
}

/// Read a flat event list; the format follows the file extension.
pub fn read_event_file(path: &Path) -> Result<Vec<MetricEvent>> {
    let format = event_format(path)?;
    let events = match format {
        EventFormat::Json => {
            let reader = BufReader::new(fs::File::open(path)?);
            serde_json::from_reader(reader)?
        }
        EventFormat::Yaml => {
            let content = fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        }
        EventFormat::Parquet => read_event_parquet(path)?,
    };
    debug!(path = %path.display(), events = events.len(), "loaded event file");
    Ok(events)
}

/// Write a flat event list; the format follows the file extension.
pub fn write_event_file(path: &Path, events: &[MetricEvent]) -> Result<()> {
    let format = event_format(path)?;
    ensure_parent(path)?;
    match format {
        EventFormat::Json => {
            let writer = BufWriter::new(fs::File::create(path)?);
            serde_json::to_writer_pretty(writer, events)?;
        }
        EventFormat::Yaml => fs::write(path, serde_yaml::to_string(events)?)?,
        EventFormat::Parquet => write_event_parquet(path, events)?,
    }
    Ok(())
}

/// Events of every run in an experiment directory.
pub fn experiment_events(experiment_dir: &Path) -> Result<Vec<MetricEvent>> {
    if !experiment_dir.is_dir() {
        return Err(ParetrackError::ExperimentNotFound(
            experiment_dir.display().to_string(),
        ));
    }
    let mut events = vec![];
    for run in list_runs(experiment_dir)? {
        events.extend(read_run_events(&experiment_dir.join(&run))?);
    }
    debug!(dir = %experiment_dir.display(), events = events.len(), "loaded experiment events");
    Ok(events)
}

/// Events from one run's wide `metrics.parquet`, tagged with the run
/// directory name. Empty cells carry no observation and are skipped.
pub fn read_run_events(run_dir: &Path) -> Result<Vec<MetricEvent>> {
    let path = run_dir.join(RUN_METRICS_FILE);
    if !path.exists() {
        return Ok(vec![]);
    }
    let run_id = run_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let mut events = vec![];
    for batch in read_parquet(&path)? {
        let timestamps = required_column::<TimestampMicrosecondArray>(&batch, "timestamp")?;
        for field in batch.schema().fields() {
            let name = field.name();
            if name == "step" || name == "timestamp" {
                continue;
            }
            let Some(col) = batch.column_by_name(name) else {
                continue;
            };
            let values: Vec<Option<f64>> = match field.data_type() {
                DataType::Float64 => typed::<Float64Array>(col, name)?.iter().collect(),
                DataType::Int64 => typed::<Int64Array>(col, name)?
                    .iter()
                    .map(|v| v.map(|i| i as f64))
                    .collect(),
                other => {
                    warn!(column = %name, data_type = %other, "skipping non-numeric metric column");
                    continue;
                }
            };
            for (row, value) in values.into_iter().enumerate() {
                let Some(value) = value else { continue };
                events.push(MetricEvent::new(
                    run_id.clone(),
                    name.clone(),
                    value,
                    micros_to_utc(timestamps.value(row)),
                ));
            }
        }
    }
    Ok(events)
}

// ─── Parquet I/O ─────────────────────────────────────────────────────────────

fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut batches = vec![];
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    ensure_parent(path)?;
    let file = fs::File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn typed<'a, T: 'static>(col: &'a ArrayRef, name: &str) -> Result<&'a T> {
    col.as_any().downcast_ref::<T>().ok_or_else(|| {
        ParetrackError::Other(format!(
            "column '{}' has unexpected type {}",
            name,
            col.data_type()
        ))
    })
}

fn optional_column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<Option<&'a T>> {
    batch
        .column_by_name(name)
        .map(|col| typed::<T>(col, name))
        .transpose()
}

fn required_column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    optional_column::<T>(batch, name)?
        .ok_or_else(|| ParetrackError::Other(format!("missing column '{}'", name)))
}

fn micros_to_utc(micros: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_default()
}

fn timestamp_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )
}

fn timestamp_array(values: Vec<Option<i64>>) -> ArrayRef {
    Arc::new(TimestampMicrosecondArray::from(values).with_timezone_opt(Some("UTC".to_string())))
}

fn string_cell(col: Option<&StringArray>, row: usize) -> Option<String> {
    col.filter(|c| !c.is_null(row)).map(|c| c.value(row).to_string())
}

/// Long event table: `id`, `run_id`, `key`, `value`, `created_at` (ns, UTC).
pub fn write_event_parquet(path: &Path, events: &[MetricEvent]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, true),
        Field::new("run_id", DataType::Utf8, true),
        Field::new("key", DataType::Utf8, true),
        Field::new("value", DataType::Float64, true),
        Field::new(
            "created_at",
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
            false,
        ),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            events.iter().map(|e| e.id.clone()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            events.iter().map(|e| e.run_id.clone()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            events.iter().map(|e| e.key.clone()).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            events.iter().map(|e| e.value).collect::<Vec<_>>(),
        )),
        created_at_array(events)?,
    ];
    write_parquet(path, &RecordBatch::try_new(schema, columns)?)
}

fn created_at_array(events: &[MetricEvent]) -> Result<ArrayRef> {
    let nanos = events
        .iter()
        .map(|e| {
            e.created_at.timestamp_nanos_opt().map(Some).ok_or_else(|| {
                ParetrackError::Other(format!(
                    "createdAt {} is outside the nanosecond timestamp range",
                    e.created_at
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(
        TimestampNanosecondArray::from(nanos).with_timezone_opt(Some("UTC".to_string())),
    ))
}

/// `created_at` as UTC timestamps; older files store microseconds.
fn created_at_column(batch: &RecordBatch) -> Result<Vec<DateTime<Utc>>> {
    let col = batch
        .column_by_name("created_at")
        .ok_or_else(|| ParetrackError::Other("missing column 'created_at'".to_string()))?;
    let times = match col.data_type() {
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            let arr = typed::<TimestampNanosecondArray>(col, "created_at")?;
            (0..arr.len())
                .map(|i| DateTime::<Utc>::from_timestamp_nanos(arr.value(i)))
                .collect()
        }
        _ => {
            let arr = typed::<TimestampMicrosecondArray>(col, "created_at")?;
            (0..arr.len()).map(|i| micros_to_utc(arr.value(i))).collect()
        }
    };
    Ok(times)
}

fn read_event_parquet(path: &Path) -> Result<Vec<MetricEvent>> {
    let mut events = vec![];
    for batch in read_parquet(path)? {
        let ids = optional_column::<StringArray>(&batch, "id")?;
        let run_ids = optional_column::<StringArray>(&batch, "run_id")?;
        let keys = optional_column::<StringArray>(&batch, "key")?;
        let values = optional_column::<Float64Array>(&batch, "value")?;
        let created = created_at_column(&batch)?;

        for (row, created_at) in created.into_iter().enumerate() {
            events.push(MetricEvent {
                id: string_cell(ids, row),
                run_id: string_cell(run_ids, row),
                key: string_cell(keys, row),
                value: values.filter(|v| !v.is_null(row)).map(|v| v.value(row)),
                created_at,
            });
        }
    }
    Ok(events)
}

/// Wide run table: `step`, `timestamp`, then one Float64 column per metric.
pub fn write_run_metrics(path: &Path, rows: &[RunMetricRow]) -> Result<()> {
    let keys: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.values.keys().map(String::as_str))
        .collect();

    let mut fields = vec![
        Field::new("step", DataType::Int64, true),
        timestamp_field("timestamp"),
    ];
    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(
            rows.iter().map(|r| r.step.map(|s| s as i64)).collect::<Vec<_>>(),
        )),
        timestamp_array(
            rows.iter()
                .map(|r| Some(r.timestamp.timestamp_micros()))
                .collect(),
        ),
    ];

    for key in keys {
        let vals: Vec<Option<f64>> = rows
            .iter()
            .map(|r| r.values.get(key).copied().flatten())
            .collect();
        fields.push(Field::new(key, DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(vals)));
    }

    let schema = Arc::new(Schema::new(fields));
    write_parquet(path, &RecordBatch::try_new(schema, arrays)?)
}

/// Split an event list into `<experiment_dir>/<run>/metrics.parquet`, one row
/// per distinct timestamp. Returns the number of runs written.
///
/// Ids and null-only cells do not survive the wide layout.
pub fn write_experiment(experiment_dir: &Path, events: &[MetricEvent]) -> Result<usize> {
    type Cells = BTreeMap<String, Option<f64>>;
    let mut runs: BTreeMap<&str, BTreeMap<DateTime<Utc>, Cells>> = BTreeMap::new();

    for event in events {
        let (Some(run_id), Some(key)) = (event.run_id.as_deref(), event.key.as_deref()) else {
            trace!(id = ?event.id, "skipping event without run id or key");
            continue;
        };
        if run_id.is_empty() || key.is_empty() {
            continue;
        }
        if run_id == "artifacts" || run_id.contains("..") || run_id.contains(['/', '\\']) {
            return Err(ParetrackError::Other(format!(
                "run id '{}' cannot be used as a directory name",
                run_id
            )));
        }
        if key == "step" || key == "timestamp" {
            return Err(ParetrackError::Other(format!(
                "metric key '{}' clashes with a reserved column",
                key
            )));
        }
        let cells = runs
            .entry(run_id)
            .or_default()
            .entry(event.created_at)
            .or_default();
        match event.value {
            Some(value) => {
                cells.insert(key.to_string(), Some(value));
            }
            None => {
                cells.entry(key.to_string()).or_insert(None);
            }
        }
    }

    for (run_id, by_time) in &runs {
        let rows: Vec<RunMetricRow> = by_time
            .iter()
            .enumerate()
            .map(|(step, (at, cells))| {
                RunMetricRow::new(cells.clone(), Some(step as u64)).at(*at)
            })
            .collect();
        write_run_metrics(&experiment_dir.join(run_id).join(RUN_METRICS_FILE), &rows)?;
    }
    debug!(dir = %experiment_dir.display(), runs = runs.len(), "wrote experiment directory");
    Ok(runs.len())
}
