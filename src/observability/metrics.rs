//! Metrics for the ETL pipeline, following standard Prometheus naming
//! conventions.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

/// Enum representing all metric names used in the system.
/// This eliminates magic strings and provides compile-time safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Source metrics
    SourceRowsRead,
    SourceMalformedCells,
    SourceReadErrors,
    SourceReadDuration,

    // Cleaning metrics
    CleaningRowsAccepted,
    CleaningRowsDroppedMissing,
    CleaningRowsDroppedOutOfRange,

    // Normalize metrics
    NormalizeDatesParsed,
    NormalizeDatesMissing,
    NormalizeParseWarnings,

    // Categorize metrics
    CategorizeRowsLabeled,
    CategorizeDefaultLabel,

    // Aggregate metrics
    AggregateGroups,

    // Sink metrics
    SinkRowsWritten,
    SinkWritesSuccess,
    SinkWritesError,
    SinkWriteDuration,

    // Run metrics
    RunsCompleted,
    RunsFailed,
    RunDuration,
}

impl MetricName {
    /// Get the metric name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            // Source metrics
            MetricName::SourceRowsRead => "etl_source_rows_read_total",
            MetricName::SourceMalformedCells => "etl_source_malformed_cells_total",
            MetricName::SourceReadErrors => "etl_source_read_errors_total",
            MetricName::SourceReadDuration => "etl_source_read_duration_seconds",

            // Cleaning metrics
            MetricName::CleaningRowsAccepted => "etl_cleaning_rows_accepted_total",
            MetricName::CleaningRowsDroppedMissing => "etl_cleaning_rows_dropped_missing_total",
            MetricName::CleaningRowsDroppedOutOfRange => {
                "etl_cleaning_rows_dropped_out_of_range_total"
            }

            // Normalize metrics
            MetricName::NormalizeDatesParsed => "etl_normalize_dates_parsed_total",
            MetricName::NormalizeDatesMissing => "etl_normalize_dates_missing_total",
            MetricName::NormalizeParseWarnings => "etl_normalize_parse_warnings_total",

            // Categorize metrics
            MetricName::CategorizeRowsLabeled => "etl_categorize_rows_labeled_total",
            MetricName::CategorizeDefaultLabel => "etl_categorize_default_label_total",

            // Aggregate metrics
            MetricName::AggregateGroups => "etl_aggregate_groups",

            // Sink metrics
            MetricName::SinkRowsWritten => "etl_sink_rows_written_total",
            MetricName::SinkWritesSuccess => "etl_sink_writes_success_total",
            MetricName::SinkWritesError => "etl_sink_writes_error_total",
            MetricName::SinkWriteDuration => "etl_sink_write_duration_seconds",

            // Run metrics
            MetricName::RunsCompleted => "etl_runs_completed_total",
            MetricName::RunsFailed => "etl_runs_failed_total",
            MetricName::RunDuration => "etl_run_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metrics recorded by the record source.
pub struct SourceMetrics;

impl SourceMetrics {
    pub fn record_read_success(rows: u64, malformed_cells: u64, duration_secs: f64) {
        ::metrics::counter!(MetricName::SourceRowsRead.as_str()).increment(rows);
        ::metrics::counter!(MetricName::SourceMalformedCells.as_str()).increment(malformed_cells);
        ::metrics::histogram!(MetricName::SourceReadDuration.as_str()).record(duration_secs);
    }

    pub fn record_read_error() {
        ::metrics::counter!(MetricName::SourceReadErrors.as_str()).increment(1);
    }
}

/// Metrics recorded by the cleaning stage.
pub struct CleaningMetrics;

impl CleaningMetrics {
    pub fn record_accepted(rows: u64) {
        ::metrics::counter!(MetricName::CleaningRowsAccepted.as_str()).increment(rows);
    }

    pub fn record_dropped_missing(rows: u64) {
        ::metrics::counter!(MetricName::CleaningRowsDroppedMissing.as_str()).increment(rows);
    }

    pub fn record_dropped_out_of_range(rows: u64) {
        ::metrics::counter!(MetricName::CleaningRowsDroppedOutOfRange.as_str()).increment(rows);
    }
}

/// Metrics recorded by the date normalization stage.
pub struct NormalizeMetrics;

impl NormalizeMetrics {
    pub fn record_parsed(rows: u64) {
        ::metrics::counter!(MetricName::NormalizeDatesParsed.as_str()).increment(rows);
    }

    pub fn record_missing(rows: u64) {
        ::metrics::counter!(MetricName::NormalizeDatesMissing.as_str()).increment(rows);
    }

    pub fn record_parse_warnings(rows: u64) {
        ::metrics::counter!(MetricName::NormalizeParseWarnings.as_str()).increment(rows);
    }
}

/// Metrics recorded by the categorization stage.
pub struct CategorizeMetrics;

impl CategorizeMetrics {
    pub fn record_labeled(rows: u64, defaulted: u64) {
        ::metrics::counter!(MetricName::CategorizeRowsLabeled.as_str()).increment(rows);
        ::metrics::counter!(MetricName::CategorizeDefaultLabel.as_str()).increment(defaulted);
    }
}

/// Metrics recorded by the aggregation stage.
pub struct AggregateMetrics;

impl AggregateMetrics {
    pub fn record_groups(groups: u64) {
        ::metrics::histogram!(MetricName::AggregateGroups.as_str()).record(groups as f64);
    }
}

/// Metrics recorded by the sink writer.
pub struct SinkMetrics;

impl SinkMetrics {
    pub fn record_write_success(rows: u64, duration_secs: f64) {
        ::metrics::counter!(MetricName::SinkWritesSuccess.as_str()).increment(1);
        ::metrics::counter!(MetricName::SinkRowsWritten.as_str()).increment(rows);
        ::metrics::histogram!(MetricName::SinkWriteDuration.as_str()).record(duration_secs);
    }

    pub fn record_write_error() {
        ::metrics::counter!(MetricName::SinkWritesError.as_str()).increment(1);
    }
}

/// Metrics recorded once per run.
pub struct RunMetrics;

impl RunMetrics {
    pub fn record_completed(duration_secs: f64) {
        ::metrics::counter!(MetricName::RunsCompleted.as_str()).increment(1);
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(duration_secs);
    }

    pub fn record_failed() {
        ::metrics::counter!(MetricName::RunsFailed.as_str()).increment(1);
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system. Installs the Prometheus recorder and
/// keeps its handle so a snapshot can be rendered at run end.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Render the current metrics in Prometheus exposition format, if the
/// recorder has been installed.
pub fn snapshot() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}
