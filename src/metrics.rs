//! Metrics for the ETL run.
//!
//! Everything is recorded through the `metrics` facade. When a run asks for a metrics
//! snapshot, [`init`] installs a Prometheus recorder whose rendered text is written next to
//! the exported tables. Without a recorder the macros are no-ops.

use std::fmt;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// All metric names used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RunsTotal,
    StageRowsIn,
    StageRowsOut,
    StageRowsRejected,
    StageDuration,
    EngagementAnomalies,
    AggregateGroups,
    AggregateExcluded,
    OutputRowsWritten,
    OutputWriteErrors,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RunsTotal => "trending_etl_runs_total",
            MetricName::StageRowsIn => "trending_etl_stage_rows_in_total",
            MetricName::StageRowsOut => "trending_etl_stage_rows_out_total",
            MetricName::StageRowsRejected => "trending_etl_stage_rows_rejected_total",
            MetricName::StageDuration => "trending_etl_stage_duration_seconds",
            MetricName::EngagementAnomalies => "trending_etl_engagement_anomalies_total",
            MetricName::AggregateGroups => "trending_etl_aggregate_groups",
            MetricName::AggregateExcluded => "trending_etl_aggregate_excluded_total",
            MetricName::OutputRowsWritten => "trending_etl_output_rows_written_total",
            MetricName::OutputWriteErrors => "trending_etl_output_write_errors_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder. Call at most once per process.
pub fn init() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    info!("Metrics recorder installed");
    Ok(handle)
}

/// Record that a run started
pub fn run_started(source: &str) {
    ::metrics::counter!(MetricName::RunsTotal.as_str(), "source" => source.to_string()).increment(1);
}

pub mod stage {
    use super::MetricName;
    use crate::pipeline::report::{RejectionRule, Stage};

    pub fn rows_in(stage: Stage, count: usize) {
        ::metrics::counter!(MetricName::StageRowsIn.as_str(), "stage" => stage.as_str()).increment(count as u64);
    }

    pub fn rows_out(stage: Stage, count: usize) {
        ::metrics::counter!(MetricName::StageRowsOut.as_str(), "stage" => stage.as_str()).increment(count as u64);
    }

    pub fn rejected(stage: Stage, rule: RejectionRule, count: usize) {
        ::metrics::counter!(MetricName::StageRowsRejected.as_str(),
            "stage" => stage.as_str(),
            "rule" => rule.as_str()
        )
        .increment(count as u64);
    }

    pub fn duration(stage: Stage, secs: f64) {
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage.as_str()).record(secs);
    }
}

pub mod features {
    use super::MetricName;

    pub fn engagement_anomalies(count: usize) {
        ::metrics::counter!(MetricName::EngagementAnomalies.as_str()).increment(count as u64);
    }
}

pub mod aggregate {
    use super::MetricName;

    pub fn groups(key: &str, count: usize) {
        ::metrics::gauge!(MetricName::AggregateGroups.as_str(), "key" => key.to_string()).set(count as f64);
    }

    pub fn excluded(key: &str, count: usize) {
        ::metrics::counter!(MetricName::AggregateExcluded.as_str(), "key" => key.to_string()).increment(count as u64);
    }
}

pub mod output {
    use super::MetricName;

    pub fn rows_written(table: &str, count: usize) {
        ::metrics::counter!(MetricName::OutputRowsWritten.as_str(), "table" => table.to_string()).increment(count as u64);
    }

    pub fn write_error(table: &str) {
        ::metrics::counter!(MetricName::OutputWriteErrors.as_str(), "table" => table.to_string()).increment(1);
    }
}
