use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Source,
    Validate,
    Normalize,
    Enrich,
    Aggregate,
    Export,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Source => "source",
            Stage::Validate => "validate",
            Stage::Normalize => "normalize",
            Stage::Enrich => "enrich",
            Stage::Aggregate => "aggregate",
            Stage::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-row rules that drop a record. Rejections are counted, never logged row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionRule {
    /// Every field identical to an earlier row
    ExactDuplicate,
    /// (video_id, snapshot_date) already seen
    DuplicateObservation,
    MissingTitle,
    MissingCountry,
    /// Null, unparseable, or (after ratio computation) zero view count
    MissingViewCount,
    UnparseableSnapshotDate,
    UnparseablePublishDate,
}

impl RejectionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionRule::ExactDuplicate => "exact_duplicate",
            RejectionRule::DuplicateObservation => "duplicate_observation",
            RejectionRule::MissingTitle => "missing_title",
            RejectionRule::MissingCountry => "missing_country",
            RejectionRule::MissingViewCount => "missing_view_count",
            RejectionRule::UnparseableSnapshotDate => "unparseable_snapshot_date",
            RejectionRule::UnparseablePublishDate => "unparseable_publish_date",
        }
    }
}

impl fmt::Display for RejectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row accounting for a single stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub rows_in: usize,
    pub rows_out: usize,
    pub rejections: BTreeMap<RejectionRule, usize>,
}

impl StageReport {
    pub fn new(stage: Stage, rows_in: usize) -> Self {
        Self {
            stage,
            rows_in,
            rows_out: rows_in,
            rejections: BTreeMap::new(),
        }
    }

    pub fn reject(&mut self, rule: RejectionRule) {
        *self.rejections.entry(rule).or_insert(0) += 1;
    }

    pub fn finish(mut self, rows_out: usize) -> Self {
        self.rows_out = rows_out;
        self
    }

    pub fn rejected(&self, rule: RejectionRule) -> usize {
        self.rejections.get(&rule).copied().unwrap_or(0)
    }

    pub fn rejected_total(&self) -> usize {
        self.rejections.values().sum()
    }

    /// Emit the stage totals to the log and the metrics recorder
    pub fn record(&self) {
        info!(
            stage = %self.stage,
            rows_in = self.rows_in,
            rows_out = self.rows_out,
            rejected = self.rejected_total(),
            "stage complete"
        );
        for (rule, count) in &self.rejections {
            info!(stage = %self.stage, rule = %rule, count, "rows rejected");
        }
        crate::metrics::stage::rows_in(self.stage, self.rows_in);
        crate::metrics::stage::rows_out(self.stage, self.rows_out);
        for (rule, count) in &self.rejections {
            crate::metrics::stage::rejected(self.stage, *rule, *count);
        }
    }
}

/// Digest of one written output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDigest {
    pub path: PathBuf,
    pub rows: usize,
    pub sha256: String,
}

/// Summary of a complete run, written next to the exported tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub group_key: String,
    pub column_renames_version: String,
    pub sentiment_scorer: String,
    pub stages: Vec<StageReport>,
    /// Rows whose like or comment ratio exceeds 1.0. Values are kept as-is.
    pub engagement_anomalies: usize,
    /// Rows left out of aggregation because the group key was null or blank
    pub aggregate_excluded: usize,
    pub outputs: Vec<OutputDigest>,
}

impl RunReport {
    /// Total rejections for a rule across every stage
    pub fn rejections_for(&self, rule: RejectionRule) -> usize {
        self.stages.iter().map(|s| s.rejected(rule)).sum()
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn log_summary(&self) {
        let rows_in = self.stages.first().map(|s| s.rows_in).unwrap_or(0);
        let rows_out = self
            .stages
            .iter()
            .rev()
            .find(|s| s.stage <= Stage::Enrich)
            .map(|s| s.rows_out)
            .unwrap_or(0);
        info!(
            run_id = %self.run_id,
            source = %self.source,
            rows_in,
            rows_out,
            "run finished"
        );
        for stage in &self.stages {
            for (rule, count) in &stage.rejections {
                info!(stage = %stage.stage, rule = %rule, count, "rejection total");
            }
        }
        if self.engagement_anomalies > 0 {
            warn!(
                count = self.engagement_anomalies,
                "rows with an engagement ratio above 1.0 (flagged, not altered)"
            );
        }
        for output in &self.outputs {
            info!(path = %output.path.display(), rows = output.rows, sha256 = %output.sha256, "output written");
        }
    }
}
