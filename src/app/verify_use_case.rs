//! Re-checks exported tables against the invariants every run must uphold.
//!
//! Violations mean the exported data is wrong and fail the command. Findings are data-quality
//! observations (engagement ratios above 1.0) that are reported but expected to occur.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use tracing::{info, warn};

use crate::app::ports::TableReaderPort;
use crate::constants::*;
use crate::error::Result;
use crate::infra::csv_table_store::sha256_hex;
use crate::pipeline::export::Table;
use crate::pipeline::processing::GroupKey;
use crate::pipeline::report::RunReport;

/// One failed or noteworthy check
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub check: &'static str,
    /// Zero-based data row, when the finding concerns a single row
    pub row: Option<usize>,
    pub detail: String,
}

impl Finding {
    fn at(check: &'static str, row: usize, detail: impl Into<String>) -> Self {
        Self {
            check,
            row: Some(row),
            detail: detail.into(),
        }
    }

    fn table(check: &'static str, detail: impl Into<String>) -> Self {
        Self {
            check,
            row: None,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct VerificationReport {
    pub rows: usize,
    pub groups: usize,
    pub violations: Vec<Finding>,
    pub findings: Vec<Finding>,
}

impl VerificationReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Paths of the artifacts a run produced
#[derive(Debug, Clone, Copy)]
pub struct VerifyTargets<'a> {
    pub rows: &'a Path,
    pub aggregates: &'a Path,
    /// Digests recorded here are compared with the files on disk when present
    pub report: Option<&'a Path>,
}

pub struct VerifyUseCase {
    reader: Box<dyn TableReaderPort>,
}

impl VerifyUseCase {
    pub fn new(reader: Box<dyn TableReaderPort>) -> Self {
        Self { reader }
    }

    pub fn verify(&self, targets: VerifyTargets<'_>, group_key: GroupKey) -> Result<VerificationReport> {
        let rows = self.reader.read_table(targets.rows)?;
        let aggregates = self.reader.read_table(targets.aggregates)?;

        let mut report = VerificationReport {
            rows: rows.len(),
            groups: aggregates.len(),
            ..Default::default()
        };

        let missing: Vec<&str> = ENRICHED_COLUMNS
            .iter()
            .copied()
            .filter(|c| rows.column(c).is_none())
            .collect();
        if !missing.is_empty() {
            report
                .violations
                .push(Finding::table("columns", format!("row table lacks {}", missing.join(", "))));
            return Ok(report);
        }

        check_rows(&rows, &mut report);
        check_aggregates(&rows, &aggregates, group_key, &mut report);
        if let Some(path) = targets.report {
            self.check_digests(path, &mut report)?;
        }

        info!(
            rows = report.rows,
            groups = report.groups,
            violations = report.violations.len(),
            findings = report.findings.len(),
            "verification complete"
        );
        for violation in &report.violations {
            warn!(check = violation.check, row = ?violation.row, detail = %violation.detail, "violation");
        }
        Ok(report)
    }

    fn check_digests(&self, report_path: &Path, report: &mut VerificationReport) -> Result<()> {
        if !report_path.exists() {
            return Ok(());
        }
        let run: RunReport = serde_json::from_slice(&self.reader.read_bytes(report_path)?)?;
        for output in &run.outputs {
            let actual = sha256_hex(&self.reader.read_bytes(&output.path)?);
            if actual != output.sha256 {
                report.violations.push(Finding::table(
                    "digest",
                    format!("{} changed since the run ({} != {})", output.path.display(), actual, output.sha256),
                ));
            }
        }
        Ok(())
    }
}

fn cell<'a>(table: &'a Table, row: &'a [String], column: &str) -> &'a str {
    table
        .column(column)
        .and_then(|i| row.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

fn check_rows(rows: &Table, report: &mut VerificationReport) {
    let mut observations = HashSet::with_capacity(rows.len());

    for (i, row) in rows.rows.iter().enumerate() {
        let get = |column: &str| cell(rows, row, column);

        let key = (get(COL_VIDEO_ID).to_string(), get(COL_SNAPSHOT_DATE).to_string());
        if !observations.insert(key) {
            report.violations.push(Finding::at(
                "dedup",
                i,
                format!("repeated observation {} on {}", get(COL_VIDEO_ID), get(COL_SNAPSHOT_DATE)),
            ));
        }

        for column in [COL_TITLE, COL_COUNTRY] {
            if get(column).trim().is_empty() {
                report.violations.push(Finding::at("required", i, format!("{} is empty", column)));
            }
        }
        match get(COL_VIEW_COUNT).parse::<u64>() {
            Ok(views) if views > 0 => {}
            _ => report.violations.push(Finding::at(
                "required",
                i,
                format!("view_count '{}' is not a positive count", get(COL_VIEW_COUNT)),
            )),
        }

        match get(COL_TITLE_SENTIMENT).parse::<f64>() {
            Ok(s) if (-1.0..=1.0).contains(&s) => {}
            _ => report.violations.push(Finding::at(
                "sentiment",
                i,
                format!("title_sentiment '{}' outside [-1, 1]", get(COL_TITLE_SENTIMENT)),
            )),
        }

        let mut above_one = false;
        for column in [COL_LIKE_RATIO, COL_COMMENT_RATIO] {
            let text = get(column);
            if text.is_empty() {
                continue;
            }
            match text.parse::<f64>() {
                Ok(ratio) if ratio > 1.0 => {
                    above_one = true;
                    report
                        .findings
                        .push(Finding::at("engagement", i, format!("{} = {}", column, ratio)));
                }
                Ok(ratio) if ratio > 0.0 => {}
                _ => report.violations.push(Finding::at(
                    "ratio",
                    i,
                    format!("{} '{}' is not a positive ratio", column, text),
                )),
            }
        }
        if get(COL_ENGAGEMENT_ANOMALY) != above_one.to_string() {
            report.violations.push(Finding::at(
                "ratio",
                i,
                format!("engagement_anomaly '{}' disagrees with ratios", get(COL_ENGAGEMENT_ANOMALY)),
            ));
        }
    }
}

fn check_aggregates(rows: &Table, aggregates: &Table, key: GroupKey, report: &mut VerificationReport) {
    let key_column = key.column_name();
    if aggregates.column(key_column).is_none() || aggregates.column("count").is_none() {
        report.violations.push(Finding::table(
            "aggregate",
            format!("aggregate table is not keyed by {}", key_column),
        ));
        return;
    }

    let mut expected: BTreeMap<&str, usize> = BTreeMap::new();
    if let Some(values) = rows.column_values(key_column) {
        for value in values.map(str::trim).filter(|v| !v.is_empty()) {
            *expected.entry(value).or_insert(0) += 1;
        }
    }

    let mut seen = HashSet::new();
    for (i, row) in aggregates.rows.iter().enumerate() {
        let value = cell(aggregates, row, key_column);
        if !seen.insert(value) {
            report
                .violations
                .push(Finding::at("aggregate", i, format!("key '{}' appears more than once", value)));
        }
        let count = cell(aggregates, row, "count").parse::<usize>().ok();
        match (expected.get(value), count) {
            (Some(want), Some(got)) if *want == got => {}
            (want, got) => report.violations.push(Finding::at(
                "aggregate",
                i,
                format!("key '{}' count {:?}, expected {:?}", value, got, want),
            )),
        }
    }

    for value in expected.keys().filter(|v| !seen.contains(*v)) {
        report
            .violations
            .push(Finding::table("aggregate", format!("no aggregate row for '{}'", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::TableWriterPort;
    use crate::infra::CsvTableStore;
    use crate::pipeline::export::{aggregate_table, enriched_table};
    use crate::pipeline::ingestion::read_csv;
    use crate::pipeline::processing::FeatureEngine;
    use crate::pipeline::Pipeline;
    use tempfile::tempdir;

    const DATA: &str = "title,channel_name,daily_rank,daily_movement,weekly_movement,snapshot_date,country,view_count,like_count,comment_count,description,thumbnail_url,video_id,channel_id,video_tags,kind,publish_date,language
Great news,Chan,1,0,0,2025-07-25,US,100,5,1,,,a1,c1,,youtube#video,2025-07-20T10:00:00Z,en
Bad news,Chan,2,0,0,2025-07-25,US,10,50,1,,,a2,c1,,youtube#video,2025-07-20T10:00:00Z,en
Oi,Canal,1,0,0,2025-07-25,BR,10,1,1,,,b1,c2,,youtube#video,2025-07-20T10:00:00Z,pt
";

    fn export(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let output = Pipeline::new(FeatureEngine::default(), GroupKey::Country)
            .transform(read_csv(DATA.as_bytes()).unwrap())
            .unwrap();
        let rows = dir.join("rows.csv");
        let groups = dir.join("groups.csv");
        let mut batch = CsvTableStore::new().begin();
        batch.stage_table(&rows, &enriched_table(&output.records)).unwrap();
        batch
            .stage_table(&groups, &aggregate_table(&output.aggregates, GroupKey::Country))
            .unwrap();
        batch.commit().unwrap();
        (rows, groups)
    }

    fn verify(rows: &Path, groups: &Path) -> VerificationReport {
        VerifyUseCase::new(Box::new(CsvTableStore::new()))
            .verify(
                VerifyTargets {
                    rows,
                    aggregates: groups,
                    report: None,
                },
                GroupKey::Country,
            )
            .unwrap()
    }

    #[test]
    fn clean_export_passes_with_engagement_finding() {
        let dir = tempdir().unwrap();
        let (rows, groups) = export(dir.path());

        let report = verify(&rows, &groups);
        assert!(report.is_ok(), "{:?}", report.violations);
        assert_eq!(report.rows, 3);
        assert_eq!(report.groups, 2);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].check, "engagement");
        assert_eq!(report.findings[0].row, Some(1));
    }

    #[test]
    fn tampered_tables_are_violations() {
        let dir = tempdir().unwrap();
        let (rows, groups) = export(dir.path());
        let store = CsvTableStore::new();

        let mut table = store.read_table(&rows).unwrap();
        let duplicate = table.rows[0].clone();
        table.rows.push(duplicate);
        let sentiment = table.column(COL_TITLE_SENTIMENT).unwrap();
        table.rows[2][sentiment] = "1.5".to_string();
        store.write_table(&rows, &table).unwrap();

        let report = verify(&rows, &groups);
        let checks: HashSet<&str> = report.violations.iter().map(|v| v.check).collect();
        assert!(checks.contains("dedup"));
        assert!(checks.contains("sentiment"));
        assert!(checks.contains("aggregate"));
        assert!(!report.is_ok());
    }

    #[test]
    fn missing_table_is_not_found() {
        let dir = tempdir().unwrap();
        let result = VerifyUseCase::new(Box::new(CsvTableStore::new())).verify(
            VerifyTargets {
                rows: &dir.path().join("rows.csv"),
                aggregates: &dir.path().join("groups.csv"),
                report: None,
            },
            GroupKey::Country,
        );
        assert!(matches!(result, Err(crate::error::EtlError::NotFound { .. })));
    }
}
