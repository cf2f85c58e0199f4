use std::collections::HashSet;

use crate::constants::{COL_COUNTRY, COL_SNAPSHOT_DATE, COL_TITLE, COL_VIDEO_ID, COL_VIEW_COUNT};
use crate::error::{EtlError, Result};
use crate::pipeline::ingestion::{RawRecord, RawSchema};
use crate::pipeline::processing::cells::{non_blank, parse_count};
use crate::pipeline::processing::normalize::parse_snapshot_date;
use crate::pipeline::report::{RejectionRule, Stage, StageReport};

/// Surviving rows plus the per-rule rejection counts
#[derive(Debug)]
pub struct ValidationOutcome {
    pub records: Vec<RawRecord>,
    pub report: StageReport,
}

/// Removes redundant and structurally invalid rows. Never repairs a row.
///
/// Rules run as sequential passes over the whole set, in order:
/// exact duplicates, then repeated (video_id, snapshot_date) observations, then rows
/// missing a title, country or view count. The first occurrence in input order always wins.
#[derive(Debug, Clone)]
pub struct Validator {
    title: usize,
    country: usize,
    view_count: usize,
    video_id: usize,
    snapshot_date: usize,
}

impl Validator {
    /// Resolve the columns the rules read. A missing column is fatal schema drift.
    pub fn for_schema(schema: &RawSchema) -> Result<Self> {
        let column = |name: &str| {
            schema.index_of(name).ok_or_else(|| EtlError::SchemaDrift {
                stage: Stage::Validate,
                column: name.to_string(),
            })
        };

        Ok(Self {
            title: column(COL_TITLE)?,
            country: column(COL_COUNTRY)?,
            view_count: column(COL_VIEW_COUNT)?,
            video_id: column(COL_VIDEO_ID)?,
            snapshot_date: column(COL_SNAPSHOT_DATE)?,
        })
    }

    pub fn validate(&self, records: Vec<RawRecord>) -> ValidationOutcome {
        let mut report = StageReport::new(Stage::Validate, records.len());

        let records = drop_exact_duplicates(records, &mut report);
        let records = self.drop_repeated_observations(records, &mut report);
        let records: Vec<RawRecord> = records
            .into_iter()
            .filter(|record| match self.missing_required(record) {
                Some(rule) => {
                    report.reject(rule);
                    false
                }
                None => true,
            })
            .collect();

        let report = report.finish(records.len());
        ValidationOutcome { records, report }
    }

    fn drop_repeated_observations(
        &self,
        records: Vec<RawRecord>,
        report: &mut StageReport,
    ) -> Vec<RawRecord> {
        let mut seen: HashSet<(Option<String>, Option<String>)> = HashSet::with_capacity(records.len());
        records
            .into_iter()
            .filter(|record| {
                let key = (
                    record.get(self.video_id).map(|v| v.trim().to_string()),
                    record.get(self.snapshot_date).map(snapshot_key),
                );
                if seen.insert(key) {
                    true
                } else {
                    report.reject(RejectionRule::DuplicateObservation);
                    false
                }
            })
            .collect()
    }

    /// The first required-field rule a row breaks, checked title, country, view count
    fn missing_required(&self, record: &RawRecord) -> Option<RejectionRule> {
        if non_blank(record.get(self.title)).is_none() {
            return Some(RejectionRule::MissingTitle);
        }
        if non_blank(record.get(self.country)).is_none() {
            return Some(RejectionRule::MissingCountry);
        }
        if parse_count(record.get(self.view_count)).is_none() {
            return Some(RejectionRule::MissingViewCount);
        }
        None
    }
}

/// The snapshot day a cell denotes, so differently formatted texts for the same day collide.
/// Unparseable text is kept verbatim and left for the normalizer to drop.
fn snapshot_key(value: &str) -> String {
    parse_snapshot_date(value)
        .map(|date| date.to_string())
        .unwrap_or_else(|| value.trim().to_string())
}

fn drop_exact_duplicates(records: Vec<RawRecord>, report: &mut StageReport) -> Vec<RawRecord> {
    let mut seen: HashSet<RawRecord> = HashSet::with_capacity(records.len());
    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        if seen.contains(&record) {
            report.reject(RejectionRule::ExactDuplicate);
        } else {
            seen.insert(record.clone());
            kept.push(record);
        }
    }
    kept
}
