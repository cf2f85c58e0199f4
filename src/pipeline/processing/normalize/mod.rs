use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::constants::*;
use crate::domain::Record;
use crate::error::{EtlError, Result};
use crate::pipeline::ingestion::{RawRecord, RawSchema};
use crate::pipeline::processing::cells::{non_blank, parse_count, parse_int};
use crate::pipeline::report::{RejectionRule, Stage, StageReport};

/// Normalized records plus drop counts for unparseable temporal fields
#[derive(Debug)]
pub struct NormalizeOutcome {
    pub records: Vec<Record>,
    pub report: StageReport,
}

/// Apply the fixed typo table to a schema.
///
/// A typo'd column is renamed only when its canonical name is not already present;
/// otherwise the canonical column wins and the typo'd one is ignored.
pub fn rename_columns(schema: &RawSchema) -> RawSchema {
    let columns = schema
        .columns()
        .iter()
        .map(|column| {
            COLUMN_RENAMES
                .iter()
                .find(|(typo, canonical)| column.as_str() == *typo && schema.index_of(canonical).is_none())
                .map(|(_, canonical)| canonical.to_string())
                .unwrap_or_else(|| column.clone())
        })
        .collect();
    RawSchema::new(columns)
}

#[derive(Debug, Clone)]
struct ColumnIndex {
    title: usize,
    channel_name: usize,
    daily_rank: usize,
    daily_movement: usize,
    weekly_movement: usize,
    snapshot_date: usize,
    country: usize,
    view_count: usize,
    like_count: usize,
    comment_count: usize,
    description: usize,
    thumbnail_url: usize,
    video_id: usize,
    channel_id: usize,
    video_tags: usize,
    kind: usize,
    publish_date: usize,
    language: usize,
}

/// Turns validated raw rows into typed [`Record`]s.
///
/// Trims the free-text fields, defaults `description` to an empty string, and parses the
/// two temporal fields. Numeric cells are decoded, never adjusted.
#[derive(Debug, Clone)]
pub struct Normalizer {
    columns: ColumnIndex,
}

impl Normalizer {
    /// Resolve every canonical column after renames. A column that is still missing is
    /// fatal schema drift.
    pub fn for_schema(schema: &RawSchema) -> Result<Self> {
        let renamed = rename_columns(schema);
        for (typo, canonical) in COLUMN_RENAMES {
            if schema.index_of(typo).is_some() && schema.index_of(canonical).is_none() {
                debug!(from = %typo, to = %canonical, version = COLUMN_RENAMES_VERSION, "renamed column");
            }
        }

        let column = |name: &str| {
            renamed.index_of(name).ok_or_else(|| EtlError::SchemaDrift {
                stage: Stage::Normalize,
                column: name.to_string(),
            })
        };

        Ok(Self {
            columns: ColumnIndex {
                title: column(COL_TITLE)?,
                channel_name: column(COL_CHANNEL_NAME)?,
                daily_rank: column(COL_DAILY_RANK)?,
                daily_movement: column(COL_DAILY_MOVEMENT)?,
                weekly_movement: column(COL_WEEKLY_MOVEMENT)?,
                snapshot_date: column(COL_SNAPSHOT_DATE)?,
                country: column(COL_COUNTRY)?,
                view_count: column(COL_VIEW_COUNT)?,
                like_count: column(COL_LIKE_COUNT)?,
                comment_count: column(COL_COMMENT_COUNT)?,
                description: column(COL_DESCRIPTION)?,
                thumbnail_url: column(COL_THUMBNAIL_URL)?,
                video_id: column(COL_VIDEO_ID)?,
                channel_id: column(COL_CHANNEL_ID)?,
                video_tags: column(COL_VIDEO_TAGS)?,
                kind: column(COL_KIND)?,
                publish_date: column(COL_PUBLISH_DATE)?,
                language: column(COL_LANGUAGE)?,
            },
        })
    }

    pub fn normalize(&self, records: Vec<RawRecord>) -> NormalizeOutcome {
        let mut report = StageReport::new(Stage::Normalize, records.len());
        let mut normalized = Vec::with_capacity(records.len());

        for record in &records {
            match self.normalize_record(record) {
                Ok(record) => normalized.push(record),
                Err(rule) => report.reject(rule),
            }
        }

        let report = report.finish(normalized.len());
        NormalizeOutcome {
            records: normalized,
            report,
        }
    }

    fn normalize_record(&self, raw: &RawRecord) -> std::result::Result<Record, RejectionRule> {
        let c = &self.columns;

        // Guaranteed by the validator; checked again so the stage is total on its own.
        let title = non_blank(raw.get(c.title)).ok_or(RejectionRule::MissingTitle)?;
        let country = non_blank(raw.get(c.country)).ok_or(RejectionRule::MissingCountry)?;
        let view_count = parse_count(raw.get(c.view_count)).ok_or(RejectionRule::MissingViewCount)?;

        let snapshot_date = raw
            .get(c.snapshot_date)
            .and_then(parse_snapshot_date)
            .ok_or(RejectionRule::UnparseableSnapshotDate)?;
        let publish_date = raw
            .get(c.publish_date)
            .and_then(parse_publish_timestamp)
            .ok_or(RejectionRule::UnparseablePublishDate)?;

        let text = |index: usize| raw.get(index).map(str::to_string);

        Ok(Record {
            video_id: text(c.video_id),
            snapshot_date,
            country: country.to_string(),
            title: title.to_string(),
            channel_name: non_blank(raw.get(c.channel_name)).map(str::to_string),
            channel_id: text(c.channel_id),
            daily_rank: parse_int(raw.get(c.daily_rank)),
            daily_movement: parse_int(raw.get(c.daily_movement)),
            weekly_movement: parse_int(raw.get(c.weekly_movement)),
            view_count,
            like_count: parse_count(raw.get(c.like_count)),
            comment_count: parse_count(raw.get(c.comment_count)),
            description: raw.get(c.description).map(str::trim).unwrap_or_default().to_string(),
            thumbnail_url: text(c.thumbnail_url),
            video_tags: text(c.video_tags),
            kind: text(c.kind),
            publish_date,
            language: text(c.language),
        })
    }
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y"];

const OFFSET_TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Calendar date of the snapshot. Timestamps are accepted and reduced to their UTC date.
pub fn parse_snapshot_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| parse_publish_timestamp(value).map(|ts| ts.date()))
}

/// Publish timestamp as naive UTC. Offsets are converted; naive values are taken as UTC;
/// a bare date means midnight.
pub fn parse_publish_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_utc());
    }
    if let Some(ts) = OFFSET_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(value, format).ok())
    {
        return Some(ts.naive_utc());
    }
    if let Some(ts) = NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        return Some(ts);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_schema(language_column: &str) -> RawSchema {
        let mut columns: Vec<String> = CANONICAL_COLUMNS
            .iter()
            .filter(|c| **c != COL_LANGUAGE)
            .map(|c| c.to_string())
            .collect();
        columns.push(language_column.to_string());
        RawSchema::new(columns)
    }

    fn raw_row(schema: &RawSchema, values: &[(&str, &str)]) -> RawRecord {
        let cells: Vec<&str> = schema
            .columns()
            .iter()
            .map(|column| {
                values
                    .iter()
                    .find(|(name, _)| *name == column.as_str())
                    .map(|(_, value)| *value)
                    .unwrap_or("")
            })
            .collect();
        RawRecord::from_cells(cells)
    }

    fn base_values() -> Vec<(&'static str, &'static str)> {
        vec![
            ("title", "  Big Reveal  "),
            ("channel_name", " Studio "),
            ("country", "US"),
            ("view_count", "1000"),
            ("like_count", "50"),
            ("snapshot_date", "2025-07-25"),
            ("publish_date", "2025-07-20 15:30:00+00:00"),
            ("video_id", "abc123"),
            ("daily_rank", "3"),
            ("daily_movement", "-2"),
        ]
    }

    #[test]
    fn typo_column_is_renamed() {
        let schema = full_schema("langauge");
        let renamed = rename_columns(&schema);
        assert!(renamed.index_of("language").is_some());
        assert!(renamed.index_of("langauge").is_none());
        assert!(Normalizer::for_schema(&schema).is_ok());
    }

    #[test]
    fn canonical_column_wins_over_typo() {
        let mut columns = full_schema("language").columns().to_vec();
        columns.push("langauge".to_string());
        let renamed = rename_columns(&RawSchema::new(columns));
        assert_eq!(
            renamed.columns().iter().filter(|c| *c == "language").count(),
            1
        );
        assert!(renamed.index_of("langauge").is_some());
    }

    #[test]
    fn unknown_misspelling_is_schema_drift() {
        let schema = full_schema("lang");
        match Normalizer::for_schema(&schema).unwrap_err() {
            EtlError::SchemaDrift { stage, column } => {
                assert_eq!(stage, Stage::Normalize);
                assert_eq!(column, "language");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn text_is_trimmed_and_description_defaults_to_empty() {
        let schema = full_schema("langauge");
        let normalizer = Normalizer::for_schema(&schema).unwrap();
        let mut values = base_values();
        values.push(("langauge", "en"));

        let outcome = normalizer.normalize(vec![raw_row(&schema, &values)]);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.title, "Big Reveal");
        assert_eq!(record.channel_name.as_deref(), Some("Studio"));
        assert_eq!(record.description, "");
        assert_eq!(record.language.as_deref(), Some("en"));
        assert_eq!(record.view_count, 1000);
        assert_eq!(record.like_count, Some(50));
        assert_eq!(record.comment_count, None);
        assert_eq!(record.daily_movement, Some(-2));
        assert_eq!(record.snapshot_date, NaiveDate::from_ymd_opt(2025, 7, 25).unwrap());
    }

    #[test]
    fn padded_country_is_stored_trimmed() {
        let schema = full_schema("language");
        let normalizer = Normalizer::for_schema(&schema).unwrap();
        let mut values = base_values();
        values.retain(|(name, _)| *name != "country");
        values.push(("country", " US "));

        let outcome = normalizer.normalize(vec![raw_row(&schema, &values)]);
        assert_eq!(outcome.records[0].country, "US");
    }

    #[test]
    fn unparseable_dates_are_dropped_and_counted() {
        let schema = full_schema("language");
        let normalizer = Normalizer::for_schema(&schema).unwrap();

        let mut bad_snapshot = base_values();
        bad_snapshot.retain(|(k, _)| *k != "snapshot_date");
        bad_snapshot.push(("snapshot_date", "yesterday"));

        let mut bad_publish = base_values();
        bad_publish.retain(|(k, _)| *k != "publish_date");
        bad_publish.push(("publish_date", "soon"));

        let outcome = normalizer.normalize(vec![
            raw_row(&schema, &bad_snapshot),
            raw_row(&schema, &bad_publish),
            raw_row(&schema, &base_values()),
        ]);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.report.rejected(RejectionRule::UnparseableSnapshotDate), 1);
        assert_eq!(outcome.report.rejected(RejectionRule::UnparseablePublishDate), 1);
    }

    #[test]
    fn publish_timestamps_are_normalized_to_utc() {
        let expected = NaiveDate::from_ymd_opt(2025, 7, 20)
            .unwrap()
            .and_hms_opt(13, 30, 0)
            .unwrap();

        assert_eq!(parse_publish_timestamp("2025-07-20T15:30:00+02:00"), Some(expected));
        assert_eq!(parse_publish_timestamp("2025-07-20 15:30:00+02:00"), Some(expected));
        assert_eq!(parse_publish_timestamp("2025-07-20T13:30:00Z"), Some(expected));
        assert_eq!(parse_publish_timestamp("2025-07-20 13:30:00"), Some(expected));
        assert_eq!(
            parse_publish_timestamp("2025-07-20"),
            NaiveDate::from_ymd_opt(2025, 7, 20).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(parse_publish_timestamp("not a date"), None);
    }

    #[test]
    fn snapshot_accepts_timestamp_text() {
        assert_eq!(
            parse_snapshot_date("2025-07-25 00:00:00"),
            NaiveDate::from_ymd_opt(2025, 7, 25)
        );
        assert_eq!(parse_snapshot_date("2025-13-40"), None);
    }
}
