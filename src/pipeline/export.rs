//! Flattening of enriched rows and aggregates into delimited tables.
//!
//! Column order is fixed by [`ENRICHED_COLUMNS`] and [`AGGREGATE_STAT_COLUMNS`]. Absent values
//! become empty cells and floats use Rust's shortest round-trip formatting, so equal inputs
//! always encode to identical bytes.

use std::io::Read;

use crate::constants::{AGGREGATE_STAT_COLUMNS, DATE_FORMAT, ENRICHED_COLUMNS, TIMESTAMP_FORMAT};
use crate::domain::{EnrichedRecord, GroupAggregate, Summary};
use crate::error::Result;
use crate::pipeline::processing::GroupKey;

/// A header row plus string cells, the unit the table reader and writer exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Every cell of a named column, in row order
    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let index = self.column(name)?;
        Some(
            self.rows
                .iter()
                .map(move |row| row.get(index).map(String::as_str).unwrap_or("")),
        )
    }

    /// Serialize with a header row, `\n` line endings and minimal quoting
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.into_inner().map_err(|e| e.into_error().into())
    }

    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(headers);
        for row in reader.records() {
            table.rows.push(row?.iter().map(str::to_string).collect());
        }
        Ok(table)
    }
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn number<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Row-level table: every canonical field followed by the derived features
pub fn enriched_table(records: &[EnrichedRecord]) -> Table {
    let mut table = Table::new(ENRICHED_COLUMNS.iter().map(|c| c.to_string()).collect());
    for enriched in records {
        let r = &enriched.record;
        let f = &enriched.features;
        table.rows.push(vec![
            text(r.video_id.as_deref()),
            r.snapshot_date.format(DATE_FORMAT).to_string(),
            r.country.clone(),
            r.title.clone(),
            text(r.channel_name.as_deref()),
            text(r.channel_id.as_deref()),
            number(r.daily_rank),
            number(r.daily_movement),
            number(r.weekly_movement),
            r.view_count.to_string(),
            number(r.like_count),
            number(r.comment_count),
            r.description.clone(),
            text(r.thumbnail_url.as_deref()),
            text(r.video_tags.as_deref()),
            text(r.kind.as_deref()),
            r.publish_date.format(TIMESTAMP_FORMAT).to_string(),
            text(r.language.as_deref()),
            f.title_length_chars.to_string(),
            f.title_word_count.to_string(),
            f.title_has_emoji.to_string(),
            f.title_has_question.to_string(),
            f.title_sentiment.to_string(),
            number(f.like_ratio),
            number(f.comment_ratio),
            f.days_since_publish.to_string(),
            f.publish_day_of_week.clone(),
            f.engagement_anomaly.to_string(),
        ]);
    }
    table
}

fn mean_median(summary: &Summary) -> [String; 2] {
    [number(summary.mean), number(summary.median)]
}

/// Aggregate table: the group key column followed by the per-group statistics
pub fn aggregate_table(aggregates: &[GroupAggregate], key: GroupKey) -> Table {
    let headers = std::iter::once(key.column_name())
        .chain(AGGREGATE_STAT_COLUMNS.iter().copied())
        .map(str::to_string)
        .collect();
    let mut table = Table::new(headers);

    for group in aggregates {
        let mut row = vec![group.key.clone(), group.count.to_string()];
        row.extend(mean_median(&group.view_count));
        row.extend(mean_median(&group.title_length_chars));
        row.extend(mean_median(&group.title_word_count));
        row.extend(mean_median(&group.title_sentiment));
        row.push(group.emoji_share.to_string());
        row.push(group.question_share.to_string());
        row.push(group.like_ratio.count.to_string());
        row.extend(mean_median(&group.like_ratio));
        row.push(group.comment_ratio.count.to_string());
        row.extend(mean_median(&group.comment_ratio));
        row.extend(mean_median(&group.days_since_publish));
        table.rows.push(row);
    }
    table
}
