use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A validated, normalized trending observation.
///
/// Text fields are trimmed, dates are parsed, and `publish_date` is a naive timestamp in UTC.
/// Numeric fields hold exactly what the source reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub video_id: Option<String>,
    pub snapshot_date: NaiveDate,
    pub country: String,
    pub title: String,
    pub channel_name: Option<String>,
    pub channel_id: Option<String>,
    pub daily_rank: Option<i64>,
    pub daily_movement: Option<i64>,
    pub weekly_movement: Option<i64>,
    /// Present by construction; zero is resolved to "missing" by the feature engine
    pub view_count: u64,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    /// Empty string when the source had no description
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub video_tags: Option<String>,
    pub kind: Option<String>,
    pub publish_date: NaiveDateTime,
    pub language: Option<String>,
}

/// Features derived from a single [`Record`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub title_length_chars: usize,
    pub title_word_count: usize,
    pub title_has_emoji: bool,
    pub title_has_question: bool,
    /// Polarity in [-1.0, 1.0]
    pub title_sentiment: f64,
    /// Absent when likes or views are zero/missing
    pub like_ratio: Option<f64>,
    /// Absent when comments or views are zero/missing
    pub comment_ratio: Option<f64>,
    pub days_since_publish: i64,
    pub publish_day_of_week: String,
    /// A defined ratio above 1.0. The ratio itself is left untouched.
    pub engagement_anomaly: bool,
}

/// A record together with its derived features. Built once, never mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub record: Record,
    pub features: Features,
}

impl EnrichedRecord {
    pub fn new(record: Record, features: Features) -> Self {
        Self { record, features }
    }
}

/// Mean/median summary over the defined values of one numeric feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of defined values the statistics were computed over
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

/// Per-group statistics over the enriched rows sharing one grouping key value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
    pub key: String,
    pub count: usize,
    pub view_count: Summary,
    pub title_length_chars: Summary,
    pub title_word_count: Summary,
    pub title_sentiment: Summary,
    pub emoji_share: f64,
    pub question_share: f64,
    pub like_ratio: Summary,
    pub comment_ratio: Summary,
    pub days_since_publish: Summary,
}
