use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use tracing::{debug, warn};

use crate::domain::{EnrichedRecord, Features, Record};
use crate::pipeline::report::{RejectionRule, Stage, StageReport};

pub mod emoji;
pub mod sentiment;

pub use emoji::{EmojiDetector, UnicodeEmojiDetector};
pub use sentiment::{LexiconSentimentScorer, SentimentScorer};

const SECONDS_PER_DAY: i64 = 86_400;

/// Enriched records plus the rows dropped for an undefined view count
#[derive(Debug)]
pub struct EnrichOutcome {
    pub records: Vec<EnrichedRecord>,
    pub report: StageReport,
    /// Rows carrying a like or comment ratio above 1.0
    pub engagement_anomalies: usize,
}

/// Derives per-record features. Holds no mutable state, so the same engine applied to the
/// same records always yields the same features.
pub struct FeatureEngine {
    sentiment: Box<dyn SentimentScorer>,
    emoji: Box<dyn EmojiDetector>,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new(
            Box::new(LexiconSentimentScorer::new()),
            Box::new(UnicodeEmojiDetector),
        )
    }
}

impl FeatureEngine {
    pub fn new(sentiment: Box<dyn SentimentScorer>, emoji: Box<dyn EmojiDetector>) -> Self {
        Self { sentiment, emoji }
    }

    pub fn sentiment_version(&self) -> &str {
        self.sentiment.version()
    }

    /// Compute the features of a single record
    pub fn derive(&self, record: &Record) -> Features {
        let title = record.title.trim();
        let like_ratio = engagement_ratio(record.like_count, record.view_count);
        let comment_ratio = engagement_ratio(record.comment_count, record.view_count);
        let engagement_anomaly = [like_ratio, comment_ratio]
            .iter()
            .flatten()
            .any(|ratio| *ratio > 1.0);

        Features {
            title_length_chars: title.chars().count(),
            title_word_count: title.split_whitespace().count(),
            title_has_emoji: self.emoji.contains_emoji(title),
            title_has_question: title.contains('?'),
            title_sentiment: bounded_score(self.sentiment.score(title)),
            like_ratio,
            comment_ratio,
            days_since_publish: days_since_publish(record.snapshot_date, record.publish_date),
            publish_day_of_week: weekday_name(record.publish_date.weekday()).to_string(),
            engagement_anomaly,
        }
    }

    /// Derive features for every record, then drop the rows whose view count is zero
    pub fn enrich(&self, records: Vec<Record>) -> EnrichOutcome {
        let mut report = StageReport::new(Stage::Enrich, records.len());
        let mut engagement_anomalies = 0;

        let mut enriched = Vec::with_capacity(records.len());
        for record in records {
            let features = self.derive(&record);
            if record.view_count == 0 {
                report.reject(RejectionRule::MissingViewCount);
                continue;
            }
            if features.engagement_anomaly {
                engagement_anomalies += 1;
            }
            enriched.push(EnrichedRecord::new(record, features));
        }

        if engagement_anomalies > 0 {
            warn!(count = engagement_anomalies, "engagement ratios above 1.0 flagged");
            crate::metrics::features::engagement_anomalies(engagement_anomalies);
        }
        debug!(scorer = self.sentiment.version(), rows = enriched.len(), "features derived");

        let report = report.finish(enriched.len());
        EnrichOutcome {
            records: enriched,
            report,
            engagement_anomalies,
        }
    }
}

/// `numerator / views`, undefined when either side is zero or missing
fn engagement_ratio(numerator: Option<u64>, views: u64) -> Option<f64> {
    match numerator {
        Some(n) if n > 0 && views > 0 => Some(n as f64 / views as f64),
        _ => None,
    }
}

fn bounded_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Whole days from publish to the start of the snapshot day, rounded toward negative infinity
pub fn days_since_publish(snapshot: NaiveDate, published: NaiveDateTime) -> i64 {
    let snapshot_start = snapshot.and_hms_opt(0, 0, 0).unwrap_or_default();
    (snapshot_start - published)
        .num_seconds()
        .div_euclid(SECONDS_PER_DAY)
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
