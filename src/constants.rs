/// Canonical column names of the trending-video snapshot dataset.
/// Every stage refers to columns through these constants.
pub const COL_TITLE: &str = "title";
pub const COL_CHANNEL_NAME: &str = "channel_name";
pub const COL_DAILY_RANK: &str = "daily_rank";
pub const COL_DAILY_MOVEMENT: &str = "daily_movement";
pub const COL_WEEKLY_MOVEMENT: &str = "weekly_movement";
pub const COL_SNAPSHOT_DATE: &str = "snapshot_date";
pub const COL_COUNTRY: &str = "country";
pub const COL_VIEW_COUNT: &str = "view_count";
pub const COL_LIKE_COUNT: &str = "like_count";
pub const COL_COMMENT_COUNT: &str = "comment_count";
pub const COL_DESCRIPTION: &str = "description";
pub const COL_THUMBNAIL_URL: &str = "thumbnail_url";
pub const COL_VIDEO_ID: &str = "video_id";
pub const COL_CHANNEL_ID: &str = "channel_id";
pub const COL_VIDEO_TAGS: &str = "video_tags";
pub const COL_KIND: &str = "kind";
pub const COL_PUBLISH_DATE: &str = "publish_date";
pub const COL_LANGUAGE: &str = "language";

/// Columns the source must provide (after typo renames) for the run to proceed.
pub const CANONICAL_COLUMNS: [&str; 18] = [
    COL_TITLE,
    COL_CHANNEL_NAME,
    COL_DAILY_RANK,
    COL_DAILY_MOVEMENT,
    COL_WEEKLY_MOVEMENT,
    COL_SNAPSHOT_DATE,
    COL_COUNTRY,
    COL_VIEW_COUNT,
    COL_LIKE_COUNT,
    COL_COMMENT_COUNT,
    COL_DESCRIPTION,
    COL_THUMBNAIL_URL,
    COL_VIDEO_ID,
    COL_CHANNEL_ID,
    COL_VIDEO_TAGS,
    COL_KIND,
    COL_PUBLISH_DATE,
    COL_LANGUAGE,
];

/// Version tag of [`COLUMN_RENAMES`]. Bump whenever an entry is added or removed.
pub const COLUMN_RENAMES_VERSION: &str = "renames-v1";

/// Known, stable misspellings in the upstream export mapped to their canonical name.
/// Anything not listed here is schema drift, never guessed at.
pub const COLUMN_RENAMES: &[(&str, &str)] = &[("langauge", COL_LANGUAGE)];

// Derived feature columns
pub const COL_TITLE_LENGTH_CHARS: &str = "title_length_chars";
pub const COL_TITLE_WORD_COUNT: &str = "title_word_count";
pub const COL_TITLE_HAS_EMOJI: &str = "title_has_emoji";
pub const COL_TITLE_HAS_QUESTION: &str = "title_has_question";
pub const COL_TITLE_SENTIMENT: &str = "title_sentiment";
pub const COL_LIKE_RATIO: &str = "like_ratio";
pub const COL_COMMENT_RATIO: &str = "comment_ratio";
pub const COL_DAYS_SINCE_PUBLISH: &str = "days_since_publish";
pub const COL_PUBLISH_DAY_OF_WEEK: &str = "publish_day_of_week";
pub const COL_ENGAGEMENT_ANOMALY: &str = "engagement_anomaly";

/// Column order of the row-level enriched export.
pub const ENRICHED_COLUMNS: [&str; 28] = [
    COL_VIDEO_ID,
    COL_SNAPSHOT_DATE,
    COL_COUNTRY,
    COL_TITLE,
    COL_CHANNEL_NAME,
    COL_CHANNEL_ID,
    COL_DAILY_RANK,
    COL_DAILY_MOVEMENT,
    COL_WEEKLY_MOVEMENT,
    COL_VIEW_COUNT,
    COL_LIKE_COUNT,
    COL_COMMENT_COUNT,
    COL_DESCRIPTION,
    COL_THUMBNAIL_URL,
    COL_VIDEO_TAGS,
    COL_KIND,
    COL_PUBLISH_DATE,
    COL_LANGUAGE,
    COL_TITLE_LENGTH_CHARS,
    COL_TITLE_WORD_COUNT,
    COL_TITLE_HAS_EMOJI,
    COL_TITLE_HAS_QUESTION,
    COL_TITLE_SENTIMENT,
    COL_LIKE_RATIO,
    COL_COMMENT_RATIO,
    COL_DAYS_SINCE_PUBLISH,
    COL_PUBLISH_DAY_OF_WEEK,
    COL_ENGAGEMENT_ANOMALY,
];

/// Column order of the aggregate export, after the leading group-key column.
pub const AGGREGATE_STAT_COLUMNS: [&str; 19] = [
    "count",
    "mean_view_count",
    "median_view_count",
    "mean_title_length_chars",
    "median_title_length_chars",
    "mean_title_word_count",
    "median_title_word_count",
    "mean_title_sentiment",
    "median_title_sentiment",
    "emoji_share",
    "question_share",
    "like_ratio_count",
    "mean_like_ratio",
    "median_like_ratio",
    "comment_ratio_count",
    "mean_comment_ratio",
    "median_comment_ratio",
    "mean_days_since_publish",
    "median_days_since_publish",
];

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// Default output file names
pub const DEFAULT_ROWS_FILE: &str = "trending_enriched.csv";
pub const DEFAULT_AGGREGATES_FILE: &str = "trending_by_group.csv";
pub const DEFAULT_REPORT_FILE: &str = "run_report.json";
pub const DEFAULT_METRICS_FILE: &str = "metrics.prom";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "TRENDING_ETL_";
