use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{COL_CHANNEL_NAME, COL_COUNTRY, COL_KIND, COL_LANGUAGE};
use crate::domain::{EnrichedRecord, GroupAggregate, Summary};
use crate::error::EtlError;

/// Column the aggregate table is grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    #[default]
    Country,
    Language,
    ChannelName,
    Kind,
}

impl GroupKey {
    pub fn column_name(&self) -> &'static str {
        match self {
            GroupKey::Country => COL_COUNTRY,
            GroupKey::Language => COL_LANGUAGE,
            GroupKey::ChannelName => COL_CHANNEL_NAME,
            GroupKey::Kind => COL_KIND,
        }
    }

    /// The key value of a record, `None` when null or blank
    pub fn value<'a>(&self, record: &'a EnrichedRecord) -> Option<&'a str> {
        let raw = match self {
            GroupKey::Country => Some(record.record.country.as_str()),
            GroupKey::Language => record.record.language.as_deref(),
            GroupKey::ChannelName => record.record.channel_name.as_deref(),
            GroupKey::Kind => record.record.kind.as_deref(),
        };
        raw.map(str::trim).filter(|v| !v.is_empty())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for GroupKey {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "country" => Ok(GroupKey::Country),
            "language" => Ok(GroupKey::Language),
            "channel_name" => Ok(GroupKey::ChannelName),
            "kind" => Ok(GroupKey::Kind),
            other => Err(EtlError::Config(format!(
                "unknown group key '{}' (expected country, language, channel_name or kind)",
                other
            ))),
        }
    }
}

impl Summary {
    /// Mean and median over `values`. Summed in the given order so the result is reproducible.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                mean: None,
                median: None,
            };
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Self {
            count: values.len(),
            mean: Some(mean),
            median: Some(median),
        }
    }
}

#[derive(Debug)]
pub struct AggregationOutcome {
    /// One entry per distinct key value, ascending by key
    pub aggregates: Vec<GroupAggregate>,
    /// Records left out because their key was null or blank
    pub excluded: usize,
}

/// Group enriched records by `key` and summarize each numeric feature per group
pub fn aggregate(records: &[EnrichedRecord], key: GroupKey) -> AggregationOutcome {
    let mut groups: BTreeMap<&str, Vec<&EnrichedRecord>> = BTreeMap::new();
    let mut excluded = 0;
    for record in records {
        match key.value(record) {
            Some(value) => groups.entry(value).or_default().push(record),
            None => excluded += 1,
        }
    }

    let aggregates: Vec<GroupAggregate> = groups
        .into_iter()
        .map(|(value, members)| summarize(value, &members))
        .collect();

    info!(key = %key, groups = aggregates.len(), excluded, "aggregated");
    crate::metrics::aggregate::groups(key.column_name(), aggregates.len());
    if excluded > 0 {
        crate::metrics::aggregate::excluded(key.column_name(), excluded);
    }

    AggregationOutcome {
        aggregates,
        excluded,
    }
}

fn summarize(key: &str, members: &[&EnrichedRecord]) -> GroupAggregate {
    let collect = |f: &dyn Fn(&EnrichedRecord) -> Option<f64>| -> Vec<f64> {
        members.iter().filter_map(|r| f(*r)).collect()
    };
    let share = |f: &dyn Fn(&EnrichedRecord) -> bool| -> f64 {
        members.iter().filter(|r| f(**r)).count() as f64 / members.len() as f64
    };

    GroupAggregate {
        key: key.to_string(),
        count: members.len(),
        view_count: Summary::of(&collect(&|r| Some(r.record.view_count as f64))),
        title_length_chars: Summary::of(&collect(&|r| Some(r.features.title_length_chars as f64))),
        title_word_count: Summary::of(&collect(&|r| Some(r.features.title_word_count as f64))),
        title_sentiment: Summary::of(&collect(&|r| Some(r.features.title_sentiment))),
        emoji_share: share(&|r| r.features.title_has_emoji),
        question_share: share(&|r| r.features.title_has_question),
        like_ratio: Summary::of(&collect(&|r| r.features.like_ratio)),
        comment_ratio: Summary::of(&collect(&|r| r.features.comment_ratio)),
        days_since_publish: Summary::of(&collect(&|r| Some(r.features.days_since_publish as f64))),
    }
}
