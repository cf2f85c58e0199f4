use std::time::Instant;

use tracing::{info, instrument};

use crate::domain::{EnrichedRecord, GroupAggregate};
use crate::error::Result;
use crate::pipeline::ingestion::RawTable;
use crate::pipeline::processing::{aggregate, FeatureEngine, GroupKey, Normalizer, Validator};
use crate::pipeline::report::{Stage, StageReport};

/// Everything the transform produced, held in memory until both tables can be written
#[derive(Debug)]
pub struct TransformOutput {
    pub records: Vec<EnrichedRecord>,
    pub aggregates: Vec<GroupAggregate>,
    pub stages: Vec<StageReport>,
    pub engagement_anomalies: usize,
    pub aggregate_excluded: usize,
}

/// The synchronous part of a run: validate, normalize, enrich, aggregate.
///
/// Each stage consumes the previous stage's output. A schema error stops the run before the
/// failing stage touches any row.
pub struct Pipeline {
    engine: FeatureEngine,
    group_key: GroupKey,
}

impl Pipeline {
    pub fn new(engine: FeatureEngine, group_key: GroupKey) -> Self {
        Self { engine, group_key }
    }

    pub fn group_key(&self) -> GroupKey {
        self.group_key
    }

    pub fn sentiment_version(&self) -> &str {
        self.engine.sentiment_version()
    }

    #[instrument(skip(self, raw), fields(rows = raw.len(), group_key = %self.group_key))]
    pub fn transform(&self, raw: RawTable) -> Result<TransformOutput> {
        let mut stages = Vec::with_capacity(4);

        let t_stage = Instant::now();
        let validator = Validator::for_schema(&raw.schema)?;
        let validated = validator.validate(raw.records);
        finish_stage(&mut stages, validated.report, t_stage);

        let t_stage = Instant::now();
        let normalizer = Normalizer::for_schema(&raw.schema)?;
        let normalized = normalizer.normalize(validated.records);
        finish_stage(&mut stages, normalized.report, t_stage);

        let t_stage = Instant::now();
        let enriched = self.engine.enrich(normalized.records);
        finish_stage(&mut stages, enriched.report, t_stage);

        let t_stage = Instant::now();
        let aggregated = aggregate(&enriched.records, self.group_key);
        crate::metrics::stage::duration(Stage::Aggregate, t_stage.elapsed().as_secs_f64());

        info!(
            rows = enriched.records.len(),
            groups = aggregated.aggregates.len(),
            "transform complete"
        );

        Ok(TransformOutput {
            records: enriched.records,
            aggregates: aggregated.aggregates,
            stages,
            engagement_anomalies: enriched.engagement_anomalies,
            aggregate_excluded: aggregated.excluded,
        })
    }
}

fn finish_stage(stages: &mut Vec<StageReport>, report: StageReport, started: Instant) {
    crate::metrics::stage::duration(report.stage, started.elapsed().as_secs_f64());
    report.record();
    stages.push(report);
}
