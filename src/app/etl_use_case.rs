use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app::ports::{RecordSourcePort, TableWriterPort};
use crate::constants::COLUMN_RENAMES_VERSION;
use crate::error::Result;
use crate::pipeline::export::{aggregate_table, enriched_table};
use crate::pipeline::report::{RunReport, Stage, StageReport};
use crate::pipeline::Pipeline;

/// Destination files of one run
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub rows: PathBuf,
    pub aggregates: PathBuf,
    pub report: PathBuf,
}

/// Runs source → transform → export and writes the run report.
///
/// Nothing is written until the whole transform has succeeded. Both tables and the report are
/// staged together and replace the previous run's files in one commit, or not at all.
pub struct EtlUseCase {
    source: Box<dyn RecordSourcePort>,
    pipeline: Pipeline,
    writer: Box<dyn TableWriterPort>,
}

impl EtlUseCase {
    pub fn new(
        source: Box<dyn RecordSourcePort>,
        pipeline: Pipeline,
        writer: Box<dyn TableWriterPort>,
    ) -> Self {
        Self {
            source,
            pipeline,
            writer,
        }
    }

    #[instrument(skip(self, outputs), fields(source = %self.source.describe()))]
    pub async fn run(&self, outputs: &OutputPaths) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let source_name = self.source.describe();
        info!(%run_id, source = %source_name, "run started");
        crate::metrics::run_started(&source_name);

        let t_fetch = Instant::now();
        let raw = self.source.fetch_raw_rows().await?;
        crate::metrics::stage::duration(Stage::Source, t_fetch.elapsed().as_secs_f64());
        let source_report = StageReport::new(Stage::Source, raw.len()).finish(raw.len());
        source_report.record();

        let output = self.pipeline.transform(raw)?;

        let rows_table = enriched_table(&output.records);
        let aggregates_table = aggregate_table(&output.aggregates, self.pipeline.group_key());

        let t_export = Instant::now();
        let mut batch = self.writer.begin();
        let outputs_written = vec![
            batch.stage_table(&outputs.rows, &rows_table)?,
            batch.stage_table(&outputs.aggregates, &aggregates_table)?,
        ];

        let mut stages = vec![source_report];
        stages.extend(output.stages);

        let report = RunReport {
            run_id,
            source: source_name,
            started_at,
            finished_at: Some(Utc::now()),
            group_key: self.pipeline.group_key().column_name().to_string(),
            column_renames_version: COLUMN_RENAMES_VERSION.to_string(),
            sentiment_scorer: self.pipeline.sentiment_version().to_string(),
            stages,
            engagement_anomalies: output.engagement_anomalies,
            aggregate_excluded: output.aggregate_excluded,
            outputs: outputs_written,
        };

        let json = serde_json::to_vec_pretty(&report)?;
        batch.stage_bytes(&outputs.report, &json)?;
        batch.commit()?;
        crate::metrics::stage::duration(Stage::Export, t_export.elapsed().as_secs_f64());
        report.log_summary();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::OutputBatch;
    use crate::error::EtlError;
    use crate::infra::CsvTableStore;
    use crate::pipeline::export::Table;
    use crate::pipeline::report::OutputDigest;
    use crate::pipeline::ingestion::{read_csv, RawTable};
    use crate::pipeline::processing::{FeatureEngine, GroupKey};
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct StaticSource(&'static str);

    #[async_trait]
    impl RecordSourcePort for StaticSource {
        async fn fetch_raw_rows(&self) -> Result<RawTable> {
            read_csv(self.0.as_bytes())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    fn paths(dir: &std::path::Path) -> OutputPaths {
        OutputPaths {
            rows: dir.join("rows.csv"),
            aggregates: dir.join("groups.csv"),
            report: dir.join("report.json"),
        }
    }

    #[tokio::test]
    async fn writes_both_tables_and_report() {
        let data = "title,channel_name,daily_rank,daily_movement,weekly_movement,snapshot_date,country,view_count,like_count,comment_count,description,thumbnail_url,video_id,channel_id,video_tags,kind,publish_date,language\n\
                    Hello,Chan,1,0,0,2025-07-25,US,100,5,1,,,a1,c1,,youtube#video,2025-07-20T10:00:00Z,en\n";
        let dir = tempdir().unwrap();
        let use_case = EtlUseCase::new(
            Box::new(StaticSource(data)),
            Pipeline::new(FeatureEngine::default(), GroupKey::Country),
            Box::new(CsvTableStore::new()),
        );

        let report = use_case.run(&paths(dir.path())).await.unwrap();
        assert_eq!(report.outputs.len(), 2);
        assert_eq!(report.outputs[0].rows, 1);
        assert_eq!(report.stage(Stage::Source).map(|s| s.rows_out), Some(1));
        assert!(dir.path().join("rows.csv").exists());
        assert!(dir.path().join("groups.csv").exists());

        let saved: RunReport =
            serde_json::from_slice(&std::fs::read(dir.path().join("report.json")).unwrap()).unwrap();
        assert_eq!(saved.run_id, report.run_id);
        assert_eq!(saved.group_key, "country");
    }

    /// Store whose batches refuse to stage one destination
    struct FailingOn(std::path::PathBuf);

    struct FailingBatch {
        inner: Box<dyn OutputBatch>,
        fail_on: std::path::PathBuf,
    }

    impl TableWriterPort for FailingOn {
        fn begin(&self) -> Box<dyn OutputBatch> {
            Box::new(FailingBatch {
                inner: CsvTableStore::new().begin(),
                fail_on: self.0.clone(),
            })
        }
    }

    impl OutputBatch for FailingBatch {
        fn stage_table(&mut self, path: &std::path::Path, table: &Table) -> Result<OutputDigest> {
            if path == self.fail_on {
                return Err(EtlError::WriteFailure {
                    stage: Stage::Export,
                    path: path.to_path_buf(),
                    reason: "disk full".to_string(),
                });
            }
            self.inner.stage_table(path, table)
        }

        fn stage_bytes(&mut self, path: &std::path::Path, bytes: &[u8]) -> Result<()> {
            self.inner.stage_bytes(path, bytes)
        }

        fn commit(self: Box<Self>) -> Result<()> {
            self.inner.commit()
        }
    }

    #[tokio::test]
    async fn failed_aggregate_write_leaves_previous_outputs() {
        let data = "title,channel_name,daily_rank,daily_movement,weekly_movement,snapshot_date,country,view_count,like_count,comment_count,description,thumbnail_url,video_id,channel_id,video_tags,kind,publish_date,language\n\
                    Hello,Chan,1,0,0,2025-07-25,US,100,5,1,,,a1,c1,,youtube#video,2025-07-20T10:00:00Z,en\n";
        let dir = tempdir().unwrap();
        let paths = paths(dir.path());
        std::fs::write(&paths.rows, "OLD ROWS\n").unwrap();
        std::fs::write(&paths.aggregates, "OLD AGG\n").unwrap();

        let use_case = EtlUseCase::new(
            Box::new(StaticSource(data)),
            Pipeline::new(FeatureEngine::default(), GroupKey::Country),
            Box::new(FailingOn(paths.aggregates.clone())),
        );

        let err = use_case.run(&paths).await.unwrap_err();
        assert!(matches!(err, EtlError::WriteFailure { .. }));
        assert_eq!(std::fs::read_to_string(&paths.rows).unwrap(), "OLD ROWS\n");
        assert_eq!(std::fs::read_to_string(&paths.aggregates).unwrap(), "OLD AGG\n");
        assert!(!paths.report.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn schema_drift_writes_nothing() {
        let dir = tempdir().unwrap();
        let use_case = EtlUseCase::new(
            Box::new(StaticSource("title,country\nHello,US\n")),
            Pipeline::new(FeatureEngine::default(), GroupKey::Country),
            Box::new(CsvTableStore::new()),
        );

        let err = use_case.run(&paths(dir.path())).await.unwrap_err();
        assert!(matches!(err, EtlError::SchemaDrift { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
