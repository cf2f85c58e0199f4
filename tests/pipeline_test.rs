use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::tempdir;

use trending_etl::app::etl_use_case::{EtlUseCase, OutputPaths};
use trending_etl::app::ports::TableReaderPort;
use trending_etl::app::verify_use_case::{VerifyTargets, VerifyUseCase};
use trending_etl::infra::{CsvFileSource, CsvTableStore};
use trending_etl::pipeline::export::Table;
use trending_etl::pipeline::processing::{FeatureEngine, GroupKey};
use trending_etl::pipeline::report::{RejectionRule, RunReport, Stage};
use trending_etl::pipeline::Pipeline;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/resources/trending_sample.csv")
}

fn outputs(dir: &Path) -> OutputPaths {
    OutputPaths {
        rows: dir.join("trending_enriched.csv"),
        aggregates: dir.join("trending_by_group.csv"),
        report: dir.join("run_report.json"),
    }
}

async fn run_into(dir: &Path, key: GroupKey) -> Result<RunReport> {
    let use_case = EtlUseCase::new(
        Box::new(CsvFileSource::new(fixture())),
        Pipeline::new(FeatureEngine::default(), key),
        Box::new(CsvTableStore::new()),
    );
    Ok(use_case.run(&outputs(dir)).await?)
}

fn row<'a>(table: &'a Table, video_id: &str) -> Option<&'a Vec<String>> {
    let id = table.column("video_id")?;
    table.rows.iter().find(|r| r[id] == video_id)
}

fn cell<'a>(table: &'a Table, video_id: &str, column: &str) -> &'a str {
    let row = row(table, video_id).expect("row present");
    &row[table.column(column).expect("column present")]
}

#[tokio::test]
async fn rejections_are_counted_per_stage_and_rule() -> Result<()> {
    let dir = tempdir()?;
    let report = run_into(dir.path(), GroupKey::Country).await?;

    let validate = report.stage(Stage::Validate).expect("validate stage");
    assert_eq!(validate.rows_in, 12);
    assert_eq!(validate.rejected(RejectionRule::ExactDuplicate), 1);
    assert_eq!(validate.rejected(RejectionRule::DuplicateObservation), 1);
    assert_eq!(validate.rejected(RejectionRule::MissingTitle), 1);
    assert_eq!(validate.rejected(RejectionRule::MissingCountry), 1);
    assert_eq!(validate.rows_out, 8);

    let normalize = report.stage(Stage::Normalize).expect("normalize stage");
    assert_eq!(normalize.rejected(RejectionRule::UnparseablePublishDate), 1);
    assert_eq!(normalize.rows_out, 7);

    let enrich = report.stage(Stage::Enrich).expect("enrich stage");
    assert_eq!(enrich.rejected(RejectionRule::MissingViewCount), 1);
    assert_eq!(enrich.rows_out, 6);

    for stage in &report.stages {
        assert_eq!(stage.rows_in - stage.rejected_total(), stage.rows_out);
    }
    assert_eq!(report.engagement_anomalies, 1);
    assert_eq!(report.column_renames_version, "renames-v1");
    assert_eq!(report.outputs[0].rows, 6);
    assert_eq!(report.outputs[1].rows, 4);
    Ok(())
}

#[tokio::test]
async fn row_level_scenarios() -> Result<()> {
    let dir = tempdir()?;
    run_into(dir.path(), GroupKey::Country).await?;
    let rows = CsvTableStore::new().read_table(&outputs(dir.path()).rows)?;

    // First observation of a (video_id, snapshot_date) pair wins
    assert_eq!(cell(&rows, "abc123", "title"), "Great news!!");
    assert_eq!(cell(&rows, "abc123", "daily_rank"), "1");
    assert_eq!(cell(&rows, "abc123", "description"), "Today's headlines, in brief");

    // Zero view count is dropped
    assert!(row(&rows, "q1").is_none());

    // Zero likes leave the like ratio empty
    assert_eq!(cell(&rows, "l0", "like_ratio"), "");
    assert_eq!(cell(&rows, "l0", "comment_ratio"), "0.03");
    assert_eq!(cell(&rows, "l0", "publish_date"), "2025-07-23T16:45:00");
    assert_eq!(cell(&rows, "l0", "days_since_publish"), "1");

    // Publish after snapshot keeps the row with a negative age
    assert_eq!(cell(&rows, "late1", "days_since_publish"), "-2");
    assert_eq!(cell(&rows, "late1", "publish_day_of_week"), "Saturday");

    // Ratios above one are flagged and kept as-is
    assert_eq!(cell(&rows, "anomaly", "like_ratio"), "2.5");
    assert_eq!(cell(&rows, "anomaly", "engagement_anomaly"), "true");
    assert_eq!(cell(&rows, "abc123", "engagement_anomaly"), "false");

    // The misspelled language column is read under its canonical name
    assert_eq!(cell(&rows, "bomdia", "language"), "pt");
    assert_eq!(cell(&rows, "bomdia", "publish_date"), "2025-07-24T00:00:00");

    let sentiment = rows.column("title_sentiment").expect("sentiment column");
    for r in &rows.rows {
        let s: f64 = r[sentiment].parse()?;
        assert!((-1.0..=1.0).contains(&s));
    }
    assert!(cell(&rows, "sad1", "title_sentiment").parse::<f64>()? < 0.0);
    assert!(cell(&rows, "abc123", "title_sentiment").parse::<f64>()? > 0.0);
    assert_eq!(cell(&rows, "sad1", "title_has_emoji"), "true");
    Ok(())
}

#[tokio::test]
async fn aggregates_have_one_row_per_country() -> Result<()> {
    let dir = tempdir()?;
    run_into(dir.path(), GroupKey::Country).await?;
    let groups = CsvTableStore::new().read_table(&outputs(dir.path()).aggregates)?;

    assert_eq!(groups.headers[0], "country");
    let counts: Vec<(&str, &str)> = groups
        .rows
        .iter()
        .map(|r| (r[0].as_str(), r[1].as_str()))
        .collect();
    assert_eq!(counts, vec![("BR", "2"), ("GB", "1"), ("JP", "1"), ("US", "2")]);

    let us = &groups.rows[3];
    assert_eq!(us[groups.column("mean_view_count").expect("column")], "550");
    assert_eq!(us[groups.column("like_ratio_count").expect("column")], "1");
    assert_eq!(us[groups.column("mean_like_ratio").expect("column")], "0.05");
    Ok(())
}

#[tokio::test]
async fn language_grouping_excludes_null_keys() -> Result<()> {
    let dir = tempdir()?;
    let report = run_into(dir.path(), GroupKey::Language).await?;
    let groups = CsvTableStore::new().read_table(&outputs(dir.path()).aggregates)?;

    assert_eq!(report.aggregate_excluded, 1);
    assert_eq!(groups.headers[0], "language");
    let keys: Vec<&str> = groups.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(keys, vec!["en", "ja", "pt"]);

    // The row-level table still carries the record with no language
    let rows = CsvTableStore::new().read_table(&outputs(dir.path()).rows)?;
    assert_eq!(rows.len(), 6);
    Ok(())
}

#[tokio::test]
async fn repeated_runs_are_byte_identical() -> Result<()> {
    let first = tempdir()?;
    let second = tempdir()?;
    let a = run_into(first.path(), GroupKey::Country).await?;
    let b = run_into(second.path(), GroupKey::Country).await?;

    let (pa, pb) = (outputs(first.path()), outputs(second.path()));
    assert_eq!(fs::read(&pa.rows)?, fs::read(&pb.rows)?);
    assert_eq!(fs::read(&pa.aggregates)?, fs::read(&pb.aggregates)?);
    assert_eq!(a.outputs[0].sha256, b.outputs[0].sha256);
    assert_eq!(a.outputs[1].sha256, b.outputs[1].sha256);
    assert_ne!(a.run_id, b.run_id);
    Ok(())
}

#[tokio::test]
async fn exported_tables_verify_cleanly() -> Result<()> {
    let dir = tempdir()?;
    run_into(dir.path(), GroupKey::Country).await?;
    let paths = outputs(dir.path());

    let verification = VerifyUseCase::new(Box::new(CsvTableStore::new())).verify(
        VerifyTargets {
            rows: &paths.rows,
            aggregates: &paths.aggregates,
            report: Some(&paths.report),
        },
        GroupKey::Country,
    )?;

    assert!(verification.is_ok(), "{:?}", verification.violations);
    assert_eq!(verification.findings.len(), 1);

    // Editing an exported table after the run breaks its recorded digest
    fs::write(&paths.aggregates, "country,count\n")?;
    let verification = VerifyUseCase::new(Box::new(CsvTableStore::new())).verify(
        VerifyTargets {
            rows: &paths.rows,
            aggregates: &paths.aggregates,
            report: Some(&paths.report),
        },
        GroupKey::Country,
    )?;
    assert!(verification.violations.iter().any(|v| v.check == "digest"));
    Ok(())
}
