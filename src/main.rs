use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use trending_etl::app::etl_use_case::{EtlUseCase, OutputPaths};
use trending_etl::app::ports::{RecordSourcePort, TableWriterPort};
use trending_etl::app::verify_use_case::{VerifyTargets, VerifyUseCase};
use trending_etl::config::{Config, SourceSpec};
use trending_etl::infra::{CsvFileSource, CsvTableStore, HttpCsvSource};
use trending_etl::logging;
use trending_etl::pipeline::processing::{FeatureEngine, GroupKey};
use trending_etl::pipeline::report::RejectionRule;
use trending_etl::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "trending_etl")]
#[command(about = "Batch ETL over daily trending-video snapshots")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, normalize, enrich and aggregate a snapshot, then export both tables
    Run {
        /// Local CSV snapshot (overrides the configured source)
        #[arg(long, conflicts_with = "url")]
        input: Option<PathBuf>,
        /// HTTP(S) URL of the CSV snapshot (overrides the configured source)
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Aggregate by: country, language, channel_name or kind
        #[arg(long)]
        group_by: Option<GroupKey>,
        /// Skip writing the metrics snapshot
        #[arg(long)]
        no_metrics: bool,
    },
    /// Reload the exported tables and check their invariants
    Verify {
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        group_by: Option<GroupKey>,
    },
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.apply_env().context("applying environment overrides")?;
    Ok(config)
}

fn build_source(spec: SourceSpec) -> anyhow::Result<Box<dyn RecordSourcePort>> {
    Ok(match spec {
        SourceSpec::File(path) => Box::new(CsvFileSource::new(path)),
        SourceSpec::Http { url, timeout } => Box::new(HttpCsvSource::new(url, timeout)?),
    })
}

async fn run(config: Config) -> anyhow::Result<ExitCode> {
    config.validate()?;
    let recorder = if config.output.write_metrics {
        match trending_etl::metrics::init() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("metrics disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let source = build_source(config.source_spec()?)?;
    let pipeline = Pipeline::new(FeatureEngine::default(), config.pipeline.group_by);
    let use_case = EtlUseCase::new(source, pipeline, Box::new(CsvTableStore::new()));

    let outputs = OutputPaths {
        rows: config.output.rows_path(),
        aggregates: config.output.aggregates_path(),
        report: config.output.report_path(),
    };
    let report = match use_case.run(&outputs).await {
        Ok(report) => report,
        Err(e) => {
            error!(stage = ?e.stage(), error = %e, "run failed");
            return Err(e.into());
        }
    };

    if let Some(handle) = recorder {
        let path = config.output.metrics_path();
        CsvTableStore::new().write_bytes(&path, handle.render().as_bytes())?;
        info!(path = %path.display(), "metrics snapshot written");
    }

    println!("run {} complete", report.run_id);
    for output in &report.outputs {
        println!("  {} ({} rows, sha256 {})", output.path.display(), output.rows, output.sha256);
    }
    let rules: BTreeSet<RejectionRule> = report
        .stages
        .iter()
        .flat_map(|s| s.rejections.keys().copied())
        .collect();
    for rule in rules {
        println!("  rejected {}: {}", rule, report.rejections_for(rule));
    }
    Ok(ExitCode::SUCCESS)
}

fn verify(config: Config) -> anyhow::Result<ExitCode> {
    let rows = config.output.rows_path();
    let aggregates = config.output.aggregates_path();
    let report_path = config.output.report_path();

    let use_case = VerifyUseCase::new(Box::new(CsvTableStore::new()));
    let report = use_case.verify(
        VerifyTargets {
            rows: &rows,
            aggregates: &aggregates,
            report: Some(&report_path),
        },
        config.pipeline.group_by,
    )?;

    println!(
        "verified {} rows, {} groups: {} violations, {} data-quality findings",
        report.rows,
        report.groups,
        report.violations.len(),
        report.findings.len()
    );
    for violation in report.violations.iter().take(20) {
        match violation.row {
            Some(row) => println!("  [{}] row {}: {}", violation.check, row, violation.detail),
            None => println!("  [{}] {}", violation.check, violation.detail),
        }
    }

    Ok(if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    match &cli.command {
        Commands::Run {
            input,
            url,
            output_dir,
            group_by,
            no_metrics,
        } => {
            if let Some(path) = input {
                config.set_source_path(path.clone());
            }
            if let Some(url) = url {
                config.set_source_url(url.clone());
            }
            apply_common(&mut config, output_dir, group_by);
            if *no_metrics {
                config.output.write_metrics = false;
            }
        }
        Commands::Verify {
            output_dir,
            group_by,
        } => apply_common(&mut config, output_dir, group_by),
    }

    let _guard = logging::init_logging(&config.logging.dir)
        .with_context(|| format!("creating log directory {}", config.logging.dir.display()))?;

    match cli.command {
        Commands::Run { .. } => run(config).await,
        Commands::Verify { .. } => verify(config),
    }
}

fn apply_common(config: &mut Config, output_dir: &Option<PathBuf>, group_by: &Option<GroupKey>) {
    if let Some(dir) = output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(key) = group_by {
        config.pipeline.group_by = *key;
    }
}
