use anyhow::{bail, Context};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use trendfetch_core::RunReport;
use trendfetch_runtime::{
    FetchPipeline, JsonFilePersister, MemoryPersister, PipelineSettings, ResilientFetcher,
    ResultPersister, RuntimeConfig, TracingObserver, Transport, TransportRegistry,
};

use crate::cli::FetchArgs;

/// Everything a fetch run needs, after merging flags over the config file.
#[derive(Debug)]
pub struct FetchPlan {
    pub topics: Vec<String>,
    pub settings: PipelineSettings,
    pub out_dir: PathBuf,
    pub dry_run: bool,
}

pub fn run(args: FetchArgs) -> anyhow::Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(execute(args))
}

async fn execute(args: FetchArgs) -> anyhow::Result<ExitCode> {
    let as_json = args.json;
    let report = fetch_all(args).await?;
    print_report(&report, as_json)?;

    Ok(if report.exit_code() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn fetch_all(args: FetchArgs) -> anyhow::Result<RunReport> {
    let config = load_config(&args)?;
    let plan = plan(&args, &config)?;
    let transport = build_transport(&args, &config)?;

    let fetcher = ResilientFetcher::builder()
        .transport(transport)
        .observer(Arc::new(TracingObserver::new(tracing::info_span!("fetch"))))
        .build()?;

    let persister: Arc<dyn ResultPersister> = if plan.dry_run {
        Arc::new(MemoryPersister::new())
    } else {
        Arc::new(JsonFilePersister::new(&plan.out_dir))
    };

    let pipeline = FetchPipeline::new(Arc::new(fetcher), persister, plan.settings.clone());

    let report = tokio::select! {
        report = pipeline.run(&plan.topics) => report,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling in-flight fetches");
            bail!("interrupted before all topics finished");
        }
    };

    Ok(report)
}

fn load_config(args: &FetchArgs) -> anyhow::Result<RuntimeConfig> {
    match &args.config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Merge command-line overrides over the file configuration.
pub fn plan(args: &FetchArgs, config: &RuntimeConfig) -> anyhow::Result<FetchPlan> {
    let topics = if args.topics.is_empty() {
        config.topics.clone()
    } else {
        args.topics.clone()
    };

    if topics.is_empty() {
        bail!("no topics given on the command line or in the config file");
    }

    let mut settings = config.pipeline_settings();
    if let Some(attempts) = args.attempts {
        settings.attempt_budget = attempts;
    }
    if let Some(concurrency) = args.concurrency {
        settings.concurrency = concurrency;
    }
    if args.deadline.is_some() {
        settings.deadline = args.deadline;
    }

    Ok(FetchPlan {
        topics,
        settings,
        out_dir: args
            .out_dir
            .clone()
            .unwrap_or_else(|| config.output.dir.clone()),
        dry_run: args.dry_run,
    })
}

/// `--fixture` wins over the config's `transport` section.
pub fn build_transport(args: &FetchArgs, config: &RuntimeConfig) -> anyhow::Result<Arc<dyn Transport>> {
    let registry = TransportRegistry::with_defaults();

    let transport = match (&args.fixture, &config.transport) {
        (Some(fixture), _) => registry.create(
            "fixture",
            &json!({ "path": fixture.to_string_lossy() }),
        )?,
        (None, Some(section)) => registry.create_from_section(section)?,
        (None, None) => bail!(
            "no transport configured: pass --fixture or add a 'transport' section to the config (available: {})",
            registry.available_types().join(", ")
        ),
    };

    tracing::debug!(transport = transport.name(), "Transport ready");
    Ok(transport)
}

fn print_report(report: &RunReport, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for key in &report.keys {
        let marker = if key.is_failure() { "✗" } else { "✓" };
        match &key.location {
            Some(location) => println!("{} {} -> {}", marker, key.describe(), location),
            None => println!("{} {}", marker, key.describe()),
        }
    }
    println!("{}", report.summary());
    Ok(())
}
