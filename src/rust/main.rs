use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use health_claims::data::{self, DEFAULT_DATA_PATH};
use health_claims::registry::DEFAULT_MODEL_NAME;
use health_claims::serving::server::SERVICE_ACTOR;
use health_claims::training::DEFAULT_EXPERIMENT;
use health_claims::{
    ApiServer, LocalRegistry, ModelRef, RegistryClient, ServerConfig, ServingMetrics, Stage,
    TrainConfig, TracingSink,
};

/// Health claim cost model: data generation, training, registry and serving
#[derive(Parser, Debug)]
#[command(name = "claims-mlops", author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, env = "MLOPS_VERBOSE")]
    verbose: bool,

    /// Also append logs to this file
    #[arg(long, global = true, env = "MLOPS_LOG_FILE", default_value = "mlops.log")]
    log_file: PathBuf,

    /// Log to the console only
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a synthetic claims dataset as CSV
    Generate(GenerateArgs),

    /// Train a model, log the run and register a new version
    Train(TrainArgs),

    /// Move a registered model version to another stage
    Promote(PromoteArgs),

    /// Serve predictions over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct RegistryArgs {
    /// Root directory of the local model registry
    #[arg(long, env = "MLOPS_REGISTRY_DIR", default_value = "./mlruns")]
    registry_dir: PathBuf,

    /// Registered model name
    #[arg(long, env = "MLOPS_MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    model_name: String,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long, env = "MLOPS_SAMPLES", default_value_t = 1000)]
    samples: usize,

    #[arg(long, env = "MLOPS_SEED", default_value_t = 42)]
    seed: u64,

    #[arg(short, long, env = "MLOPS_DATA_PATH", default_value = DEFAULT_DATA_PATH)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[command(flatten)]
    registry: RegistryArgs,

    /// Claims CSV to train on
    #[arg(long, env = "MLOPS_DATA_PATH", default_value = DEFAULT_DATA_PATH)]
    data: PathBuf,

    #[arg(long, env = "MLOPS_EXPERIMENT", default_value = DEFAULT_EXPERIMENT)]
    experiment: String,

    /// L2 penalty
    #[arg(long, env = "MLOPS_ALPHA", default_value_t = 1.0)]
    alpha: f64,

    #[arg(long, env = "MLOPS_TEST_FRACTION", default_value_t = 0.2)]
    test_fraction: f64,

    #[arg(long, env = "MLOPS_SEED", default_value_t = 42)]
    seed: u64,

    /// Promote the new version to Production once registered
    #[arg(long)]
    promote: bool,
}

#[derive(Args, Debug)]
struct PromoteArgs {
    #[command(flatten)]
    registry: RegistryArgs,

    #[arg(long)]
    version: u32,

    #[arg(long, default_value = "Production")]
    stage: Stage,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    registry: RegistryArgs,

    /// Host to bind to
    #[arg(long, env = "MLOPS_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind to
    #[arg(short, long, env = "MLOPS_PORT", default_value_t = 8080)]
    port: u16,

    /// Port for the Prometheus scrape endpoint
    #[arg(long, env = "MLOPS_METRICS_PORT", default_value_t = 8000)]
    metrics_port: u16,

    /// Stage to serve from
    #[arg(long, env = "MLOPS_MODEL_STAGE", default_value = "Production", conflicts_with = "run_id")]
    stage: Stage,

    /// Serve the artifact of a specific training run instead of a stage
    #[arg(long, env = "MLOPS_RUN_ID")]
    run_id: Option<String>,

    /// Number of worker threads
    #[arg(short, long, env = "MLOPS_WORKERS")]
    workers: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let file_layer = if cli.no_log_file {
        None
    } else {
        let file = open_log_file(&cli.log_file)?;
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Commands::Generate(args) => run_generate(args),
        Commands::Train(args) => run_train(args),
        Commands::Promote(args) => run_promote(args),
        Commands::Serve(args) => run_serve(args),
    }
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

fn run_generate(args: GenerateArgs) -> anyhow::Result<()> {
    info!("Generating {} synthetic claims (seed {})", args.samples, args.seed);
    let records = data::generate(args.samples, args.seed)?;
    data::save_csv(&records, &args.output)?;
    info!("Data saved to {}", args.output.display());
    data::summarize(&records).log();
    Ok(())
}

fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let records = data::load_csv(&args.data)?;
    info!("Loaded {} records from {}", records.len(), args.data.display());

    let registry = LocalRegistry::new(&args.registry.registry_dir);
    let config = TrainConfig {
        experiment: args.experiment,
        model_name: args.registry.model_name,
        alpha: args.alpha,
        test_fraction: args.test_fraction,
        seed: args.seed,
        stage: args.promote.then_some(Stage::Production),
    };

    let outcome = health_claims::train(&records, &config, &registry, TracingSink::shared().as_ref())?;
    info!(
        "Registered {} version {} ({})",
        config.model_name, outcome.version.version, outcome.version.stage
    );
    Ok(())
}

fn run_promote(args: PromoteArgs) -> anyhow::Result<()> {
    let registry = LocalRegistry::new(&args.registry.registry_dir);
    let version = registry
        .transition(&args.registry.model_name, args.version, args.stage)
        .with_context(|| format!("failed to promote {} version {}", args.registry.model_name, args.version))?;
    info!(
        "{} version {} is now in {}",
        args.registry.model_name, version.version, version.stage
    );
    Ok(())
}

fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let num_workers = args.workers.unwrap_or_else(num_cpus::get).max(1);
    let model_ref = match args.run_id {
        Some(run_id) => ModelRef::run(run_id),
        None => ModelRef::Stage {
            name: args.registry.model_name,
            stage: args.stage,
        },
    };

    info!("Starting health claim prediction service");
    info!("Worker threads: {}", num_workers);

    let audit = TracingSink::shared();
    let metrics = ServingMetrics::new().context("failed to register serving metrics")?;
    let registry = RegistryClient::new(
        Arc::new(LocalRegistry::new(&args.registry.registry_dir)),
        audit.clone(),
        SERVICE_ACTOR,
    );

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        metrics_port: args.metrics_port,
        num_workers,
        model_ref,
    };

    let server = match ApiServer::new(config, registry, metrics, audit) {
        Ok(server) => server,
        Err(err) => {
            error!("Refusing to start without a model: {}", err);
            return Err(err.into());
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(server.config.num_workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    info!(
        "Server starting on http://{}:{}",
        server.config.host, server.config.port
    );
    runtime.block_on(server.run())
}
