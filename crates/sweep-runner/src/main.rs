use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use sweep_catalog::{NamingStrategy, PathResolver, ResultCatalog};
use sweep_runner::{ConsoleObserver, ExperimentDefinition, ExperimentRunner, VERSION};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn experiment_arg() -> Arg {
    Arg::new("experiment")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Experiment definition (TOML)")
}

fn cli() -> Command {
    Command::new("sweep")
        .version(VERSION)
        .about("Generate and run parameter sweeps of a vegetation model")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level unless RUST_LOG says otherwise"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .subcommand(
            Command::new("run")
                .about("Generate configs for every simulation and run them")
                .arg(experiment_arg())
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Generate configs and log worker commands without running them"),
                )
                .arg(
                    Arg::new("cpu-count")
                        .long("cpu-count")
                        .value_parser(value_parser!(usize))
                        .help("Maximum concurrent workers"),
                ),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate configs, manifests and index without running anything")
                .arg(experiment_arg()),
        )
        .subcommand(
            Command::new("index")
                .about("List the runs recorded under an output directory")
                .arg(
                    Arg::new("output")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Output directory of a previous batch"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn init_tracing(matches: &ArgMatches) {
    let default_level = if matches.get_flag("verbose") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if matches.get_one::<String>("log-format").map(String::as_str) == Some("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_experiment(args: &ArgMatches) -> anyhow::Result<ExperimentDefinition> {
    let path = args
        .get_one::<PathBuf>("experiment")
        .context("missing experiment file")?;
    Ok(ExperimentDefinition::from_file(path)?)
}

async fn run(args: &ArgMatches) -> anyhow::Result<()> {
    let experiment = load_experiment(args)?;
    let mut context = experiment.context();
    if args.get_flag("dry-run") {
        context = context.with_dry_run(true);
    }
    if let Some(cpus) = args.get_one::<usize>("cpu-count") {
        context = context.with_max_concurrency(*cpus);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; killing running simulations");
            on_signal.cancel();
        }
    });

    let runner = ExperimentRunner::new(context)
        .with_observer(Arc::new(ConsoleObserver::new()))
        .with_cancellation(cancel);
    let report = runner.run(&experiment).await?;
    let summary = report.summary();
    info!(
        succeeded = summary.succeeded,
        not_run = summary.not_run,
        elapsed_secs = summary.elapsed_secs,
        "all simulations finished"
    );
    Ok(())
}

fn generate(args: &ArgMatches) -> anyhow::Result<()> {
    let experiment = load_experiment(args)?;
    let runner = ExperimentRunner::new(experiment.context());
    let batch = runner.generate(&experiment)?;
    for job in &batch.jobs {
        println!("{}", job.config.display());
    }
    Ok(())
}

async fn index(args: &ArgMatches) -> anyhow::Result<()> {
    let output = args
        .get_one::<PathBuf>("output")
        .context("missing output directory")?;
    let catalog = ResultCatalog::new();
    let resolver = PathResolver::new(output.clone(), NamingStrategy::Manual);
    let index = catalog.read_index_async(&resolver).await?;

    let mut manifests = Vec::with_capacity(index.len());
    for run in index.iter() {
        let manifest = catalog
            .read_manifest_async(run)
            .await
            .with_context(|| format!("reading manifest of {}", run.display()))?;
        manifests.push(manifest);
    }

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&manifests)?);
    } else {
        for manifest in &manifests {
            println!("{}\t{}\t{}", manifest.key, manifest.name, manifest.config.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_tracing(&matches);

    let result = match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("generate", args)) => generate(args),
        Some(("index", args)) => index(args).await,
        _ => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
