use std::io::stderr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, registry};

use gleaner_engine::{Engine, EngineConfig, RunReport, WorkflowRunner, WorkflowSource};
use gleaner_step::{StepContract, StepRegistry};
use gleaner_steps::{STDOUT_PUBLISHER, builtin_registry};
use gleaner_workflow::WorkflowGraph;

/// Gleaner - gathers cluster facts through a graph of steps
#[derive(Parser)]
#[command(name = "gleaner")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Log at debug level unless RUST_LOG says otherwise
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow once, or periodically with --interval-secs
  Run(RunArgs),

  /// Validate a workflow and print its execution order
  Check {
    /// Path to the workflow specification
    workflow_file: PathBuf,
  },

  /// List the available steps
  Steps,
}

#[derive(Args)]
struct RunArgs {
  /// Path to the workflow specification
  workflow_file: PathBuf,

  /// Engine configuration file (JSON)
  #[arg(long)]
  config: Option<PathBuf>,

  /// Input wait bound for steps without their own timeout
  #[arg(long)]
  timeout_ms: Option<u64>,

  /// Capacity of every queue; unbounded when omitted
  #[arg(long)]
  queue_capacity: Option<usize>,

  /// Re-run the workflow every N seconds until interrupted
  #[arg(long)]
  interval_secs: Option<u64>,

  /// Write the run report to this file instead of standard output
  #[arg(long)]
  report: Option<PathBuf>,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  registry()
    .with(filter)
    .with(fmt::layer().with_writer(stderr))
    .init();

  let registry = builtin_registry().context("failed to build step registry")?;

  match cli.command {
    Commands::Run(args) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(args, registry))
    }
    Commands::Check { workflow_file } => check_workflow(&workflow_file, &registry),
    Commands::Steps => {
      list_steps(&registry);
      Ok(())
    }
  }
}

fn load_config(args: &RunArgs) -> Result<EngineConfig> {
  let mut config = match &args.config {
    Some(path) => {
      let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
      EngineConfig::from_json(&text)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?
    }
    None => EngineConfig::default(),
  };

  if let Some(timeout_ms) = args.timeout_ms {
    config.default_timeout_ms = timeout_ms;
  }
  if args.queue_capacity.is_some() {
    config.queue_capacity = args.queue_capacity;
  }
  if config.default_timeout_ms == 0 {
    bail!("default timeout must be positive");
  }
  Ok(config)
}

async fn run_workflow(args: RunArgs, registry: StepRegistry) -> Result<()> {
  let config = load_config(&args)?;
  let engine = Arc::new(Engine::new(Arc::new(registry), config));

  let cancel = CancellationToken::new();
  let interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      info!("interrupt received, stopping");
      interrupt.cancel();
    }
  });

  // Fail fast on a broken workflow, and learn whether it publishes to stdout.
  let text = tokio::fs::read_to_string(&args.workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", args.workflow_file.display()))?;
  let graph = engine
    .load(&text)
    .with_context(|| format!("invalid workflow: {}", args.workflow_file.display()))?;
  let sink = ReportSink::for_workflow(args.report.clone(), &graph);

  match args.interval_secs {
    None => {
      let report = engine.run(graph, cancel).await;
      sink.write(&report).await?;
      if !report.succeeded() {
        bail!("workflow failed: {}", report.failed_nodes().join(", "));
      }
      Ok(())
    }
    Some(0) => bail!("--interval-secs must be positive"),
    Some(secs) => {
      drop(graph);
      let (tx, mut rx) = mpsc::unbounded_channel();
      let runner = WorkflowRunner::new(engine, WorkflowSource::File(args.workflow_file.clone()))
        .with_interval(Duration::from_secs(secs))
        .with_reports(tx);

      let printer = tokio::spawn(async move {
        while let Some(report) = rx.recv().await {
          if let Err(e) = sink.write(&report).await {
            error!(error = %e, "failed to write report");
          }
        }
      });

      runner.start(cancel).await.context("workflow runner failed")?;
      printer.await.context("report printer panicked")?;
      Ok(())
    }
  }
}

/// Where run reports are written.
enum ReportSink {
  Stdout,
  /// Used when standard output carries published documents.
  Stderr,
  /// Holds the latest report; each run replaces the previous one.
  File(PathBuf),
}

impl ReportSink {
  fn for_workflow(report: Option<PathBuf>, graph: &WorkflowGraph) -> Self {
    match report {
      Some(path) => ReportSink::File(path),
      None if graph.nodes().any(|n| n.step_name() == STDOUT_PUBLISHER) => ReportSink::Stderr,
      None => ReportSink::Stdout,
    }
  }

  async fn write(&self, report: &RunReport) -> Result<()> {
    let text = serde_json::to_string_pretty(report)?;
    match self {
      ReportSink::Stdout => println!("{}", text),
      ReportSink::Stderr => eprintln!("{}", text),
      ReportSink::File(path) => tokio::fs::write(path, format!("{}\n", text))
        .await
        .with_context(|| format!("failed to write report file: {}", path.display()))?,
    }
    Ok(())
  }
}


fn check_workflow(workflow_file: &Path, registry: &StepRegistry) -> Result<()> {
  let text = std::fs::read_to_string(workflow_file)
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;
  let graph = WorkflowGraph::parse(&text, registry)
    .with_context(|| format!("invalid workflow: {}", workflow_file.display()))?;

  println!("{} nodes, {} edges", graph.len(), graph.edges().len());
  println!("sources: {}", graph.source_nodes().join(", "));
  println!("terminals: {}", graph.terminal_nodes().join(", "));
  for id in graph.topological_order() {
    let Some(node) = graph.node(id) else { continue };
    let upstream = graph.upstream(id);
    if upstream.is_empty() {
      println!("  {} ({})", id, node.step_name());
    } else {
      println!("  {} ({}) <- {}", id, node.step_name(), upstream.join(", "));
    }
  }
  Ok(())
}

fn list_steps(registry: &StepRegistry) {
  for contract in registry.contracts() {
    print_contract(&contract);
  }
}

fn print_contract(contract: &StepContract) {
  println!("{} - {}", contract.name, contract.description);

  let requires: Vec<String> = contract
    .requires
    .iter()
    .map(|input| {
      if input.aggregate {
        format!("all {}", input.doc_type)
      } else {
        input.doc_type.clone()
      }
    })
    .collect();
  if !requires.is_empty() {
    println!("  requires: {}", requires.join(", "));
  }
  if !contract.produces.is_empty() {
    println!("  produces: {}", contract.produces.join(", "));
  }
  if let Some(timeout) = contract.timeout {
    println!("  timeout: {}ms", timeout.as_millis());
  }
  for param in &contract.parameters {
    let mut line = format!("  {}", param.name);
    if param.required {
      line.push_str(" (required)");
    } else if let Some(default) = &param.default {
      line.push_str(&format!(" [default: {}]", default));
    }
    println!("{} - {}", line, param.description);
  }
}
