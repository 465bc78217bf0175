mod doctor;
mod profile;
mod terminal;

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use advisor_client::{wire, FlowExecutor, HttpFlowClient};
use advisor_core::config::{AppConfig, FlowResources, RenderConfig};
use advisor_core::error::AdvisorError;
use advisor_core::types::FlowEvent;
use advisor_flow::topology::{investment_advisor, names};
use advisor_flow::{simulate_with_outputs, EdgeKind, FlowGraph};
use advisor_render::Interpreter;

use profile::ProfileArgs;

#[derive(Parser)]
#[command(name = "advisor", version, about = "Investment advisor flow client")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "advisor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Debug, Default)]
struct ProfileFlags {
    /// Total investable amount in USD
    #[arg(long)]
    amount: Option<f64>,
    /// Age bracket, e.g. "35-39 years"
    #[arg(long)]
    age: Option<String>,
    /// Stock investment experience, e.g. "5-10 years"
    #[arg(long)]
    experience: Option<String>,
    /// Target amount after one year in USD
    #[arg(long)]
    target: Option<f64>,
}

impl From<ProfileFlags> for ProfileArgs {
    fn from(flags: ProfileFlags) -> Self {
        Self {
            amount: flags.amount,
            age: flags.age,
            experience: flags.experience,
            target: flags.target,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Invoke the deployed flow and render its trace (default)
    Run {
        #[command(flatten)]
        profile: ProfileFlags,
        /// Ask for the investor profile on the terminal
        #[arg(short, long)]
        interactive: bool,
    },
    /// Validate the flow topology, or a graph definition file
    Validate {
        /// JSON graph definition to validate instead of the built-in topology
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the flow topology
    Graph {
        /// Print the serialized graph definition
        #[arg(long)]
        json: bool,
    },
    /// Render a recorded event stream (one JSON object per line)
    Replay {
        /// Recording to read
        file: PathBuf,
    },
    /// Dry-run the flow offline with canned node outputs
    Simulate {
        #[command(flatten)]
        profile: ProfileFlags,
        /// JSON object mapping node names to their output documents
        #[arg(long)]
        outputs: Option<PathBuf>,
        /// Reflection verdict, overriding any entry in --outputs
        #[arg(long)]
        reflection: Option<String>,
        /// Print the simulated events as JSON lines instead of rendering them
        #[arg(long)]
        json: bool,
    },
    /// Show current configuration
    Config,
    /// Run configuration and topology checks
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("advisor=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "advisor", &mut std::io::stdout());
        return Ok(());
    }

    match cli.command {
        Some(Commands::Validate { file }) => validate(&cli.config, file.as_deref()),
        Some(Commands::Graph { json }) => {
            let (resources, _) = offline_settings(&cli.config)?;
            let graph = investment_advisor(&resources)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&graph.to_definition())?);
            } else {
                print_topology(&graph);
            }
            Ok(())
        }
        Some(Commands::Replay { file }) => replay(&cli.config, &file),
        Some(Commands::Simulate {
            profile,
            outputs,
            reflection,
            json,
        }) => simulate(
            &cli.config,
            profile.into(),
            outputs.as_deref(),
            reflection,
            json,
        ),
        Some(Commands::Config) => {
            let config = AppConfig::load(&cli.config)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::Doctor) => {
            let config = AppConfig::load(&cli.config)?;
            let issues = doctor::run_doctor(&config);
            if issues > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Run {
            profile,
            interactive,
        }) => run(&cli.config, profile.into(), interactive).await,
        None => run(&cli.config, ProfileArgs::default(), false).await,
        Some(Commands::Completions { .. }) => unreachable!("handled before config load"),
    }
}

async fn run(config_path: &Path, args: ProfileArgs, interactive: bool) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)?;
    let graph = investment_advisor(&config.flow.resources)?;

    let investor = if interactive {
        profile::prompt(args)?
    } else {
        args.into_profile()?
    };

    let transport = Arc::new(HttpFlowClient::from_config(&config.flow)?);
    let executor = FlowExecutor::new(transport, config.flow.clone(), graph, config.render.clone());

    let cancel = tokio_util::sync::CancellationToken::new();
    let cancel_clone = cancel.clone();

    // Abandon the session on Ctrl-C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Cancelling flow session...");
        cancel_clone.cancel();
    });

    match executor.run(&investor, cancel, terminal::print_command).await {
        Ok(outcome) => {
            if !outcome.completed() {
                warn!("Flow stream ended before completion");
            }
            Ok(())
        }
        Err(AdvisorError::Cancelled) => {
            eprintln!("Cancelled.");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Flow session failed");
            Err(e.into())
        }
    }
}

fn validate(config_path: &Path, file: Option<&Path>) -> anyhow::Result<()> {
    let graph = match file {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            FlowGraph::from_json(&json)?
        }
        None => {
            let (resources, _) = offline_settings(config_path)?;
            investment_advisor(&resources)?
        }
    };
    println!(
        "valid: {} nodes, {} connections",
        graph.nodes().len(),
        graph.edges().len()
    );
    Ok(())
}

fn replay(config_path: &Path, file: &Path) -> anyhow::Result<()> {
    let (resources, render) = offline_settings(config_path)?;
    let graph = Arc::new(investment_advisor(&resources)?);
    let interpreter = Interpreter::new(render).with_graph(graph);

    let reader = BufReader::new(
        std::fs::File::open(file).with_context(|| format!("opening {}", file.display()))?,
    );

    let mut events = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        match wire::decode_line(&line?) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => {
                error!(line = n + 1, error = %e, "Recording ends with an error");
                break;
            }
        }
    }

    let (state, commands) = interpreter.replay(&events);
    commands.iter().for_each(terminal::print_command);
    if state.completion().is_none() {
        warn!(events = events.len(), "Recording has no completion event");
    }
    Ok(())
}

fn simulate(
    config_path: &Path,
    args: ProfileArgs,
    outputs: Option<&Path>,
    reflection: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (resources, render) = offline_settings(config_path)?;
    let graph = investment_advisor(&resources)?;
    let document = args.into_profile()?.to_document()?;

    let mut canned: HashMap<String, String> = match outputs {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not a JSON object of strings", path.display()))?
        }
        None => HashMap::new(),
    };
    if let Some(verdict) = reflection {
        canned.insert(names::FINANCIAL_ANALYST_REFLECTION.to_string(), verdict);
    }

    let events = simulate_with_outputs(&graph, &document, &canned);
    if json {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(());
    }

    let interpreter = Interpreter::new(render).with_graph(Arc::new(graph));
    let (state, commands) = interpreter.replay(&events);
    commands.iter().for_each(terminal::print_command);

    println!();
    println!("Path: {}", live_path(&events).join(" -> "));
    for decision in state.decisions() {
        println!("  {} took '{}'", decision.node, decision.branch);
    }
    Ok(())
}

/// Resources and render settings for commands that work without a deployed
/// flow. A missing config file falls back to defaults.
fn offline_settings(path: &Path) -> anyhow::Result<(FlowResources, RenderConfig)> {
    match AppConfig::load(path) {
        Ok(config) => Ok((config.flow.resources, config.render)),
        Err(AdvisorError::ConfigNotFound(_)) => {
            info!(path = %path.display(), "No config file, using default resources");
            Ok((FlowResources::default(), RenderConfig::default()))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_topology(graph: &FlowGraph) {
    for node in graph.topological_order() {
        println!("{} [{}]", node.name, node.kind.label());
        for edge in graph.outgoing(&node.name) {
            match &edge.kind {
                EdgeKind::Data {
                    source_output,
                    target_input,
                } => println!(
                    "  {}.{} -> {}.{}",
                    edge.source, source_output, edge.target, target_input
                ),
                EdgeKind::Conditional { condition } => {
                    println!("  when {} -> {}", condition, edge.target)
                }
            }
        }
    }
}

fn live_path(events: &[FlowEvent]) -> Vec<&str> {
    let mut path: Vec<&str> = vec![];
    for event in events {
        if let FlowEvent::Trace(trace) = event {
            if path.last() != Some(&trace.node_name()) {
                path.push(trace.node_name());
            }
        }
    }
    path
}
