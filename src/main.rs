use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use netmerge::errors::classify;
use netmerge::merge::MatchingColumns;
use netmerge::{common, graph_io, plan, plan_execution};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the networks listed in a plan file
    Merge {
        #[clap(short, long)]
        plan: String,
    },
    /// Write a default plan file
    Init {
        #[clap(short, long)]
        plan: String,
    },
    /// Show the size and columns of a network file
    Inspect {
        #[clap(short, long)]
        network: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    if let Err(err) = run(args.command).await {
        let (code, client_error) = classify(&err);
        if client_error {
            error!("Invalid input [{}]: {:#}", code, err);
            std::process::exit(2);
        }
        error!("Failed [{}]: {:#}", code, err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Merge { plan } => {
            info!("Running merge plan: {}", plan);
            plan_execution::execute_plan(&plan).await?;
        }
        Commands::Init { plan } => {
            info!("Initializing plan: {}", plan);
            let plan_file_path = plan;
            let plan = plan::MergePlan::default();
            let serialized_plan = serde_yaml::to_string(&plan)?;
            common::write_string_to_file(&plan_file_path, &serialized_plan)?;
        }
        Commands::Inspect { network } => {
            let loaded = graph_io::import_network(&network)?;
            info!("{} ({})", loaded.network.name, loaded.network.stats());
            for column in &loaded.node_table.columns {
                info!("  node column {} ({:?})", column.name, column.value_type);
            }
            for column in &loaded.edge_table.columns {
                info!("  edge column {} ({:?})", column.name, column.value_type);
            }
            let proposed = MatchingColumns::propose_default(&loaded.node_table);
            info!("Proposed matching column: {}", proposed.name);
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("hyper=off,reqwest=warn,{}", log_level)))
        .without_time()
        .init();
}
