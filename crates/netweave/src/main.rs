mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "netweave")]
#[command(about = "Provision a multi-tier network topology in dependency order", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the layered creation plan without touching any backend
    Plan,
    /// Create the webapp topology against the simulated backend
    Up {
        /// Cap on concurrent create calls within a layer
        #[arg(short = 'j', long)]
        max_concurrency: Option<usize>,
        /// Keep created resources if a create fails
        #[arg(long)]
        no_rollback: bool,
        /// Retry transient backend errors up to this many attempts
        #[arg(short, long)]
        retries: Option<u32>,
        /// Simulated API latency per call, in milliseconds
        #[arg(long, default_value = "50")]
        latency_ms: u64,
        /// Inject a create failure for the given resource id (demo)
        #[arg(long)]
        fail: Option<String>,
    },
    /// Print the dependency graph in Graphviz DOT format
    Graph,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt::init();

    match cli.command {
        Commands::Plan => commands::plan::handle_plan(),
        Commands::Up {
            max_concurrency,
            no_rollback,
            retries,
            latency_ms,
            fail,
        } => {
            commands::up::handle_up(commands::up::UpArgs {
                max_concurrency,
                no_rollback,
                retries,
                latency_ms,
                fail,
            })
            .await
        }
        Commands::Graph => commands::graph::handle_graph(),
        Commands::Version => {
            println!("netweave {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
