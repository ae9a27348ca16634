use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "holistic-planner", about = "Portfolio rebalancing planner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate, evaluate and store a plan for a portfolio snapshot
    Plan {
        /// Path to the opportunity context JSON
        #[arg(long)]
        context: String,
        /// Path to a planner configuration JSON (defaults apply when omitted)
        #[arg(long)]
        config: Option<String>,
        /// Suppress progress lines on stderr
        #[arg(long)]
        quiet: bool,
    },
    /// Show the stored plan with running cash balance
    View {
        /// Starting cash in EUR
        #[arg(long, default_value = "0")]
        cash: f64,
    },
    /// List pending recommendations
    Pending {
        #[arg(long, default_value = "0")]
        limit: i64,
    },
    /// Count pending recommendations by side
    Counts,
    /// Mark pending recommendations as executed
    Executed {
        symbol: String,
        /// BUY or SELL
        side: String,
        portfolio_hash: String,
    },
    /// Record a failed execution attempt
    Failed { uuid: String, reason: String },
    /// Dismiss pending recommendations
    Dismiss {
        /// Only dismiss recommendations for this portfolio hash
        #[arg(long)]
        portfolio_hash: Option<String>,
    },
    /// Delete old recommendations and audit data
    Gc {
        #[arg(long, default_value = "24")]
        hours: i64,
    },
    /// Print the default planner configuration
    Config,
}
