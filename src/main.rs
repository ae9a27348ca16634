use std::sync::Arc;

use clap::Parser;
use holistic_planner::cli::commands::{Cli, Commands};
use holistic_planner::domain::ports::progress::ProgressReporter;
use holistic_planner::domain::values::context::OpportunityContext;
use holistic_planner::domain::values::planner_config::PlannerConfiguration;
use holistic_planner::domain::values::trade_side::TradeSide;
use holistic_planner::infrastructure::progress::ChannelProgress;
use holistic_planner::infrastructure::settings::PlannerSettings;
use holistic_planner::HolisticPlanner;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const PROGRESS_CAPACITY: usize = 64;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match PlannerSettings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading settings: {e}");
            std::process::exit(1);
        }
    };

    let planner = match HolisticPlanner::new(&settings) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("Error initializing planner: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!(db = %settings.db_path, workers = planner.evaluation_workers(), "Planner ready");

    if let Err(e) = run_command(planner, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_command(planner: Arc<HolisticPlanner>, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Plan { context, config, quiet } => {
            let ctx: OpportunityContext = serde_json::from_str(&std::fs::read_to_string(&context)?)?;
            let config = match config {
                Some(path) => PlannerConfiguration::from_json(&std::fs::read_to_string(&path)?)?,
                None => PlannerConfiguration::default(),
            };

            let cancel = CancellationToken::new();
            let (progress, mut rx) = ChannelProgress::channel(PROGRESS_CAPACITY);
            let printer = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    if !quiet {
                        eprintln!("[{}:{}] {}/{} {}", update.phase, update.sub_phase, update.current, update.total, update.message);
                    }
                }
            });

            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let worker = Arc::clone(&planner);
            let outcome = tokio::task::spawn_blocking(move || {
                let reporter: &dyn ProgressReporter = &progress;
                worker.plan(&ctx, &config, &cancel, Some(reporter))
            })
            .await??;
            printer.await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::View { cash } => {
            let view = planner.plan_view(cash)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Pending { limit } => {
            let recs = planner.pending(limit)?;
            println!("{}", serde_json::to_string_pretty(&recs)?);
        }
        Commands::Counts => {
            let counts = planner.counts()?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Commands::Executed {
            symbol,
            side,
            portfolio_hash,
        } => {
            let side: TradeSide = side.parse().map_err(|e: String| e)?;
            let n = planner.record_execution(&symbol, side, &portfolio_hash)?;
            println!("Marked {n} recommendation(s) executed");
        }
        Commands::Failed { uuid, reason } => {
            let outcome = planner.record_failure(&uuid, &reason)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Dismiss { portfolio_hash } => {
            let n = planner.dismiss(portfolio_hash.as_deref())?;
            println!("Dismissed {n} recommendation(s)");
        }
        Commands::Gc { hours } => {
            let gc = planner.collect_garbage(chrono::Duration::hours(hours))?;
            println!("{}", serde_json::to_string_pretty(&gc)?);
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&PlannerConfiguration::default())?);
        }
    }
    Ok(())
}
