use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use banjir_geocoder::batch::{BatchOrchestrator, CancelToken, RunOptions, StdinPrompt};
use banjir_geocoder::config::Config;
use banjir_geocoder::domain::BatchSummary;
use banjir_geocoder::logging;
use banjir_geocoder::provider::NominatimClient;
use banjir_geocoder::rate_limiter::RateLimiter;
use banjir_geocoder::storage::{ReportStore, SqliteStore};

#[derive(Parser)]
#[command(name = "banjir_geocoder")]
#[command(about = "Resolves flood report addresses to validated coordinates")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the reports database
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve pending report addresses through the geocoding provider
    Geocode {
        /// Preview results without writing to the database
        #[arg(long)]
        dry_run: bool,
        /// Re-resolve reports that already have coordinates
        #[arg(long)]
        force: bool,
        /// Confirm each result before it is stored
        #[arg(long)]
        interactive: bool,
        /// Process at most this many reports
        #[arg(long)]
        limit: Option<usize>,
        /// Specific report ids (comma-separated, e.g. 1,5,10)
        #[arg(long)]
        ids: Option<String>,
        /// Minimum milliseconds between provider requests
        #[arg(long)]
        rate_limit_ms: Option<u64>,
    },
    /// Show geocoding progress for the reports database
    Status,
}

fn parse_ids(raw: &str) -> Result<Vec<i64>, String> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| format!("Invalid id '{}'. Use: --ids 1,5,10", part.trim()))
        })
        .collect()
}

fn print_summary(summary: &BatchSummary, dry_run: bool) {
    println!("\n📊 Batch Results:");
    println!("   Total:    {}", summary.total);
    println!("   Success:  {}", summary.success);
    println!("   Failed:   {}", summary.failed);
    println!("   Skipped:  {}", summary.skipped);

    if summary.already_resolved > 0 {
        println!("   Already geocoded: {}", summary.already_resolved);
    }
    if summary.low_confidence > 0 {
        println!(
            "\n⚠️  {} result(s) at LOW confidence - review recommended",
            summary.low_confidence
        );
    }
    if !summary.failures.is_empty() {
        println!("\n❌ Failed reports:");
        for (id, reason) in &summary.failures {
            println!("   - #{}: {}", id, reason.as_str());
        }
    }
    if let Some(rate) = summary.success_rate() {
        println!("\n📈 Success rate: {rate:.1}%");
    }
    if dry_run {
        println!("\n🔍 DRY RUN - no changes were written");
    }
}

async fn run_geocode(
    store: Arc<dyn ReportStore>,
    config: &Config,
    options: RunOptions,
    rate_limit_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rate_limiter = Arc::new(RateLimiter::from_millis(
        rate_limit_ms.unwrap_or(config.provider.rate_limit_ms),
    ));
    let client = Arc::new(NominatimClient::new(
        config.provider.base_url.clone(),
        config.provider.user_agent.clone(),
        Duration::from_secs(config.provider.timeout_seconds),
        config.provider.max_retries,
        rate_limiter,
    )?);

    print!("🌍 Testing provider connection... ");
    let _ = std::io::Write::flush(&mut std::io::stdout());
    if client.ping().await {
        println!("✅ connected");
    } else {
        println!("❌ unreachable");
        warn!("Provider status check failed; continuing anyway");
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\n⚠️  Cancellation requested - finishing current report");
                cancel.cancel();
            }
        });
    }

    let mut orchestrator =
        BatchOrchestrator::new(store, client).with_cancel_token(cancel);
    if options.interactive {
        orchestrator = orchestrator.with_prompt(Box::new(StdinPrompt));
    }

    let dry_run = options.dry_run;
    match orchestrator.run(&options).await {
        Ok(summary) => {
            print_summary(&summary, dry_run);
            Ok(())
        }
        Err(e) => {
            error!("Geocode batch aborted: {}", e);
            println!("❌ Batch aborted: {e}");
            Err(e.into())
        }
    }
}

async fn run_status(store: Arc<dyn ReportStore>) -> Result<(), Box<dyn std::error::Error>> {
    let counts = store.counts().await?;
    println!("📊 Geocoding status:");
    println!("   Total reports: {}", counts.total);
    println!("   ✅ Resolved:   {}", counts.resolved);
    println!("   ⏳ Pending:    {}", counts.pending);
    println!("   ❌ Failed:     {}", counts.failed);
    if counts.total > 0 {
        let coverage = counts.resolved as f64 / counts.total as f64 * 100.0;
        println!("   📈 Coverage:   {coverage:.1}%");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    let db_path = cli.db.unwrap_or_else(|| config.database.path.clone());
    info!("Opening reports database at {}", db_path);
    let store: Arc<dyn ReportStore> = Arc::new(SqliteStore::open(&db_path)?);

    match cli.command {
        Commands::Geocode {
            dry_run,
            force,
            interactive,
            limit,
            ids,
            rate_limit_ms,
        } => {
            println!("🔄 Running geocode batch...");
            let ids = match ids.as_deref().map(parse_ids).transpose() {
                Ok(ids) => ids,
                Err(message) => {
                    println!("❌ {message}");
                    std::process::exit(1);
                }
            };

            let options = RunOptions {
                dry_run,
                force,
                interactive,
                limit,
                ids,
            };
            run_geocode(store, &config, options, rate_limit_ms).await?;
        }
        Commands::Status => {
            run_status(store).await?;
        }
    }
    Ok(())
}
