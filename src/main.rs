use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use sitewatch::{build_engine, export_to_file, Mode, Settings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sitewatch")]
#[command(about = "Polls facility sensors or checkpoint scanners and reports changes")]
struct Args {
    /// What to monitor (overrides the settings file)
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Backend endpoint; mock data is used when neither this nor the settings name one
    #[arg(long)]
    endpoint: Option<String>,

    /// Bearer token for the endpoint
    #[arg(long, env = "SITEWATCH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Path to the settings file
    #[arg(short, long, default_value = "sitewatch.json")]
    settings: PathBuf,

    /// Poll interval in milliseconds (clamped to 1000..=60000)
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Run one cycle, export the state to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_settings: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let mut settings = Settings::load(&args.settings)?;
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }
    if let Some(endpoint) = args.endpoint {
        settings.endpoint = Some(endpoint);
    }
    if let Some(interval_ms) = args.interval_ms {
        settings.poll_interval_ms = Some(interval_ms);
    }
    if args.save_settings {
        settings.save(&args.settings)?;
        tracing::info!(path = %args.settings.display(), "Settings saved");
    }

    let engine = build_engine(&settings, args.token)?;

    // Handle export mode (non-interactive)
    if let Some(export_path) = args.export {
        let outcome = engine.poll_now().await;
        tracing::info!(?outcome, "Cycle finished");
        return export_to_file(&engine, &export_path);
    }

    let _connection = engine.subscribe_connection(|state| {
        tracing::info!(connection = %state, "Connection state");
    });
    let _alerts = engine.subscribe_alerts(|alerts| {
        let open = alerts.iter().filter(|a| !a.acknowledged).count();
        if let Some(newest) = alerts.first() {
            tracing::info!(
                open,
                newest = newest.id,
                title = %newest.event.title(),
                "Alerts updated"
            );
        }
    });
    let _stats = engine.subscribe_stats(|stats| {
        tracing::debug!(
            trend = ?stats.trend,
            rate_per_sec = ?stats.rate_per_sec,
            full = stats.full_categories,
            limited = stats.limited_categories,
            cycles = stats.cycles,
            "Stats"
        );
    });
    // The snapshot channel starts polling.
    let _snapshots = engine.subscribe_snapshots(|snapshot| {
        if !snapshot.is_live {
            tracing::warn!(
                error = snapshot.error.as_deref().unwrap_or("unknown"),
                "Showing stale data"
            );
            return;
        }
        tracing::info!(
            available = snapshot.available,
            total = snapshot.total,
            "Snapshot"
        );
        for category in &snapshot.categories {
            tracing::info!(
                "  {:<12} {:>4}/{:<4} {}",
                category.key.to_string(),
                category.available,
                category.total,
                category.status.label()
            );
        }
    });
    engine.start()?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    engine.stop();
    Ok(())
}
