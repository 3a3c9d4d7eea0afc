use std::sync::Arc;
use std::time::Duration;

use booking::{
    config::AppConfig, db::Db, metrics::counters::Counters, orchestrator::BookingCore,
};
use common::logger::{TraceId, init_logger, root_span};
use tracing::Instrument;

/// Connects, applies the schema, builds the core and brings in-memory hold
/// state back in line with the store before anything is served.
async fn init_core(cfg: &AppConfig) -> anyhow::Result<Arc<BookingCore>> {
    let db = Db::connect(&cfg.database_url, cfg.db_max_connections).await?;
    db.migrate().await?;

    let core = Arc::new(BookingCore::with_sqlx(
        db.pool.clone(),
        cfg.hold_duration,
        Counters::default(),
    ));

    let report = core
        .recover()
        .instrument(root_span("recover", &TraceId::new()))
        .await?;
    tracing::info!(?report, "startup recovery finished");

    Ok(core)
}

/// Backstop for lost or failed expiry timers (fixed cadence).
fn start_expiry_sweep(core: Arc<BookingCore>, interval: Duration, limit: usize) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let span = root_span("expiry_sweep", &TraceId::new());
            match core.sweep_expired(limit).instrument(span).await {
                Ok(released) => {
                    tracing::debug!(released, counters = ?core.counters().snapshot(), "sweep tick");
                }
                Err(e) => tracing::error!(error = ?e, "expiry sweep failed"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env();
    init_logger("booking", cfg.json_logs);

    tracing::info!(
        hold_secs = cfg.hold_duration.as_secs(),
        sweep_ms = cfg.expiry_sweep_interval.as_millis() as u64,
        "Starting booking core..."
    );

    let core = init_core(&cfg).await?;

    start_expiry_sweep(core.clone(), cfg.expiry_sweep_interval, cfg.expiry_sweep_limit);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    core.shutdown();
    tracing::info!(counters = ?core.counters().snapshot(), "final counters");

    Ok(())
}
