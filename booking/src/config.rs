use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Upper bound on pooled database connections.
    pub db_max_connections: u32,

    // =========================
    // Hold configuration
    // =========================
    /// How long a slot stays in HOLD waiting for a payment decision.
    ///
    /// When it elapses without a decision the slot goes back to AVAILABLE and
    /// the reservation is marked EXPIRED.
    pub hold_duration: Duration,

    // =========================
    // Expiry sweep configuration
    // =========================
    /// Cadence of the backstop sweep that expires overdue PENDING holds.
    ///
    /// Timers handle the normal case; the sweep covers timers lost with a
    /// crashed instance and expiry attempts that failed on a storage error.
    pub expiry_sweep_interval: Duration,

    /// Maximum reservations expired per sweep tick.
    ///
    /// Bounds the work done per tick; a backlog drains over several ticks.
    pub expiry_sweep_limit: usize,

    // =========================
    // Logging
    // =========================
    /// JSON log output (`APP_ENV=production`), pretty output otherwise.
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unparsable values fall
    /// back to their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);
        let json_logs = lookup("APP_ENV").is_some_and(|v| v == "production");

        Self {
            database_url,
            db_max_connections: parse_or(
                &lookup,
                "DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            ),
            hold_duration: Duration::from_secs(
                parse_or(&lookup, "HOLD_DURATION_SECS", defaults.hold_duration.as_secs())
                    .max(1),
            ),
            expiry_sweep_interval: Duration::from_millis(
                parse_or(
                    &lookup,
                    "EXPIRY_SWEEP_INTERVAL_MS",
                    defaults.expiry_sweep_interval.as_millis() as u64,
                )
                .max(1),
            ),
            expiry_sweep_limit: parse_or(&lookup, "EXPIRY_SWEEP_LIMIT", defaults.expiry_sweep_limit),
            json_logs,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://booking_dev.db?mode=rwc".to_string(),
            db_max_connections: 16,
            hold_duration: Duration::from_secs(300),
            expiry_sweep_interval: Duration::from_millis(5_000),
            expiry_sweep_limit: 256,
            json_logs: false,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "unparsable config value; using default");
            default
        }),
    }
}
