use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Catalog
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS resources (
  resource_id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  description TEXT,
  category TEXT
);
"#,
    )
    .execute(pool)
    .await?;

    // Slots: status + version are the only mutable columns.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS time_slots (
  slot_id INTEGER PRIMARY KEY AUTOINCREMENT,
  resource_id BIGINT NOT NULL REFERENCES resources(resource_id),
  reservation_date TEXT NOT NULL,
  start_time TEXT NOT NULL,
  end_time TEXT NOT NULL,
  status TEXT NOT NULL DEFAULT 'AVAILABLE' CHECK (status IN ('AVAILABLE','HOLD','RESERVED')),
  version BIGINT NOT NULL DEFAULT 0,
  UNIQUE (resource_id, reservation_date, start_time, end_time)
);
"#,
    )
    .execute(pool)
    .await?;

    // Ledger (append-only; only status + resolved_at_ms change, once)
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS reservations (
  reservation_id TEXT PRIMARY KEY,
  slot_id BIGINT NOT NULL,
  user_email TEXT NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('PENDING','CONFIRMED','FAILED','EXPIRED')),
  created_at_ms BIGINT NOT NULL,
  hold_expires_at_ms BIGINT NOT NULL,
  hold_version BIGINT NOT NULL,
  resolved_at_ms BIGINT
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS payment_outcomes (
  reservation_id TEXT PRIMARY KEY,
  decision TEXT NOT NULL CHECK (decision IN ('SUCCESS','FAIL')),
  processed_at_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_time_slots_resource_date ON time_slots(resource_id, reservation_date);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_reservations_pending_expiry ON reservations(status, hold_expires_at_ms);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_reservations_slot ON reservations(slot_id);"#)
        .execute(pool)
        .await?;

    Ok(())
}
