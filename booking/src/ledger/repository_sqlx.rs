use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use common::logger::warn_if_slow;
use sqlx::{AnyPool, Row};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::db::convert::{i64_to_u64, u64_to_i64};
use crate::error::LedgerError;
use crate::ledger::model::{
    PaymentDecision, PaymentOutcome, Reservation, ReservationId, ReservationStatus,
};
use crate::ledger::repository::ReservationLedger;
use crate::slot::model::SlotId;

const RESERVATION_COLUMNS: &str = "reservation_id, slot_id, user_email, status, created_at_ms, \
     hold_expires_at_ms, hold_version, resolved_at_ms";

/// SQLx-backed reservation ledger. Rows are never deleted.
pub struct SqlxReservationLedger {
    pool: AnyPool,
}

impl SqlxReservationLedger {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: ReservationId) -> anyhow::Result<Option<Reservation>> {
        let row = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE reservation_id = ?;"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("reservation lookup failed")?;

        row.as_ref().map(row_to_reservation).transpose()
    }

    fn map_rows(rows: &[sqlx::any::AnyRow]) -> Vec<Reservation> {
        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_reservation(r) {
                Ok(res) => out.push(res),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the batch
                    warn!(error = %e, "skipping malformed reservation row");
                }
            }
        }
        out
    }
}

#[async_trait]
impl ReservationLedger for SqlxReservationLedger {
    #[instrument(skip(self, reservation), target = "ledger", fields(reservation_id = %reservation.id, slot_id = reservation.time_slot_id))]
    async fn record(&self, reservation: &Reservation) -> Result<ReservationId, LedgerError> {
        let created_at_ms = u64_to_i64(reservation.created_at_ms)?;
        let hold_expires_at_ms = u64_to_i64(reservation.hold_expires_at_ms)?;
        let hold_version = u64_to_i64(reservation.hold_version)?;

        let result = warn_if_slow("db_record_reservation", Duration::from_millis(50), async {
            sqlx::query(
                r#"
INSERT INTO reservations (
  reservation_id, slot_id, user_email, status,
  created_at_ms, hold_expires_at_ms, hold_version, resolved_at_ms
)
VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
ON CONFLICT(reservation_id) DO NOTHING;
"#,
            )
            .bind(reservation.id.to_string())
            .bind(reservation.time_slot_id)
            .bind(reservation.user_email.clone())
            .bind(ReservationStatus::Pending.as_str())
            .bind(created_at_ms)
            .bind(hold_expires_at_ms)
            .bind(hold_version)
            .execute(&self.pool)
            .await
            .context("failed to insert reservation")
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::Duplicate(reservation.id));
        }

        Ok(reservation.id)
    }

    #[instrument(skip(self), target = "ledger")]
    async fn mark_outcome(
        &self,
        id: ReservationId,
        status: ReservationStatus,
        at_ms: u64,
    ) -> Result<(), LedgerError> {
        if status.is_terminal() {
            let result = sqlx::query(
                r#"
UPDATE reservations
SET status = ?, resolved_at_ms = ?
WHERE reservation_id = ? AND status = 'PENDING';
"#,
            )
            .bind(status.as_str())
            .bind(u64_to_i64(at_ms)?)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("failed to update reservation outcome")?;

            if result.rows_affected() == 1 {
                return Ok(());
            }
        }

        match self.fetch(id).await? {
            None => Err(LedgerError::NotFound(id)),
            Some(current) => Err(LedgerError::InvalidTransition {
                id,
                from: current.status,
                to: status,
            }),
        }
    }

    async fn get(&self, id: ReservationId) -> Result<Reservation, LedgerError> {
        self.fetch(id).await?.ok_or(LedgerError::NotFound(id))
    }

    async fn list_pending(&self) -> Result<Vec<Reservation>, LedgerError> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE status = 'PENDING' ORDER BY created_at_ms;"
        ))
        .fetch_all(&self.pool)
        .await
        .context("failed to list pending reservations")?;

        Ok(Self::map_rows(&rows))
    }

    async fn list_expired_pending(
        &self,
        now_ms: u64,
        limit: usize,
    ) -> Result<Vec<Reservation>, LedgerError> {
        let rows = sqlx::query(&format!(
            r#"
SELECT {RESERVATION_COLUMNS}
FROM reservations
WHERE status = 'PENDING' AND hold_expires_at_ms <= ?
ORDER BY hold_expires_at_ms
LIMIT ?;
"#
        ))
        .bind(u64_to_i64(now_ms)?)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("failed to list expired reservations")?;

        Ok(Self::map_rows(&rows))
    }

    async fn pending_for_slot(&self, slot_id: SlotId) -> Result<Vec<Reservation>, LedgerError> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE slot_id = ? AND status = 'PENDING';"
        ))
        .bind(slot_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list reservations for slot")?;

        Ok(Self::map_rows(&rows))
    }

    #[instrument(skip(self, outcome), target = "ledger", fields(reservation_id = %outcome.reservation_id, decision = %outcome.decision))]
    async fn record_payment(&self, outcome: &PaymentOutcome) -> Result<PaymentOutcome, LedgerError> {
        sqlx::query(
            r#"
INSERT INTO payment_outcomes (reservation_id, decision, processed_at_ms)
VALUES (?, ?, ?)
ON CONFLICT(reservation_id) DO NOTHING;
"#,
        )
        .bind(outcome.reservation_id.to_string())
        .bind(outcome.decision.as_str())
        .bind(u64_to_i64(outcome.processed_at_ms)?)
        .execute(&self.pool)
        .await
        .context("failed to record payment outcome")?;

        self.payment_for(outcome.reservation_id)
            .await?
            .ok_or_else(|| LedgerError::Storage(anyhow!("payment outcome vanished after insert")))
    }

    async fn payment_for(&self, id: ReservationId) -> Result<Option<PaymentOutcome>, LedgerError> {
        let row = sqlx::query(
            "SELECT reservation_id, decision, processed_at_ms FROM payment_outcomes WHERE reservation_id = ?;",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("payment outcome lookup failed")?;

        match row {
            Some(r) => Ok(Some(row_to_payment(&r)?)),
            None => Ok(None),
        }
    }
}

/* =========================
Row mapping
========================= */

fn row_to_reservation(r: &sqlx::any::AnyRow) -> anyhow::Result<Reservation> {
    let id_str: String = r.try_get("reservation_id")?;
    let status_str: String = r.try_get("status")?;
    let resolved: Option<i64> = r.try_get("resolved_at_ms")?;

    Ok(Reservation {
        id: Uuid::parse_str(&id_str).context("invalid reservation_id")?,
        time_slot_id: r.try_get("slot_id")?,
        user_email: r.try_get("user_email")?,
        status: ReservationStatus::from_str(&status_str)?,
        created_at_ms: i64_to_u64(r.try_get("created_at_ms")?)?,
        hold_expires_at_ms: i64_to_u64(r.try_get("hold_expires_at_ms")?)?,
        hold_version: i64_to_u64(r.try_get("hold_version")?)?,
        resolved_at_ms: resolved.map(i64_to_u64).transpose()?,
    })
}

fn row_to_payment(r: &sqlx::any::AnyRow) -> anyhow::Result<PaymentOutcome> {
    let id_str: String = r.try_get("reservation_id")?;
    let decision_str: String = r.try_get("decision")?;

    Ok(PaymentOutcome {
        reservation_id: Uuid::parse_str(&id_str).context("invalid reservation_id")?,
        decision: PaymentDecision::from_str(&decision_str)?,
        processed_at_ms: i64_to_u64(r.try_get("processed_at_ms")?)?,
    })
}
