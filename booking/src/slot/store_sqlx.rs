use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use common::logger::warn_if_slow;
use sqlx::{AnyPool, Row};
use tracing::{debug, instrument};

use crate::db::convert::{i64_to_u64, u64_to_i64};
use crate::error::SlotStoreError;
use crate::slot::model::{SlotId, SlotStatus, TimeSlot};
use crate::slot::store::SlotStore;

pub(crate) const SLOT_COLUMNS: &str =
    "slot_id, resource_id, reservation_date, start_time, end_time, status, version";

pub(crate) const DATE_FMT: &str = "%Y-%m-%d";
pub(crate) const TIME_FMT: &str = "%H:%M:%S";

/// SQLx-backed slot store. The CAS is a single conditional UPDATE, so it holds
/// across connections and across service instances sharing the database.
pub struct SqlxSlotStore {
    pool: AnyPool,
}

impl SqlxSlotStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, slot_id: SlotId) -> anyhow::Result<Option<TimeSlot>> {
        let row = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM time_slots WHERE slot_id = ?;"
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .context("time slot lookup failed")?;

        row.as_ref().map(row_to_slot).transpose()
    }
}

#[async_trait]
impl SlotStore for SqlxSlotStore {
    #[instrument(skip(self), target = "slot_store")]
    async fn read(&self, slot_id: SlotId) -> Result<TimeSlot, SlotStoreError> {
        self.fetch(slot_id)
            .await?
            .ok_or(SlotStoreError::NotFound(slot_id))
    }

    #[instrument(skip(self), target = "slot_store")]
    async fn try_transition(
        &self,
        slot_id: SlotId,
        expected_status: SlotStatus,
        expected_version: u64,
        new_status: SlotStatus,
    ) -> Result<u64, SlotStoreError> {
        if !expected_status.can_transition_to(new_status) {
            return Err(SlotStoreError::IllegalTransition {
                from: expected_status,
                to: new_status,
            });
        }

        let expected_version_i64 = u64_to_i64(expected_version)?;

        let result = warn_if_slow("db_slot_cas", Duration::from_millis(50), async {
            sqlx::query(
                r#"
UPDATE time_slots
SET status = ?, version = version + 1
WHERE slot_id = ? AND status = ? AND version = ?;
"#,
            )
            .bind(new_status.as_str())
            .bind(slot_id)
            .bind(expected_status.as_str())
            .bind(expected_version_i64)
            .execute(&self.pool)
            .await
        })
        .await
        .context("time slot compare-and-swap failed")?;

        if result.rows_affected() == 1 {
            debug!(new_version = expected_version + 1, "slot transition applied");
            return Ok(expected_version + 1);
        }

        // Lost: find out whether the row is gone or merely moved on.
        match self.fetch(slot_id).await? {
            None => Err(SlotStoreError::NotFound(slot_id)),
            Some(current) => {
                debug!(
                    current_status = %current.status,
                    current_version = current.version,
                    "slot transition rejected"
                );
                Err(SlotStoreError::Conflict {
                    slot_id,
                    expected_status,
                    expected_version,
                })
            }
        }
    }

    async fn list_by_status(&self, status: SlotStatus) -> Result<Vec<TimeSlot>, SlotStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM time_slots WHERE status = ? ORDER BY slot_id;"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .context("time slot listing failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            out.push(row_to_slot(r)?);
        }
        Ok(out)
    }
}

/* =========================
Row mapping
========================= */

pub(crate) fn row_to_slot(r: &sqlx::any::AnyRow) -> anyhow::Result<TimeSlot> {
    let status_str: String = r.try_get("status")?;
    let date_str: String = r.try_get("reservation_date")?;
    let start_str: String = r.try_get("start_time")?;
    let end_str: String = r.try_get("end_time")?;

    Ok(TimeSlot {
        id: r.try_get("slot_id")?,
        resource_id: r.try_get("resource_id")?,
        reservation_date: NaiveDate::parse_from_str(&date_str, DATE_FMT)
            .map_err(|e| anyhow!("invalid reservation_date '{}': {}", date_str, e))?,
        start_time: NaiveTime::parse_from_str(&start_str, TIME_FMT)
            .map_err(|e| anyhow!("invalid start_time '{}': {}", start_str, e))?,
        end_time: NaiveTime::parse_from_str(&end_str, TIME_FMT)
            .map_err(|e| anyhow!("invalid end_time '{}': {}", end_str, e))?,
        status: SlotStatus::from_str(&status_str)?,
        version: i64_to_u64(r.try_get("version")?)?,
    })
}
