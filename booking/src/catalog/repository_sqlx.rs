use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{AnyPool, Row};

use crate::catalog::model::{NewResource, NewTimeSlot, Resource, ResourceId};
use crate::catalog::repository::CatalogRepository;
use crate::slot::model::{SlotStatus, TimeSlot};
use crate::slot::store_sqlx::{DATE_FMT, SLOT_COLUMNS, TIME_FMT, row_to_slot};

/// SQLx-backed catalog. Responsible only for persistence and row mapping.
pub struct SqlxCatalogRepository {
    pool: AnyPool,
}

impl SqlxCatalogRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for SqlxCatalogRepository {
    async fn list_resources(&self) -> anyhow::Result<Vec<Resource>> {
        let rows = sqlx::query(
            "SELECT resource_id, name, description, category FROM resources ORDER BY resource_id;",
        )
        .fetch_all(&self.pool)
        .await
        .context("resource listing failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_resource(&r) {
                Ok(res) => out.push(res),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the listing
                    tracing::warn!(error = %e, "skipping malformed resource row");
                }
            }
        }
        Ok(out)
    }

    async fn fetch_resource(&self, resource_id: ResourceId) -> anyhow::Result<Option<Resource>> {
        let row = sqlx::query(
            "SELECT resource_id, name, description, category FROM resources WHERE resource_id = ?;",
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("resource {resource_id} lookup failed"))?;

        row.as_ref().map(row_to_resource).transpose()
    }

    async fn list_time_slots(
        &self,
        resource_id: ResourceId,
        start_date: NaiveDate,
    ) -> anyhow::Result<Vec<TimeSlot>> {
        let rows = sqlx::query(&format!(
            r#"
SELECT {SLOT_COLUMNS}
FROM time_slots
WHERE resource_id = ? AND reservation_date >= ?
ORDER BY reservation_date, start_time;
"#
        ))
        .bind(resource_id)
        .bind(start_date.format(DATE_FMT).to_string())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("time slot listing failed for resource {resource_id}"))?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_slot(&r) {
                Ok(s) => out.push(s),
                Err(e) => {
                    tracing::warn!(error = %e, resource_id, "skipping malformed time slot row");
                }
            }
        }
        Ok(out)
    }

    async fn create_resource(&self, resource: NewResource) -> anyhow::Result<Resource> {
        if resource.name.trim().is_empty() {
            return Err(anyhow!("resource name must not be empty"));
        }

        let row = sqlx::query(
            r#"
INSERT INTO resources (name, description, category)
VALUES (?, ?, ?)
RETURNING resource_id;
"#,
        )
        .bind(resource.name.clone())
        .bind(resource.description.clone())
        .bind(resource.category.clone())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert resource")?;

        Ok(Resource {
            id: row.try_get("resource_id")?,
            name: resource.name,
            description: resource.description,
            category: resource.category,
        })
    }

    async fn create_time_slot(&self, slot: NewTimeSlot) -> anyhow::Result<TimeSlot> {
        slot.validate().map_err(|e| anyhow!(e))?;

        if self.fetch_resource(slot.resource_id).await?.is_none() {
            return Err(anyhow!("resource {} does not exist", slot.resource_id));
        }

        let row = sqlx::query(
            r#"
INSERT INTO time_slots (resource_id, reservation_date, start_time, end_time, status, version)
VALUES (?, ?, ?, ?, 'AVAILABLE', 0)
RETURNING slot_id;
"#,
        )
        .bind(slot.resource_id)
        .bind(slot.reservation_date.format(DATE_FMT).to_string())
        .bind(slot.start_time.format(TIME_FMT).to_string())
        .bind(slot.end_time.format(TIME_FMT).to_string())
        .fetch_one(&self.pool)
        .await
        .with_context(|| {
            format!(
                "failed to insert time slot {} {}-{} for resource {}",
                slot.reservation_date, slot.start_time, slot.end_time, slot.resource_id
            )
        })?;

        Ok(TimeSlot {
            id: row.try_get("slot_id")?,
            resource_id: slot.resource_id,
            reservation_date: slot.reservation_date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: SlotStatus::Available,
            version: 0,
        })
    }
}

fn row_to_resource(r: &sqlx::any::AnyRow) -> anyhow::Result<Resource> {
    Ok(Resource {
        id: r.try_get("resource_id")?,
        name: r.try_get("name")?,
        description: r.try_get("description")?,
        category: r.try_get("category")?,
    })
}
