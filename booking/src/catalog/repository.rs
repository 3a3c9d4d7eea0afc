use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::catalog::model::{NewResource, NewTimeSlot, Resource, ResourceId};
use crate::slot::model::TimeSlot;

/// Read side of the catalog plus the seeding operations the catalog owner uses.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_resources(&self) -> Result<Vec<Resource>>;

    async fn fetch_resource(&self, resource_id: ResourceId) -> Result<Option<Resource>>;

    /// Slots of `resource_id` dated on or after `start_date`, by date then start time.
    async fn list_time_slots(
        &self,
        resource_id: ResourceId,
        start_date: NaiveDate,
    ) -> Result<Vec<TimeSlot>>;

    async fn create_resource(&self, resource: NewResource) -> Result<Resource>;

    async fn create_time_slot(&self, slot: NewTimeSlot) -> Result<TimeSlot>;
}
