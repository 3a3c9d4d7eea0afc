use async_trait::async_trait;

use crate::error::SlotStoreError;
use crate::slot::model::{SlotId, SlotStatus, TimeSlot};

/// Single source of truth for slot status.
///
/// `try_transition` is the only way slot status changes. It is an optimistic
/// compare-and-swap on (status, version): it never blocks, and a loser gets
/// `Conflict` immediately.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn read(&self, slot_id: SlotId) -> Result<TimeSlot, SlotStoreError>;

    /// Returns the new version on success.
    async fn try_transition(
        &self,
        slot_id: SlotId,
        expected_status: SlotStatus,
        expected_version: u64,
        new_status: SlotStatus,
    ) -> Result<u64, SlotStoreError>;

    async fn list_by_status(&self, status: SlotStatus) -> Result<Vec<TimeSlot>, SlotStoreError>;
}
