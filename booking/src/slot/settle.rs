use crate::error::SlotStoreError;
use crate::slot::model::{SlotId, SlotStatus, TimeSlot};
use crate::slot::store::SlotStore;

/// Result of moving a hold out of HOLD on behalf of one reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// This caller won the CAS.
    Applied { version: u64 },
    /// Someone else already confirmed this hold.
    AlreadyReserved,
    /// Someone else already released this hold (expiry, failed payment, or recovery).
    AlreadyReleased,
}

/// Settles the hold taken at `hold_version`, moving the slot to `target`.
///
/// A conflict is not an error here: the slot is re-read and its current state
/// is taken as authoritative. From `(HOLD, v)` only two moves exist, so a slot
/// sitting at `v + 1` in RESERVED was confirmed from this hold; any other state
/// means the hold was released.
pub async fn settle_hold(
    slots: &dyn SlotStore,
    slot_id: SlotId,
    hold_version: u64,
    target: SlotStatus,
) -> Result<Settlement, SlotStoreError> {
    match slots
        .try_transition(slot_id, SlotStatus::Hold, hold_version, target)
        .await
    {
        Ok(version) => Ok(Settlement::Applied { version }),
        Err(SlotStoreError::Conflict { .. }) => {
            let current = slots.read(slot_id).await?;
            Ok(deduce_settlement(&current, hold_version))
        }
        Err(e) => Err(e),
    }
}

pub fn deduce_settlement(current: &TimeSlot, hold_version: u64) -> Settlement {
    if current.status == SlotStatus::Reserved && current.version == hold_version + 1 {
        Settlement::AlreadyReserved
    } else {
        Settlement::AlreadyReleased
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn slot(status: SlotStatus, version: u64) -> TimeSlot {
        TimeSlot {
            id: 1,
            resource_id: 1,
            reservation_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            status,
            version,
        }
    }

    #[test]
    fn reserved_right_after_hold_means_confirmed() {
        assert_eq!(
            deduce_settlement(&slot(SlotStatus::Reserved, 4), 3),
            Settlement::AlreadyReserved
        );
    }

    #[test]
    fn available_after_hold_means_released() {
        assert_eq!(
            deduce_settlement(&slot(SlotStatus::Available, 4), 3),
            Settlement::AlreadyReleased
        );
    }

    #[test]
    fn reserved_by_a_later_hold_is_not_ours() {
        // released at v4, re-held at v5, confirmed at v6 by someone else
        assert_eq!(
            deduce_settlement(&slot(SlotStatus::Reserved, 6), 3),
            Settlement::AlreadyReleased
        );
    }

    #[test]
    fn later_hold_by_someone_else_means_released() {
        assert_eq!(
            deduce_settlement(&slot(SlotStatus::Hold, 5), 3),
            Settlement::AlreadyReleased
        );
    }
}
