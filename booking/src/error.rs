use thiserror::Error;

use crate::catalog::model::ResourceId;
use crate::ledger::model::{ReservationId, ReservationStatus};
use crate::slot::model::{SlotId, SlotStatus};

/// Failures of the slot store's compare-and-swap primitive.
#[derive(Error, Debug)]
pub enum SlotStoreError {
    #[error("time slot {0} not found")]
    NotFound(SlotId),

    /// The slot no longer matches the expected status/version. Callers re-read
    /// and decide; this never crosses the hold manager / reconciler boundary.
    #[error("time slot {slot_id} changed concurrently (expected {expected_status} v{expected_version})")]
    Conflict {
        slot_id: SlotId,
        expected_status: SlotStatus,
        expected_version: u64,
    },

    #[error("illegal time slot transition {from} -> {to}")]
    IllegalTransition { from: SlotStatus, to: SlotStatus },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("reservation {0} not found")]
    NotFound(ReservationId),

    #[error("reservation {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("reservation {0} already recorded")]
    Duplicate(ReservationId),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Errors surfaced by the booking core to its callers.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("resource {0} not found")]
    ResourceNotFound(ResourceId),

    #[error("time slot {0} not found")]
    SlotNotFound(SlotId),

    #[error("time slot {0} is no longer available")]
    SlotUnavailable(SlotId),

    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),

    #[error("internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl From<SlotStoreError> for BookingError {
    fn from(e: SlotStoreError) -> Self {
        match e {
            SlotStoreError::NotFound(id) => BookingError::SlotNotFound(id),
            SlotStoreError::Storage(e) => BookingError::Internal(e),
            other => BookingError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<LedgerError> for BookingError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(id) => BookingError::ReservationNotFound(id),
            LedgerError::Storage(e) => BookingError::Internal(e),
            other => BookingError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<anyhow::Error> for BookingError {
    fn from(e: anyhow::Error) -> Self {
        BookingError::Internal(e)
    }
}
