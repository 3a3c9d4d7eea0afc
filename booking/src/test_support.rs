//! In-memory stand-ins for the repositories, used by unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use parking_lot::Mutex;
use tokio::sync::Barrier;

use crate::error::{LedgerError, SlotStoreError};
use crate::ledger::model::{PaymentOutcome, Reservation, ReservationId, ReservationStatus};
use crate::ledger::repository::ReservationLedger;
use crate::slot::model::{SlotId, SlotStatus, TimeSlot};
use crate::slot::store::SlotStore;

pub fn slot(id: SlotId) -> TimeSlot {
    TimeSlot {
        id,
        resource_id: 1,
        reservation_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        status: SlotStatus::Available,
        version: 0,
    }
}

pub fn pending_for(
    id: ReservationId,
    slot_id: SlotId,
    hold_expires_at_ms: u64,
    hold_version: u64,
) -> Reservation {
    Reservation::new_pending(id, slot_id, "guest@example.com", 0, hold_expires_at_ms, hold_version)
}

#[derive(Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<SlotId, TimeSlot>>,
}

impl MemorySlotStore {
    pub fn with_available(ids: &[SlotId]) -> Self {
        Self {
            slots: Mutex::new(ids.iter().map(|id| (*id, slot(*id))).collect()),
        }
    }

    pub fn status_of(&self, id: SlotId) -> (SlotStatus, u64) {
        let slots = self.slots.lock();
        let s = slots.get(&id).expect("unknown slot");
        (s.status, s.version)
    }

    /// Bypasses the CAS; test setup only.
    pub fn force(&self, id: SlotId, status: SlotStatus, version: u64) {
        let mut slots = self.slots.lock();
        let s = slots.get_mut(&id).expect("unknown slot");
        s.status = status;
        s.version = version;
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn read(&self, slot_id: SlotId) -> Result<TimeSlot, SlotStoreError> {
        // Give other tasks a chance to run between read and swap.
        tokio::task::yield_now().await;
        self.slots
            .lock()
            .get(&slot_id)
            .cloned()
            .ok_or(SlotStoreError::NotFound(slot_id))
    }

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

        let mut slots = self.slots.lock();
        let s = slots
            .get_mut(&slot_id)
            .ok_or(SlotStoreError::NotFound(slot_id))?;

        if s.status != expected_status || s.version != expected_version {
            return Err(SlotStoreError::Conflict {
                slot_id,
                expected_status,
                expected_version,
            });
        }

        s.status = new_status;
        s.version += 1;
        Ok(s.version)
    }

    async fn list_by_status(&self, status: SlotStatus) -> Result<Vec<TimeSlot>, SlotStoreError> {
        let mut out: Vec<TimeSlot> = self
            .slots
            .lock()
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.id);
        Ok(out)
    }
}

/// Holds every swap until `parties` callers have reached it, then lets the
/// winner stall for `winner_delay` before returning. Forces two settlement
/// paths to collide on the same hold version.
pub struct GatedSlotStore {
    pub inner: Arc<MemorySlotStore>,
    gate: Barrier,
    winner_delay: Duration,
}

impl GatedSlotStore {
    pub fn new(inner: Arc<MemorySlotStore>, parties: usize, winner_delay: Duration) -> Self {
        Self {
            inner,
            gate: Barrier::new(parties),
            winner_delay,
        }
    }
}

#[async_trait]
impl SlotStore for GatedSlotStore {
    async fn read(&self, slot_id: SlotId) -> Result<TimeSlot, SlotStoreError> {
        self.inner.read(slot_id).await
    }

    async fn try_transition(
        &self,
        slot_id: SlotId,
        expected_status: SlotStatus,
        expected_version: u64,
        new_status: SlotStatus,
    ) -> Result<u64, SlotStoreError> {
        self.gate.wait().await;
        let res = self
            .inner
            .try_transition(slot_id, expected_status, expected_version, new_status)
            .await;
        if res.is_ok() {
            tokio::time::sleep(self.winner_delay).await;
        }
        res
    }

    async fn list_by_status(&self, status: SlotStatus) -> Result<Vec<TimeSlot>, SlotStoreError> {
        self.inner.list_by_status(status).await
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    reservations: Mutex<HashMap<ReservationId, Reservation>>,
    payments: Mutex<HashMap<ReservationId, PaymentOutcome>>,
    /// When set, `record` fails with a storage error.
    pub fail_record: Mutex<bool>,
}

impl MemoryLedger {
    pub fn insert(&self, r: Reservation) {
        self.reservations.lock().insert(r.id, r);
    }

    pub fn status_of(&self, id: ReservationId) -> Option<ReservationStatus> {
        self.reservations.lock().get(&id).map(|r| r.status)
    }

    pub fn payments_recorded(&self) -> usize {
        self.payments.lock().len()
    }
}

#[async_trait]
impl ReservationLedger for MemoryLedger {
    async fn record(&self, reservation: &Reservation) -> Result<ReservationId, LedgerError> {
        if *self.fail_record.lock() {
            return Err(LedgerError::Storage(anyhow::anyhow!("Database Offline")));
        }
        let mut map = self.reservations.lock();
        if map.contains_key(&reservation.id) {
            return Err(LedgerError::Duplicate(reservation.id));
        }
        map.insert(reservation.id, reservation.clone());
        Ok(reservation.id)
    }

    async fn mark_outcome(
        &self,
        id: ReservationId,
        status: ReservationStatus,
        at_ms: u64,
    ) -> Result<(), LedgerError> {
        let mut map = self.reservations.lock();
        let r = map.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        if !r.status.can_transition_to(status) {
            return Err(LedgerError::InvalidTransition {
                id,
                from: r.status,
                to: status,
            });
        }
        r.status = status;
        r.resolved_at_ms = Some(at_ms);
        Ok(())
    }

    async fn get(&self, id: ReservationId) -> Result<Reservation, LedgerError> {
        tokio::task::yield_now().await;
        self.reservations
            .lock()
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound(id))
    }

    async fn list_pending(&self) -> Result<Vec<Reservation>, LedgerError> {
        let mut out: Vec<Reservation> = self
            .reservations
            .lock()
            .values()
            .filter(|r| r.status == ReservationStatus::Pending)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.created_at_ms);
        Ok(out)
    }

    async fn list_expired_pending(
        &self,
        now_ms: u64,
        limit: usize,
    ) -> Result<Vec<Reservation>, LedgerError> {
        let mut out: Vec<Reservation> = self
            .reservations
            .lock()
            .values()
            .filter(|r| r.status == ReservationStatus::Pending && r.hold_expires_at_ms <= now_ms)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.hold_expires_at_ms);
        out.truncate(limit);
        Ok(out)
    }

    async fn pending_for_slot(&self, slot_id: SlotId) -> Result<Vec<Reservation>, LedgerError> {
        Ok(self
            .reservations
            .lock()
            .values()
            .filter(|r| r.time_slot_id == slot_id && r.status == ReservationStatus::Pending)
            .cloned()
            .collect())
    }

    async fn record_payment(&self, outcome: &PaymentOutcome) -> Result<PaymentOutcome, LedgerError> {
        Ok(self
            .payments
            .lock()
            .entry(outcome.reservation_id)
            .or_insert_with(|| outcome.clone())
            .clone())
    }

    async fn payment_for(&self, id: ReservationId) -> Result<Option<PaymentOutcome>, LedgerError> {
        Ok(self.payments.lock().get(&id).cloned())
    }
}
