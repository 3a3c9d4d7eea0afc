//! Applies external payment decisions to a held slot.
//!
//! Invariants:
//! - a reservation is resolved at most once; later callbacks are no-ops
//! - the slot swap from (HOLD, hold_version) decides races with the expiry
//!   timer; whoever loses takes the slot's current state as authoritative
//! - a CONFIRMED reservation always sits on a RESERVED slot

use std::sync::Arc;

use common::logger::{annotate_span, child_span};
use tracing::{Instrument, error, info, warn};

use crate::clock::Clock;
use crate::error::BookingError;
use crate::hold::manager::HoldManager;
use crate::ledger::model::{
    PaymentDecision, PaymentOutcome, Reservation, ReservationId, ReservationStatus,
};
use crate::ledger::repository::{ReservationLedger, record_outcome};
use crate::metrics::counters::Counters;
use crate::payment::types::PaymentResult;
use crate::slot::model::SlotStatus;
use crate::slot::settle::{Settlement, settle_hold};
use crate::slot::store::SlotStore;

pub struct PaymentReconciler {
    slots: Arc<dyn SlotStore>,
    ledger: Arc<dyn ReservationLedger>,
    holds: HoldManager,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl PaymentReconciler {
    pub fn new(
        slots: Arc<dyn SlotStore>,
        ledger: Arc<dyn ReservationLedger>,
        holds: HoldManager,
        clock: Arc<dyn Clock>,
        counters: Counters,
    ) -> Self {
        Self {
            slots,
            ledger,
            holds,
            clock,
            counters,
        }
    }

    pub async fn process_payment(
        &self,
        reservation_id: ReservationId,
        decision: PaymentDecision,
    ) -> Result<PaymentResult, BookingError> {
        async {
            annotate_span(None, Some(&reservation_id));
            let reservation = self.ledger.get(reservation_id).await?;
            annotate_span(Some(reservation.time_slot_id), None);

            if reservation.status.is_terminal() {
                Counters::incr(&self.counters.payments_duplicate);
                info!(status = %reservation.status, "payment for resolved reservation ignored");
                return Ok(PaymentResult::for_resolved(reservation.status));
            }

            let now = self.clock.now_ms();

            // First callback on record wins; a contradicting duplicate follows it.
            let on_record = self
                .ledger
                .record_payment(&PaymentOutcome {
                    reservation_id,
                    decision,
                    processed_at_ms: now,
                })
                .await?;
            if on_record.decision != decision {
                warn!(
                    received = %decision,
                    recorded = %on_record.decision,
                    "conflicting payment decision; applying the first one received"
                );
            }

            let result = if reservation.is_hold_expired(now) {
                self.expire(&reservation, now).await?
            } else {
                match on_record.decision {
                    PaymentDecision::Success => self.confirm(&reservation, now).await?,
                    PaymentDecision::Fail => self.release(&reservation, now).await?,
                }
            };

            self.holds.cancel_timer(&reservation_id);
            self.count(result);

            info!(%decision, %result, "payment processed");
            Ok::<_, BookingError>(result)
        }
        .instrument(child_span("process_payment"))
        .await
    }

    /// HOLD -> RESERVED, then PENDING -> CONFIRMED.
    async fn confirm(&self, r: &Reservation, now: u64) -> Result<PaymentResult, BookingError> {
        match self.settle(r, SlotStatus::Reserved).await? {
            Settlement::Applied { .. } => {
                self.resolve_as_winner(r, ReservationStatus::Confirmed, now)
                    .await?;
                Ok(PaymentResult::Confirmed)
            }
            lost => {
                self.resolve_as_loser(r, lost, ReservationStatus::Confirmed, now)
                    .await
            }
        }
    }

    /// HOLD -> AVAILABLE, then PENDING -> FAILED.
    async fn release(&self, r: &Reservation, now: u64) -> Result<PaymentResult, BookingError> {
        match self.settle(r, SlotStatus::Available).await? {
            Settlement::Applied { .. } => {
                self.resolve_as_winner(r, ReservationStatus::Failed, now)
                    .await?;
                Ok(PaymentResult::Released)
            }
            lost => {
                self.resolve_as_loser(r, lost, ReservationStatus::Failed, now)
                    .await
            }
        }
    }

    /// Hold ran out before the callback: release (best effort) and mark EXPIRED.
    async fn expire(&self, r: &Reservation, now: u64) -> Result<PaymentResult, BookingError> {
        match self.settle(r, SlotStatus::Available).await? {
            Settlement::Applied { .. } => {
                self.resolve_as_winner(r, ReservationStatus::Expired, now)
                    .await?;
                Ok(PaymentResult::Expired)
            }
            lost => {
                self.resolve_as_loser(r, lost, ReservationStatus::Expired, now)
                    .await
            }
        }
    }

    async fn settle(&self, r: &Reservation, target: SlotStatus) -> Result<Settlement, BookingError> {
        let settlement =
            settle_hold(self.slots.as_ref(), r.time_slot_id, r.hold_version, target).await?;
        if !matches!(settlement, Settlement::Applied { .. }) {
            Counters::incr(&self.counters.cas_conflicts);
        }
        Ok(settlement)
    }

    async fn resolve_as_winner(
        &self,
        r: &Reservation,
        status: ReservationStatus,
        now: u64,
    ) -> Result<(), BookingError> {
        let on_record = record_outcome(self.ledger.as_ref(), r.id, status, now).await?;
        if on_record != status {
            // Only the swap winner may resolve; anything else is an ordering bug.
            error!(
                slot_id = r.time_slot_id,
                expected = %status,
                recorded = %on_record,
                "ledger outcome disagrees with slot transition"
            );
        }
        Ok(())
    }

    /// The slot already moved: derive the outcome from it, record it for the
    /// audit trail, and answer from whatever the ledger ends up holding.
    ///
    /// `intended` is the status this callback was driving towards. A release
    /// of a live hold while a FAIL is being applied came from a duplicate FAIL
    /// callback, not from expiry, so it is recorded as FAILED.
    async fn resolve_as_loser(
        &self,
        r: &Reservation,
        lost: Settlement,
        intended: ReservationStatus,
        now: u64,
    ) -> Result<PaymentResult, BookingError> {
        let deduced = match lost {
            Settlement::AlreadyReserved => ReservationStatus::Confirmed,
            _ if intended == ReservationStatus::Failed && !r.is_hold_expired(now) => {
                ReservationStatus::Failed
            }
            _ => ReservationStatus::Expired,
        };

        let on_record = record_outcome(self.ledger.as_ref(), r.id, deduced, now).await?;

        info!(
            slot_id = r.time_slot_id,
            settlement = ?lost,
            status = %on_record,
            "hold settled concurrently"
        );
        Ok(PaymentResult::for_resolved(on_record))
    }

    fn count(&self, result: PaymentResult) {
        let c = match result {
            PaymentResult::Confirmed => &self.counters.payments_confirmed,
            PaymentResult::Released => &self.counters.payments_released,
            PaymentResult::AlreadyProcessed => &self.counters.payments_duplicate,
            PaymentResult::Expired => &self.counters.payments_expired,
        };
        Counters::incr(c);
    }
}
