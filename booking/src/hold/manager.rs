//! Admission control for time slots.
//!
//! A hold is a single versioned AVAILABLE -> HOLD swap on the slot store, so of
//! any number of simultaneous attempts on one slot exactly one wins and every
//! other caller gets `SlotUnavailable` straight away. Each hold gets a
//! cancellable expiry timer; when it fires, the reservation is re-validated
//! against the ledger before anything is released.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::clock::Clock;
use crate::clock::timer::TimerService;
use crate::error::{BookingError, LedgerError, SlotStoreError};
use crate::ledger::model::{Reservation, ReservationId, ReservationStatus};
use crate::ledger::repository::{ReservationLedger, record_outcome};
use crate::metrics::counters::Counters;
use crate::slot::model::{SlotId, SlotStatus};
use crate::slot::settle::{Settlement, settle_hold};
use crate::slot::store::SlotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    Held {
        expires_at_ms: u64,
        hold_version: u64,
    },
    SlotUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The hold was released and the reservation marked EXPIRED.
    Released,
    /// The reservation is not (or no longer) a pending holder of this slot.
    NotHolder,
    /// Another path settled the hold first; it records the ledger outcome.
    AlreadySettled,
}

/// Everything an expiry timer needs, captured when the hold is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldTicket {
    pub slot_id: SlotId,
    pub reservation_id: ReservationId,
    pub hold_version: u64,
}

#[derive(Clone)]
pub struct HoldManager {
    slots: Arc<dyn SlotStore>,
    ledger: Arc<dyn ReservationLedger>,
    clock: Arc<dyn Clock>,
    timers: TimerService,
    counters: Counters,
}

impl HoldManager {
    pub fn new(
        slots: Arc<dyn SlotStore>,
        ledger: Arc<dyn ReservationLedger>,
        clock: Arc<dyn Clock>,
        counters: Counters,
    ) -> Self {
        Self {
            slots,
            ledger,
            clock,
            timers: TimerService::new(),
            counters,
        }
    }

    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    /// Tries to move `slot_id` from AVAILABLE to HOLD on behalf of `reservation_id`.
    ///
    /// A lost swap is reported as `SlotUnavailable` and never retried: someone
    /// else holds the slot.
    #[instrument(skip(self), target = "hold", fields(reservation_id = %reservation_id))]
    pub async fn attempt_hold(
        &self,
        slot_id: SlotId,
        reservation_id: ReservationId,
        hold: Duration,
    ) -> Result<HoldOutcome, BookingError> {
        let slot = self.slots.read(slot_id).await?;

        if slot.status != SlotStatus::Available {
            debug!(status = %slot.status, "slot not available");
            Counters::incr(&self.counters.holds_rejected);
            return Ok(HoldOutcome::SlotUnavailable);
        }

        match self
            .slots
            .try_transition(slot_id, SlotStatus::Available, slot.version, SlotStatus::Hold)
            .await
        {
            Ok(hold_version) => {
                let expires_at_ms = self.clock.now_ms() + hold.as_millis() as u64;

                self.arm_timer(
                    HoldTicket {
                        slot_id,
                        reservation_id,
                        hold_version,
                    },
                    hold,
                );

                Counters::incr(&self.counters.holds_granted);
                info!(hold_version, expires_at_ms, "hold granted");

                Ok(HoldOutcome::Held {
                    expires_at_ms,
                    hold_version,
                })
            }
            Err(SlotStoreError::Conflict { .. }) => {
                debug!("lost hold race");
                Counters::incr(&self.counters.cas_conflicts);
                Counters::incr(&self.counters.holds_rejected);
                Ok(HoldOutcome::SlotUnavailable)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Schedules the expiry of a granted hold after `delay`.
    pub fn arm_timer(&self, ticket: HoldTicket, delay: Duration) {
        let manager = self.clone();

        self.timers.schedule(
            ticket.reservation_id,
            delay,
            Box::pin(async move {
                if let Err(e) = manager.expire_ticket(ticket).await {
                    // The periodic sweep retries anything left PENDING.
                    error!(
                        error = ?e,
                        reservation_id = %ticket.reservation_id,
                        slot_id = ticket.slot_id,
                        "hold expiry failed"
                    );
                }
            }),
        );
    }

    pub fn cancel_timer(&self, reservation_id: &ReservationId) -> bool {
        self.timers.cancel(reservation_id)
    }

    /// Releases the slot only if `reservation_id` is still its pending holder.
    #[instrument(skip(self), target = "hold", fields(reservation_id = %reservation_id))]
    pub async fn release_if_still_held(
        &self,
        slot_id: SlotId,
        reservation_id: ReservationId,
    ) -> Result<ReleaseOutcome, BookingError> {
        let reservation = match self.ledger.get(reservation_id).await {
            Ok(r) => r,
            Err(LedgerError::NotFound(_)) => return Ok(ReleaseOutcome::NotHolder),
            Err(e) => return Err(e.into()),
        };

        if reservation.time_slot_id != slot_id {
            return Ok(ReleaseOutcome::NotHolder);
        }

        self.expire_reservation(&reservation).await
    }

    /// Expires a PENDING reservation: HOLD -> AVAILABLE at its hold version,
    /// then PENDING -> EXPIRED. Writes nothing if another path got there first.
    pub async fn expire_reservation(
        &self,
        reservation: &Reservation,
    ) -> Result<ReleaseOutcome, BookingError> {
        if reservation.status != ReservationStatus::Pending {
            return Ok(ReleaseOutcome::NotHolder);
        }

        let settlement = settle_hold(
            self.slots.as_ref(),
            reservation.time_slot_id,
            reservation.hold_version,
            SlotStatus::Available,
        )
        .await?;

        match settlement {
            Settlement::Applied { version } => {
                record_outcome(
                    self.ledger.as_ref(),
                    reservation.id,
                    ReservationStatus::Expired,
                    self.clock.now_ms(),
                )
                .await?;

                Counters::incr(&self.counters.holds_expired);
                info!(
                    reservation_id = %reservation.id,
                    slot_id = reservation.time_slot_id,
                    slot_version = version,
                    "hold expired; slot released"
                );
                Ok(ReleaseOutcome::Released)
            }
            other => {
                Counters::incr(&self.counters.cas_conflicts);
                debug!(
                    reservation_id = %reservation.id,
                    settlement = ?other,
                    "hold already settled elsewhere"
                );
                Ok(ReleaseOutcome::AlreadySettled)
            }
        }
    }

    /// Gives a hold back without touching the ledger. Used when the
    /// reservation could not be recorded after the hold was granted.
    pub async fn abandon_hold(&self, ticket: HoldTicket) -> Result<Settlement, BookingError> {
        self.timers.cancel(&ticket.reservation_id);

        let settlement = settle_hold(
            self.slots.as_ref(),
            ticket.slot_id,
            ticket.hold_version,
            SlotStatus::Available,
        )
        .await?;

        warn!(
            reservation_id = %ticket.reservation_id,
            slot_id = ticket.slot_id,
            settlement = ?settlement,
            "hold abandoned"
        );
        Ok(settlement)
    }

    async fn expire_ticket(&self, ticket: HoldTicket) -> Result<ReleaseOutcome, BookingError> {
        match self.ledger.get(ticket.reservation_id).await {
            Ok(r) if r.hold_version == ticket.hold_version => self.expire_reservation(&r).await,
            Ok(_) => Ok(ReleaseOutcome::NotHolder),
            Err(LedgerError::NotFound(_)) => {
                // Hold granted but never recorded: release by version alone.
                match self.abandon_hold(ticket).await? {
                    Settlement::Applied { .. } => Ok(ReleaseOutcome::Released),
                    _ => Ok(ReleaseOutcome::AlreadySettled),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
