//! Booking Core: the facade the transport layer talks to.
//!
//! Composes the catalog, the slot store, the hold manager, the ledger and the
//! payment reconciler. Also owns the two recovery paths that keep holds from
//! leaking when timers are lost: `recover` at startup and `sweep_expired` on a
//! fixed cadence.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use sqlx::AnyPool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::catalog::model::{Resource, ResourceId};
use crate::catalog::repository::CatalogRepository;
use crate::catalog::repository_sqlx::SqlxCatalogRepository;
use crate::clock::{Clock, MonotonicClock};
use crate::error::BookingError;
use crate::hold::manager::{HoldManager, HoldOutcome, HoldTicket, ReleaseOutcome};
use crate::ledger::model::{PaymentDecision, Reservation, ReservationId, ReservationStatus};
use crate::ledger::repository::{ReservationLedger, record_outcome};
use crate::ledger::repository_sqlx::SqlxReservationLedger;
use crate::metrics::counters::Counters;
use crate::payment::reconciler::PaymentReconciler;
use crate::payment::types::PaymentResult;
use crate::slot::model::{SlotId, SlotStatus, TimeSlot};
use crate::slot::settle::{Settlement, deduce_settlement, settle_hold};
use crate::slot::store::SlotStore;
use crate::slot::store_sqlx::SqlxSlotStore;

const MAX_EMAIL_LEN: usize = 254;

/// What a startup recovery pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// PENDING holds still live; timers re-armed for the remaining time.
    pub rearmed: usize,
    /// PENDING holds already overdue; released and marked EXPIRED.
    pub expired: usize,
    /// PENDING reservations whose slot had already moved; ledger caught up.
    pub reconciled: usize,
    /// HOLD slots with no recorded owner; released.
    pub orphans_released: usize,
}

pub struct BookingCore {
    catalog: Arc<dyn CatalogRepository>,
    slots: Arc<dyn SlotStore>,
    ledger: Arc<dyn ReservationLedger>,
    clock: Arc<dyn Clock>,
    holds: HoldManager,
    reconciler: PaymentReconciler,
    hold_duration: Duration,
    counters: Counters,
}

impl BookingCore {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        slots: Arc<dyn SlotStore>,
        ledger: Arc<dyn ReservationLedger>,
        clock: Arc<dyn Clock>,
        hold_duration: Duration,
        counters: Counters,
    ) -> Self {
        let holds = HoldManager::new(
            slots.clone(),
            ledger.clone(),
            clock.clone(),
            counters.clone(),
        );
        let reconciler = PaymentReconciler::new(
            slots.clone(),
            ledger.clone(),
            holds.clone(),
            clock.clone(),
            counters.clone(),
        );

        Self {
            catalog,
            slots,
            ledger,
            clock,
            holds,
            reconciler,
            hold_duration,
            counters,
        }
    }

    /// All repositories on one sqlx pool, wall clock via `MonotonicClock`.
    pub fn with_sqlx(pool: AnyPool, hold_duration: Duration, counters: Counters) -> Self {
        Self::new(
            Arc::new(SqlxCatalogRepository::new(pool.clone())),
            Arc::new(SqlxSlotStore::new(pool.clone())),
            Arc::new(SqlxReservationLedger::new(pool)),
            Arc::new(MonotonicClock::new()),
            hold_duration,
            counters,
        )
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn hold_duration(&self) -> Duration {
        self.hold_duration
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, BookingError> {
        Ok(self.catalog.list_resources().await?)
    }

    pub async fn list_time_slots(
        &self,
        resource_id: ResourceId,
        start_date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        if self.catalog.fetch_resource(resource_id).await?.is_none() {
            return Err(BookingError::ResourceNotFound(resource_id));
        }
        Ok(self.catalog.list_time_slots(resource_id, start_date).await?)
    }

    /// Holds `slot_id` for `user_email` and records a PENDING reservation.
    ///
    /// If the ledger write fails the hold is given back before the error is
    /// returned, so a failed call never leaves the slot in HOLD.
    #[instrument(skip(self, user_email), target = "booking")]
    pub async fn create_reservation(
        &self,
        slot_id: SlotId,
        user_email: &str,
    ) -> Result<Reservation, BookingError> {
        let user_email = validate_email(user_email)?;
        let reservation_id = Uuid::new_v4();
        let created_at_ms = self.clock.now_ms();

        let (expires_at_ms, hold_version) = match self
            .holds
            .attempt_hold(slot_id, reservation_id, self.hold_duration)
            .await?
        {
            HoldOutcome::Held {
                expires_at_ms,
                hold_version,
            } => (expires_at_ms, hold_version),
            HoldOutcome::SlotUnavailable => return Err(BookingError::SlotUnavailable(slot_id)),
        };

        let reservation = Reservation::new_pending(
            reservation_id,
            slot_id,
            user_email,
            created_at_ms,
            expires_at_ms,
            hold_version,
        );

        if let Err(e) = self.ledger.record(&reservation).await {
            warn!(error = ?e, %reservation_id, "recording reservation failed; releasing hold");
            let ticket = HoldTicket {
                slot_id,
                reservation_id,
                hold_version,
            };
            if let Err(release_err) = self.holds.abandon_hold(ticket).await {
                // Timer is gone; the startup orphan scan is the remaining backstop.
                warn!(error = ?release_err, %reservation_id, "releasing abandoned hold failed");
            }
            return Err(e.into());
        }

        info!(%reservation_id, expires_at_ms, "reservation created");
        Ok(reservation)
    }

    pub async fn process_payment(
        &self,
        reservation_id: ReservationId,
        decision: PaymentDecision,
    ) -> Result<PaymentResult, BookingError> {
        self.reconciler
            .process_payment(reservation_id, decision)
            .await
    }

    pub async fn get_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Reservation, BookingError> {
        Ok(self.ledger.get(reservation_id).await?)
    }

    /// Rebuilds in-memory hold state after a restart. Must run before the
    /// instance starts serving.
    #[instrument(skip(self), target = "booking")]
    pub async fn recover(&self) -> Result<RecoveryReport, BookingError> {
        let mut report = RecoveryReport::default();
        let now = self.clock.now_ms();

        for r in self.ledger.list_pending().await? {
            let slot = self.slots.read(r.time_slot_id).await?;

            if slot.status == SlotStatus::Hold && slot.version == r.hold_version {
                if r.is_hold_expired(now) {
                    if self.holds.expire_reservation(&r).await? == ReleaseOutcome::Released {
                        report.expired += 1;
                    }
                } else {
                    let remaining = Duration::from_millis(r.hold_expires_at_ms - now);
                    self.holds.arm_timer(
                        HoldTicket {
                            slot_id: r.time_slot_id,
                            reservation_id: r.id,
                            hold_version: r.hold_version,
                        },
                        remaining,
                    );
                    report.rearmed += 1;
                }
                continue;
            }

            // Slot moved but the ledger write never happened.
            let status = match deduce_settlement(&slot, r.hold_version) {
                Settlement::AlreadyReserved => ReservationStatus::Confirmed,
                _ => ReservationStatus::Expired,
            };
            let on_record = record_outcome(self.ledger.as_ref(), r.id, status, now).await?;
            info!(
                reservation_id = %r.id,
                slot_id = r.time_slot_id,
                status = %on_record,
                "pending reservation reconciled from slot"
            );
            report.reconciled += 1;
        }

        for slot in self.slots.list_by_status(SlotStatus::Hold).await? {
            let owners = self.ledger.pending_for_slot(slot.id).await?;
            if owners.iter().any(|r| r.hold_version == slot.version) {
                continue;
            }

            if let Settlement::Applied { .. } =
                settle_hold(self.slots.as_ref(), slot.id, slot.version, SlotStatus::Available)
                    .await?
            {
                warn!(slot_id = slot.id, version = slot.version, "orphan hold released");
                report.orphans_released += 1;
            }
        }

        info!(?report, "recovery complete");
        Ok(report)
    }

    /// Expires up to `limit` PENDING reservations whose hold deadline passed.
    /// Returns how many slots were released.
    pub async fn sweep_expired(&self, limit: usize) -> Result<usize, BookingError> {
        let now = self.clock.now_ms();
        let overdue = self.ledger.list_expired_pending(now, limit).await?;

        let mut released = 0;
        for r in &overdue {
            self.holds.cancel_timer(&r.id);
            if self.holds.expire_reservation(r).await? == ReleaseOutcome::Released {
                released += 1;
            }
        }

        if released > 0 {
            info!(released, scanned = overdue.len(), "expiry sweep released holds");
        }
        Ok(released)
    }

    /// Cancels every outstanding hold timer. Holds stay in the store and are
    /// picked up by `recover` on the next start.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.holds.timers().cancel_all();
        info!(cancelled, "booking core stopped");
        cancelled
    }

    #[cfg(test)]
    pub(crate) fn holds(&self) -> &HoldManager {
        &self.holds
    }
}

fn validate_email(raw: &str) -> Result<&str, BookingError> {
    let email = raw.trim();
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(BookingError::Validation("userEmail is required".into()));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(email)
        }
        _ => Err(BookingError::Validation(format!(
            "userEmail '{email}' is not a valid address"
        ))),
    }
}
