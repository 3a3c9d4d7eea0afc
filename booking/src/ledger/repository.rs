use async_trait::async_trait;

use crate::error::LedgerError;
use crate::ledger::model::{PaymentOutcome, Reservation, ReservationId, ReservationStatus};
use crate::slot::model::SlotId;

/// Append-mostly audit record of reservations and the payment callbacks they received.
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    /// Appends a PENDING reservation.
    async fn record(&self, reservation: &Reservation) -> Result<ReservationId, LedgerError>;

    /// PENDING -> CONFIRMED | FAILED | EXPIRED, exactly once. Any other source
    /// state yields `InvalidTransition`.
    async fn mark_outcome(
        &self,
        id: ReservationId,
        status: ReservationStatus,
        at_ms: u64,
    ) -> Result<(), LedgerError>;

    async fn get(&self, id: ReservationId) -> Result<Reservation, LedgerError>;

    async fn list_pending(&self) -> Result<Vec<Reservation>, LedgerError>;

    /// PENDING reservations whose hold expired at or before `now_ms`, oldest first.
    async fn list_expired_pending(
        &self,
        now_ms: u64,
        limit: usize,
    ) -> Result<Vec<Reservation>, LedgerError>;

    async fn pending_for_slot(&self, slot_id: SlotId) -> Result<Vec<Reservation>, LedgerError>;

    /// Insert-if-absent. Returns the outcome that is on record after the call,
    /// which is the first one ever received for that reservation.
    async fn record_payment(&self, outcome: &PaymentOutcome) -> Result<PaymentOutcome, LedgerError>;

    async fn payment_for(&self, id: ReservationId) -> Result<Option<PaymentOutcome>, LedgerError>;
}

/// Marks `status` unless another path already recorded an outcome, and returns
/// the status that ends up on record. Losing here is expected under races
/// (duplicate callbacks, timer vs payment), so it is logged and not raised.
pub async fn record_outcome(
    ledger: &dyn ReservationLedger,
    id: ReservationId,
    status: ReservationStatus,
    at_ms: u64,
) -> Result<ReservationStatus, LedgerError> {
    match ledger.mark_outcome(id, status, at_ms).await {
        Ok(()) => Ok(status),
        Err(LedgerError::InvalidTransition { from, to, .. }) => {
            tracing::warn!(
                reservation_id = %id,
                %from,
                %to,
                "reservation outcome already recorded; keeping existing"
            );
            Ok(from)
        }
        Err(e) => Err(e),
    }
}
