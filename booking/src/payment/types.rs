use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ledger::model::ReservationStatus;

/// What `process_payment` did. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentResult {
    /// Hold converted into a reservation; slot is RESERVED.
    Confirmed,
    /// Payment failed; slot is AVAILABLE again.
    Released,
    /// An outcome was already applied (duplicate callback).
    AlreadyProcessed,
    /// The hold ran out before the payment could be applied.
    Expired,
}

impl PaymentResult {
    /// Answer for a callback that finds the reservation already resolved.
    pub fn for_resolved(status: ReservationStatus) -> Self {
        match status {
            ReservationStatus::Expired => PaymentResult::Expired,
            _ => PaymentResult::AlreadyProcessed,
        }
    }
}

impl fmt::Display for PaymentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentResult::Confirmed => "CONFIRMED",
            PaymentResult::Released => "RELEASED",
            PaymentResult::AlreadyProcessed => "ALREADY_PROCESSED",
            PaymentResult::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}
