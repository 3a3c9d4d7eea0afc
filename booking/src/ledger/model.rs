use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::slot::model::SlotId;

/// Allocated before the hold is attempted, so it cannot be a database row id.
/// On the wire it is the hyphenated UUID string, not a number.
pub type ReservationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Failed,
    Expired,
}

impl ReservationStatus {
    /// PENDING is the only non-terminal state, and every edge leaves it.
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        self == ReservationStatus::Pending && next.is_terminal()
    }

    pub fn is_terminal(self) -> bool {
        self != ReservationStatus::Pending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Failed => "FAILED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReservationStatus::Pending),
            "CONFIRMED" => Ok(ReservationStatus::Confirmed),
            "FAILED" => Ok(ReservationStatus::Failed),
            "EXPIRED" => Ok(ReservationStatus::Expired),
            other => Err(anyhow::anyhow!("Invalid ReservationStatus value: {}", other)),
        }
    }
}

/// One reservation attempt that won its hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: ReservationId,
    pub time_slot_id: SlotId,
    pub user_email: String,
    pub status: ReservationStatus,
    pub created_at_ms: u64,
    pub hold_expires_at_ms: u64,

    /// Slot version produced by the AVAILABLE -> HOLD swap. Every later slot
    /// transition for this reservation expects (HOLD, hold_version).
    pub hold_version: u64,

    pub resolved_at_ms: Option<u64>,
}

impl Reservation {
    pub fn new_pending(
        id: ReservationId,
        time_slot_id: SlotId,
        user_email: impl Into<String>,
        created_at_ms: u64,
        hold_expires_at_ms: u64,
        hold_version: u64,
    ) -> Self {
        Self {
            id,
            time_slot_id,
            user_email: user_email.into(),
            status: ReservationStatus::Pending,
            created_at_ms,
            hold_expires_at_ms,
            hold_version,
            resolved_at_ms: None,
        }
    }

    pub fn is_hold_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.hold_expires_at_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentDecision {
    Success,
    Fail,
}

impl PaymentDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentDecision::Success => "SUCCESS",
            PaymentDecision::Fail => "FAIL",
        }
    }
}

impl fmt::Display for PaymentDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentDecision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(PaymentDecision::Success),
            "FAIL" => Ok(PaymentDecision::Fail),
            other => Err(anyhow::anyhow!("Invalid PaymentDecision value: {}", other)),
        }
    }
}

/// A payment callback as first received. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub reservation_id: ReservationId,
    pub decision: PaymentDecision,
    pub processed_at_ms: u64,
}
