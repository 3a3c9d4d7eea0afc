use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::model::ResourceId;
use crate::ledger::model::{PaymentDecision, ReservationId};
use crate::slot::model::SlotId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotQuery {
    pub resource_id: ResourceId,
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub time_slot_id: SlotId,
    pub user_email: String,
}

/// `reservationId` is the UUID string returned by `POST /reservations`;
/// numeric ids are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessRequest {
    pub reservation_id: ReservationId,
    pub decision: PaymentDecision,
}
