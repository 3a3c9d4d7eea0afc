use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::catalog::model::ResourceId;

pub type SlotId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Available,
    Hold,
    Reserved,
}

impl SlotStatus {
    /// Edges of the time slot state machine. RESERVED is terminal.
    pub fn can_transition_to(self, next: SlotStatus) -> bool {
        matches!(
            (self, next),
            (SlotStatus::Available, SlotStatus::Hold)
                | (SlotStatus::Hold, SlotStatus::Reserved)
                | (SlotStatus::Hold, SlotStatus::Available)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SlotStatus::Available => "AVAILABLE",
            SlotStatus::Hold => "HOLD",
            SlotStatus::Reserved => "RESERVED",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SlotStatus::Available),
            "HOLD" => Ok(SlotStatus::Hold),
            "RESERVED" => Ok(SlotStatus::Reserved),
            other => Err(anyhow::anyhow!("Invalid SlotStatus value: {}", other)),
        }
    }
}

/// A bookable time slot. Only `status` and `version` ever change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: SlotId,
    pub resource_id: ResourceId,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
    /// Bumped by every successful transition.
    pub version: u64,
}
