use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub type ResourceId = i64;

/// A bookable resource (room, court, device...). Read-only to the booking core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// Slots are created AVAILABLE at version 0.
#[derive(Debug, Clone)]
pub struct NewTimeSlot {
    pub resource_id: ResourceId,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl NewTimeSlot {
    pub fn validate(&self) -> Result<(), String> {
        if self.start_time >= self.end_time {
            return Err(format!(
                "slot start {} must be before end {}",
                self.start_time, self.end_time
            ));
        }
        Ok(())
    }
}
