// Driver registry record
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Active,
    Inactive,
}

/// A fleet driver. The assigned-vehicle side of the binding is owned by the
/// assignment service, which keeps it mirrored with the vehicle aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub status: DriverStatus,
    pub vehicle_id: Option<String>,
}

impl Driver {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            status: DriverStatus::Active,
            vehicle_id: None,
        }
    }
}
