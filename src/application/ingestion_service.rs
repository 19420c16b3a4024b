// Ingestion gateway - validates, deduplicates, and routes inbound pings
use crate::application::assignment_service::AssignmentService;
use crate::application::fleet_state::{ApplyOutcome, FleetStateStore};
use crate::application::persistence::PersistenceGateway;
use crate::domain::error::FleetError;
use crate::domain::ping::Ping;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Applied,
    /// Non-fatal: re-delivery and out-of-order arrivals are dropped silently.
    StaleOrDuplicate,
}

pub struct IngestionService {
    assignments: Arc<AssignmentService>,
    store: Arc<FleetStateStore>,
    persistence: PersistenceGateway,
}

impl IngestionService {
    pub fn new(
        assignments: Arc<AssignmentService>,
        store: Arc<FleetStateStore>,
        persistence: PersistenceGateway,
    ) -> Self {
        Self {
            assignments,
            store,
            persistence,
        }
    }

    /// Accept one ping from a field device. Pings from unbound devices are
    /// never attributed to a vehicle. The in-memory aggregate commits under
    /// its serialized applier; the committed snapshot is then persisted with
    /// bounded retry.
    pub async fn ingest(&self, ping: Ping) -> Result<IngestOutcome, FleetError> {
        ping.validate()?;

        let vehicle_id = self
            .assignments
            .resolve_device(&ping.device_id)
            .await
            .ok_or_else(|| FleetError::NoVehicleBound(ping.device_id.clone()))?;

        match self.store.apply_ping(&vehicle_id, &ping).await? {
            ApplyOutcome::StaleOrDuplicate => {
                tracing::debug!(
                    device = %ping.device_id,
                    vehicle = %vehicle_id,
                    timestamp = %ping.timestamp,
                    "dropped stale or duplicate ping"
                );
                Ok(IngestOutcome::StaleOrDuplicate)
            }
            ApplyOutcome::Applied {
                snapshot,
                closed_trip,
            } => {
                self.persistence.save_vehicle(&snapshot).await?;
                if let Some(trip) = &closed_trip {
                    self.persistence.append_trip(trip).await?;
                }
                Ok(IngestOutcome::Applied)
            }
        }
    }
}
