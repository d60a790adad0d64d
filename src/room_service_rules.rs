use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Job, JobAction, JobRequest, JobResult, LOCATION_TYPE_FLOOR};
use crate::error::RuleError;
use crate::facility_api::FacilityApi;
use crate::rule::{execution_basis, trade_basis, Rule, Trade};

fn named_item(request: &JobRequest, trade: Trade) -> bool {
    trade_basis(request, trade).is_some_and(|(_, item)| !item.display_name.is_empty())
}

/// Deliver an item to the requested locations.
pub struct DeliverJobItemLocationTask {
    api: Arc<dyn FacilityApi>,
}

impl DeliverJobItemLocationTask {
    pub fn new(api: Arc<dyn FacilityApi>) -> Self {
        Self { api }
    }

    async fn run(&self, request: &JobRequest) -> Result<serde_json::Value, RuleError> {
        let (department, item) = execution_basis(self, request)?;
        let job = Job::new(JobAction::Deliver, department, item, &request.locations);
        Ok(self.api.create_job(&job).await?)
    }
}

#[async_trait]
impl Rule for DeliverJobItemLocationTask {
    fn name(&self) -> &'static str {
        "DeliverJobItemLocationTask"
    }

    fn trade(&self) -> Trade {
        Trade::RoomService
    }

    fn matches(&self, request: &JobRequest) -> bool {
        named_item(request, self.trade()) && !request.locations.is_empty()
    }

    async fn execute(&self, request: JobRequest) -> JobResult {
        let outcome = self.run(&request).await;
        JobResult::from_outcome(self.name(), request, outcome)
    }
}

/// Deliver an item to every room on a floor.
///
/// Matches when the only requested location is a floor.
pub struct DeliverJobItemRoomTask {
    api: Arc<dyn FacilityApi>,
}

impl DeliverJobItemRoomTask {
    pub fn new(api: Arc<dyn FacilityApi>) -> Self {
        Self { api }
    }

    async fn run(&self, request: &JobRequest) -> Result<serde_json::Value, RuleError> {
        let (department, item) = execution_basis(self, request)?;
        let floor = request
            .locations_of_type(LOCATION_TYPE_FLOOR)
            .next()
            .ok_or_else(|| RuleError::PreconditionViolated(self.name().to_string()))?;

        let rooms = self.api.get_floor_rooms(floor.id).await?;
        debug!(rule = self.name(), floor = floor.id, rooms = rooms.len(), "resolved floor rooms");
        if rooms.is_empty() {
            return Err(RuleError::NoLocations);
        }

        let job = Job::new(JobAction::Deliver, department, item, &rooms);
        Ok(self.api.create_job(&job).await?)
    }
}

#[async_trait]
impl Rule for DeliverJobItemRoomTask {
    fn name(&self) -> &'static str {
        "DeliverJobItemRoomTask"
    }

    fn trade(&self) -> Trade {
        Trade::RoomService
    }

    fn matches(&self, request: &JobRequest) -> bool {
        named_item(request, self.trade()) && request.is_single_floor()
    }

    async fn execute(&self, request: JobRequest) -> JobResult {
        let outcome = self.run(&request).await;
        JobResult::from_outcome(self.name(), request, outcome)
    }
}
