use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{
    Job, JobAction, JobItem, JobRequest, JobResult, LOCATION_TYPE_FLOOR, LOCATION_TYPE_ROOM,
};
use crate::error::RuleError;
use crate::facility_api::FacilityApi;
use crate::rule::{execution_basis, trade_basis, Rule, Trade};

static BED_LINEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)blanket|sheets|mattress").unwrap());

fn is_bed_linen(item: &JobItem) -> bool {
    BED_LINEN.is_match(&item.display_name)
}

/// Housekeeping request for bed linen, with a location of the given type.
fn bed_linen_at(request: &JobRequest, trade: Trade, location_type: &str) -> bool {
    trade_basis(request, trade).is_some_and(|(_, item)| is_bed_linen(item))
        && request.locations_of_type(location_type).next().is_some()
}

/// Clean the beds in every room on a floor.
pub struct CleanBedsFloor {
    api: Arc<dyn FacilityApi>,
}

impl CleanBedsFloor {
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

        let job = Job::new(JobAction::Clean, department, item, &rooms);
        Ok(self.api.create_job(&job).await?)
    }
}

#[async_trait]
impl Rule for CleanBedsFloor {
    fn name(&self) -> &'static str {
        "CleanBedsFloor"
    }

    fn trade(&self) -> Trade {
        Trade::Housekeeping
    }

    fn matches(&self, request: &JobRequest) -> bool {
        bed_linen_at(request, self.trade(), LOCATION_TYPE_FLOOR)
    }

    async fn execute(&self, request: JobRequest) -> JobResult {
        let outcome = self.run(&request).await;
        JobResult::from_outcome(self.name(), request, outcome)
    }
}

/// Clean the beds in the requested rooms. Non-room locations are skipped.
pub struct CleanBedsRoom {
    api: Arc<dyn FacilityApi>,
}

impl CleanBedsRoom {
    pub fn new(api: Arc<dyn FacilityApi>) -> Self {
        Self { api }
    }

    async fn run(&self, request: &JobRequest) -> Result<serde_json::Value, RuleError> {
        let (department, item) = execution_basis(self, request)?;
        let job = Job::new(
            JobAction::Clean,
            department,
            item,
            request.locations_of_type(LOCATION_TYPE_ROOM),
        );
        if job.locations.is_empty() {
            return Err(RuleError::NoLocations);
        }
        Ok(self.api.create_job(&job).await?)
    }
}

#[async_trait]
impl Rule for CleanBedsRoom {
    fn name(&self) -> &'static str {
        "CleanBedsRoom"
    }

    fn trade(&self) -> Trade {
        Trade::Housekeeping
    }

    fn matches(&self, request: &JobRequest) -> bool {
        bed_linen_at(request, self.trade(), LOCATION_TYPE_ROOM)
    }

    async fn execute(&self, request: JobRequest) -> JobResult {
        let outcome = self.run(&request).await;
        JobResult::from_outcome(self.name(), request, outcome)
    }
}
