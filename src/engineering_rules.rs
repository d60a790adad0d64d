use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Job, JobAction, JobRequest, JobResult, LOCATION_TYPE_FLOOR};
use crate::error::RuleError;
use crate::facility_api::FacilityApi;
use crate::rule::{execution_basis, trade_basis, Rule, Trade};

/// Repair an item in every location on a floor.
///
/// Matches Engineering requests with an item and exactly one location, typed
/// "Floor". Resolves all children of the floor and submits one repair job
/// against them.
pub struct RepairJobItemFloor {
    api: Arc<dyn FacilityApi>,
}

impl RepairJobItemFloor {
    pub fn new(api: Arc<dyn FacilityApi>) -> Self {
        Self { api }
    }

    async fn run(&self, request: &JobRequest) -> Result<serde_json::Value, RuleError> {
        let (department, item) = execution_basis(self, request)?;
        let floor = request
            .locations_of_type(LOCATION_TYPE_FLOOR)
            .next()
            .ok_or_else(|| RuleError::PreconditionViolated(self.name().to_string()))?;

        let children = self.api.get_floor_locations(floor.id).await?;
        debug!(rule = self.name(), floor = floor.id, children = children.len(), "resolved floor");
        if children.is_empty() {
            return Err(RuleError::NoLocations);
        }

        let job = Job::new(JobAction::Repair, department, item, &children);
        Ok(self.api.create_job(&job).await?)
    }
}

#[async_trait]
impl Rule for RepairJobItemFloor {
    fn name(&self) -> &'static str {
        "RepairJobItemFloor"
    }

    fn trade(&self) -> Trade {
        Trade::Engineering
    }

    fn matches(&self, request: &JobRequest) -> bool {
        trade_basis(request, self.trade()).is_some() && request.is_single_floor()
    }

    async fn execute(&self, request: JobRequest) -> JobResult {
        let outcome = self.run(&request).await;
        JobResult::from_outcome(self.name(), request, outcome)
    }
}

/// Repair an item at the requested locations.
pub struct RepairJobItemLocation {
    api: Arc<dyn FacilityApi>,
}

impl RepairJobItemLocation {
    pub fn new(api: Arc<dyn FacilityApi>) -> Self {
        Self { api }
    }

    async fn run(&self, request: &JobRequest) -> Result<serde_json::Value, RuleError> {
        let (department, item) = execution_basis(self, request)?;
        let job = Job::new(JobAction::Repair, department, item, &request.locations);
        Ok(self.api.create_job(&job).await?)
    }
}

#[async_trait]
impl Rule for RepairJobItemLocation {
    fn name(&self) -> &'static str {
        "RepairJobItemLocation"
    }

    fn trade(&self) -> Trade {
        Trade::Engineering
    }

    fn matches(&self, request: &JobRequest) -> bool {
        trade_basis(request, self.trade())
            .is_some_and(|(_, item)| !item.display_name.is_empty())
            && !request.locations.is_empty()
    }

    async fn execute(&self, request: JobRequest) -> JobResult {
        let outcome = self.run(&request).await;
        JobResult::from_outcome(self.name(), request, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortError;
    use crate::memory_api::{MemoryFacilityApi, Operation};
    use crate::test_support::{department, item, location};

    fn engineering(item_name: &str, locations: Vec<crate::domain::Location>) -> JobRequest {
        JobRequest {
            department: Some(department(4, "Engineering")),
            job_item: Some(item(9, item_name)),
            locations,
        }
    }

    fn floor_api() -> Arc<MemoryFacilityApi> {
        let api = MemoryFacilityApi::new();
        api.add_location(location(10, "Floor", None));
        api.add_location(location(11, "Room", Some(10)));
        api.add_location(location(12, "Public Area", Some(10)));
        api.add_location(location(21, "Room", Some(20)));
        Arc::new(api)
    }

    #[test]
    fn floor_rule_requires_single_floor() {
        let rule = RepairJobItemFloor::new(floor_api());
        assert!(rule.matches(&engineering("Air Conditioning", vec![location(10, "Floor", None)])));
        assert!(!rule.matches(&engineering("Air Conditioning", vec![location(3, "Bathroom", None)])));
        assert!(!rule.matches(&engineering(
            "Air Conditioning",
            vec![location(10, "Floor", None), location(3, "Bathroom", None)]
        )));
    }

    #[test]
    fn floor_rule_rejects_other_departments() {
        let rule = RepairJobItemFloor::new(floor_api());
        let mut req = engineering("Air Conditioning", vec![location(10, "Floor", None)]);
        req.department = Some(department(1, "Housekeeping"));
        assert!(!rule.matches(&req));
    }

    #[test]
    fn floor_rule_ignores_untyped_location() {
        let rule = RepairJobItemFloor::new(floor_api());
        let mut floor = location(10, "Floor", None);
        floor.location_type = None;
        assert!(!rule.matches(&engineering("TV", vec![floor])));
    }

    #[tokio::test]
    async fn floor_rule_repairs_every_child_of_the_floor() {
        let api = floor_api();
        let rule = RepairJobItemFloor::new(api.clone());
        let req = engineering("Air Conditioning", vec![location(10, "Floor", None)]);

        let jr = rule.execute(req.clone()).await;
        assert!(jr.is_success(), "got: {:?}", jr.error);
        assert_eq!(jr.request, req);

        let jobs = api.created_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].action, JobAction::Repair);
        assert_eq!(jobs[0].department.id, 4);
        assert_eq!(jobs[0].item.name, "Air Conditioning");
        let ids: Vec<i64> = jobs[0].locations.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![11, 12]);
    }

    #[tokio::test]
    async fn floor_rule_reports_lookup_failure() {
        let api = floor_api();
        api.fail(Operation::GetFloorLocations, PortError::Transport("timed out".to_string()));
        let rule = RepairJobItemFloor::new(api.clone());

        let jr = rule
            .execute(engineering("TV", vec![location(10, "Floor", None)]))
            .await;
        assert_eq!(
            jr.error,
            Some(RuleError::Port(PortError::Transport("timed out".to_string())))
        );
        assert!(api.created_jobs().is_empty());
    }

    #[tokio::test]
    async fn floor_rule_without_children_fails_with_no_locations() {
        let api = floor_api();
        let rule = RepairJobItemFloor::new(api.clone());
        let jr = rule
            .execute(engineering("TV", vec![location(30, "Floor", None)]))
            .await;
        assert_eq!(jr.error, Some(RuleError::NoLocations));
        assert!(api.created_jobs().is_empty());
    }

    #[test]
    fn location_rule_requires_item_name_and_locations() {
        let rule = RepairJobItemLocation::new(floor_api());
        assert!(rule.matches(&engineering(
            "TV",
            vec![location(1, "Room", None), location(2, "Room", None)]
        )));
        assert!(!rule.matches(&engineering("", vec![location(1, "Room", None)])));
        assert!(!rule.matches(&engineering("TV", vec![])));
    }

    #[tokio::test]
    async fn location_rule_repairs_given_locations() {
        let api = floor_api();
        let rule = RepairJobItemLocation::new(api.clone());
        let jr = rule
            .execute(engineering(
                "TV",
                vec![location(1, "Room", None), location(2, "Public Area", None)],
            ))
            .await;
        assert!(jr.is_success());
        assert_eq!(jr.rule, "RepairJobItemLocation");

        let jobs = api.created_jobs();
        let ids: Vec<i64> = jobs[0].locations.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn location_rule_reports_submit_failure() {
        let api = floor_api();
        api.fail(
            Operation::CreateJob,
            PortError::Api {
                status: 422,
                message: "Unprocessable: bad job".to_string(),
            },
        );
        let rule = RepairJobItemLocation::new(api);
        let jr = rule
            .execute(engineering("TV", vec![location(1, "Room", None)]))
            .await;
        assert!(jr.result.is_none());
        assert_eq!(jr.error.unwrap().to_string(), "Unprocessable: bad job");
    }
}
