use async_trait::async_trait;

use crate::domain::{Department, Job, JobItem, Location};
use crate::error::PortError;

/// The facility-management API as seen by the loader and the rules.
///
/// Implementations own transport concerns (auth, retries, pagination). Every
/// error they return flows through the engine untouched.
#[async_trait]
pub trait FacilityApi: Send + Sync {
    async fn get_department_by_id(&self, id: i64) -> Result<Department, PortError>;

    async fn get_job_item_by_id(&self, id: i64) -> Result<JobItem, PortError>;

    /// Resolve every id. Fails as a unit if any single id fails.
    async fn get_locations_by_ids(&self, ids: &[i64]) -> Result<Vec<Location>, PortError>;

    /// Children of a floor whose type is "Room".
    async fn get_floor_rooms(&self, floor_id: i64) -> Result<Vec<Location>, PortError>;

    /// All children of a floor.
    async fn get_floor_locations(&self, floor_id: i64) -> Result<Vec<Location>, PortError>;

    /// Submit a job. The returned payload is opaque to the engine.
    async fn create_job(&self, job: &Job) -> Result<serde_json::Value, PortError>;
}
