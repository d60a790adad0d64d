use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use crate::domain::{Department, Job, JobItem, Location, LOCATION_TYPE_ROOM};
use crate::error::{EngineError, PortError};
use crate::facility_api::FacilityApi;

/// Port operations, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetDepartmentById,
    GetJobItemById,
    GetLocationsByIds,
    GetFloorRooms,
    GetFloorLocations,
    CreateJob,
}

/// Facility reference data as stored in a YAML fixture.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacilityFixture {
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub job_items: Vec<JobItem>,
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Default)]
struct Catalog {
    departments: HashMap<i64, Department>,
    job_items: HashMap<i64, JobItem>,
    // Ordered so floor children come back in id order.
    locations: BTreeMap<i64, Location>,
}

/// In-memory facility API for offline runs and tests.
///
/// Serves reference data by id, derives floor children from each location's
/// parent, and records every submitted job.
#[derive(Default)]
pub struct MemoryFacilityApi {
    catalog: Mutex<Catalog>,
    failures: Mutex<HashMap<Operation, PortError>>,
    created: Mutex<Vec<Job>>,
}

impl MemoryFacilityApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_fixture(fixture: FacilityFixture) -> Self {
        let api = Self::new();
        for d in fixture.departments {
            api.add_department(d);
        }
        for i in fixture.job_items {
            api.add_job_item(i);
        }
        for l in fixture.locations {
            api.add_location(l);
        }
        api
    }

    /// Load a YAML fixture from disk.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Io` if the file cannot be read, or
    /// `EngineError::Yaml` if it does not parse.
    pub fn from_yaml_file(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read(path)?;
        let fixture: FacilityFixture = serde_yaml::from_slice(&raw)?;
        Ok(Self::from_fixture(fixture))
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn add_department(&self, department: Department) {
        self.catalog
            .lock()
            .unwrap()
            .departments
            .insert(department.id, department);
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn add_job_item(&self, item: JobItem) {
        self.catalog.lock().unwrap().job_items.insert(item.id, item);
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn add_location(&self, location: Location) {
        self.catalog
            .lock()
            .unwrap()
            .locations
            .insert(location.id, location);
    }

    /// Make every later call to `op` fail with `error`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail(&self, op: Operation, error: PortError) {
        self.failures.lock().unwrap().insert(op, error);
    }

    /// Jobs submitted so far, in submission order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn created_jobs(&self) -> Vec<Job> {
        self.created.lock().unwrap().clone()
    }

    fn check(&self, op: Operation) -> Result<(), PortError> {
        match self.failures.lock().unwrap().get(&op) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn children_of(&self, floor_id: i64, only_rooms: bool) -> Vec<Location> {
        self.catalog
            .lock()
            .unwrap()
            .locations
            .values()
            .filter(|l| l.is_child_of(floor_id))
            .filter(|l| !only_rooms || l.is_of_type(LOCATION_TYPE_ROOM))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl FacilityApi for MemoryFacilityApi {
    async fn get_department_by_id(&self, id: i64) -> Result<Department, PortError> {
        self.check(Operation::GetDepartmentById)?;
        self.catalog
            .lock()
            .unwrap()
            .departments
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("department {id}")))
    }

    async fn get_job_item_by_id(&self, id: i64) -> Result<JobItem, PortError> {
        self.check(Operation::GetJobItemById)?;
        self.catalog
            .lock()
            .unwrap()
            .job_items
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("job item {id}")))
    }

    async fn get_locations_by_ids(&self, ids: &[i64]) -> Result<Vec<Location>, PortError> {
        self.check(Operation::GetLocationsByIds)?;
        let catalog = self.catalog.lock().unwrap();
        ids.iter()
            .map(|id| {
                catalog
                    .locations
                    .get(id)
                    .cloned()
                    .ok_or_else(|| PortError::NotFound(format!("location {id}")))
            })
            .collect()
    }

    async fn get_floor_rooms(&self, floor_id: i64) -> Result<Vec<Location>, PortError> {
        self.check(Operation::GetFloorRooms)?;
        Ok(self.children_of(floor_id, true))
    }

    async fn get_floor_locations(&self, floor_id: i64) -> Result<Vec<Location>, PortError> {
        self.check(Operation::GetFloorLocations)?;
        Ok(self.children_of(floor_id, false))
    }

    async fn create_job(&self, job: &Job) -> Result<serde_json::Value, PortError> {
        self.check(Operation::CreateJob)?;
        let mut created = self.created.lock().unwrap();
        created.push(job.clone());
        Ok(serde_json::json!({
            "id": created.len(),
            "action": job.action,
            "locations": job.locations.len(),
        }))
    }
}
