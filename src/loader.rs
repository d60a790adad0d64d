use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{JobRequest, JobRequestDto};
use crate::error::{LoadError, LoadField, PortError};
use crate::facility_api::FacilityApi;

/// A job request enriched from raw ids, plus every reference that failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedRequest {
    pub request: JobRequest,
    pub errors: Vec<LoadError>,
}

impl LoadedRequest {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Resolve department, job item and locations concurrently.
///
/// Each reference resolves in its own task; a failure is recorded under its
/// field tag and leaves that field empty without affecting the other two.
pub async fn load(
    api: Arc<dyn FacilityApi>,
    department_id: i64,
    job_item_id: i64,
    location_ids: Vec<i64>,
) -> LoadedRequest {
    let department = {
        let api = api.clone();
        tokio::spawn(async move { api.get_department_by_id(department_id).await })
    };
    let job_item = {
        let api = api.clone();
        tokio::spawn(async move { api.get_job_item_by_id(job_item_id).await })
    };
    let locations = tokio::spawn(async move { api.get_locations_by_ids(&location_ids).await });

    let (department, job_item, locations) = tokio::join!(
        settle(LoadField::Department, department),
        settle(LoadField::JobItem, job_item),
        settle(LoadField::Location, locations),
    );

    let mut loaded = LoadedRequest::default();
    loaded.request.department = loaded.record(department);
    loaded.request.job_item = loaded.record(job_item);
    loaded.request.locations = loaded.record(locations).unwrap_or_default();
    loaded
}

/// Convenience wrapper taking the inbound request shape.
pub async fn load_dto(api: Arc<dyn FacilityApi>, dto: &JobRequestDto) -> LoadedRequest {
    load(api, dto.department_id, dto.job_item_id, dto.locations_id.clone()).await
}

impl LoadedRequest {
    fn record<T>(&mut self, outcome: Result<T, LoadError>) -> Option<T> {
        match outcome {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }
}

async fn settle<T>(
    field: LoadField,
    handle: JoinHandle<Result<T, PortError>>,
) -> Result<T, LoadError> {
    let outcome = match handle.await {
        Ok(r) => r,
        Err(e) => Err(PortError::Transport(format!("lookup task failed: {e}"))),
    };
    match outcome {
        Ok(v) => {
            debug!(field = %field, "resolved reference");
            Ok(v)
        }
        Err(source) => {
            warn!(field = %field, error = %source, "failed to resolve reference");
            Err(LoadError { field, source })
        }
    }
}
