use std::sync::Arc;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::domain::{JobRequestDto, JobResult};
use crate::error::EngineError;
use crate::facility_api::FacilityApi;
use crate::loader::load_dto;
use crate::rule::RuleRegistry;

/// Load-then-dispatch, with the response policy applied.
///
/// Load errors are fatal unless `accept_partial` is set. An empty dispatch is
/// reported as `EngineError::NoRuleMatched`. A non-empty result list is
/// returned as-is, even when individual entries carry errors.
pub struct JobEngine {
    api: Arc<dyn FacilityApi>,
    dispatcher: Dispatcher,
    accept_partial: bool,
}

impl JobEngine {
    pub fn new(api: Arc<dyn FacilityApi>, registry: RuleRegistry) -> Self {
        Self {
            api,
            dispatcher: Dispatcher::new(registry),
            accept_partial: false,
        }
    }

    /// Engine wired with the standard rules over `api`.
    pub fn standard(api: Arc<dyn FacilityApi>) -> Self {
        let registry = RuleRegistry::standard(api.clone());
        Self::new(api, registry)
    }

    #[must_use]
    pub fn accept_partial(mut self, accept: bool) -> Self {
        self.accept_partial = accept;
        self
    }

    /// # Errors
    ///
    /// Returns `InvalidRequest` for a malformed DTO, `Load` when references
    /// failed to resolve (and partial data is not accepted), or
    /// `NoRuleMatched` when no rule applies.
    pub async fn handle(&self, dto: &JobRequestDto) -> Result<Vec<JobResult>, EngineError> {
        validate(dto)?;

        let loaded = load_dto(self.api.clone(), dto).await;
        if !loaded.is_complete() {
            if !self.accept_partial {
                return Err(EngineError::Load(loaded.errors));
            }
            warn!(errors = loaded.errors.len(), "dispatching partially loaded request");
        }

        let results = self.dispatcher.dispatch(&loaded.request).await;
        if results.is_empty() {
            return Err(EngineError::NoRuleMatched);
        }
        info!(
            results = results.len(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            "job request handled"
        );
        Ok(results)
    }
}

fn validate(dto: &JobRequestDto) -> Result<(), EngineError> {
    if dto.department_id <= 0 {
        return Err(EngineError::InvalidRequest("departmentId is required".to_string()));
    }
    if dto.job_item_id <= 0 {
        return Err(EngineError::InvalidRequest("jobItemId is required".to_string()));
    }
    if dto.locations_id.is_empty() {
        return Err(EngineError::InvalidRequest("locationsId is required".to_string()));
    }
    Ok(())
}
