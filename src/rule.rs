use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{Department, JobItem, JobRequest, JobResult};
use crate::engineering_rules::{RepairJobItemFloor, RepairJobItemLocation};
use crate::error::RuleError;
use crate::facility_api::FacilityApi;
use crate::housekeeping_rules::{CleanBedsFloor, CleanBedsRoom};
use crate::room_service_rules::{DeliverJobItemLocationTask, DeliverJobItemRoomTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trade {
    Engineering,
    Housekeeping,
    RoomService,
}

impl Trade {
    /// Department name whose requests this trade serves.
    pub fn department(&self) -> &'static str {
        match self {
            Trade::Engineering => "Engineering",
            Trade::Housekeeping => "Housekeeping",
            Trade::RoomService => "Room Service",
        }
    }
}

/// A rule pairs a precondition over a `JobRequest` with an action.
///
/// `matches` is pure and must never touch the facility API. `execute` receives
/// its own copy of the request and reports every failure inside the returned
/// `JobResult`.
#[async_trait]
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    fn trade(&self) -> Trade;

    fn matches(&self, request: &JobRequest) -> bool;

    async fn execute(&self, request: JobRequest) -> JobResult;
}

/// Department and item of a request, provided the department belongs to
/// `trade`. Every precondition starts here, so a partially loaded request
/// never matches.
pub(crate) fn trade_basis<'a>(
    request: &'a JobRequest,
    trade: Trade,
) -> Option<(&'a Department, &'a JobItem)> {
    let department = request.department.as_ref()?;
    let item = request.job_item.as_ref()?;
    (department.name == trade.department()).then_some((department, item))
}

/// Same as `trade_basis`, for use inside `execute`, where a missing basis
/// means the dispatcher ran a rule whose precondition was false.
pub(crate) fn execution_basis<'a>(
    rule: &dyn Rule,
    request: &'a JobRequest,
) -> Result<(&'a Department, &'a JobItem), RuleError> {
    debug_assert!(
        rule.matches(request),
        "rule {} executed without a satisfied precondition",
        rule.name()
    );
    trade_basis(request, rule.trade())
        .ok_or_else(|| RuleError::PreconditionViolated(rule.name().to_string()))
}

/// Ordered, fixed set of rules handed to the dispatcher.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_rules(rules: Vec<Arc<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// The six canonical rules, all submitting through `api`.
    #[must_use]
    pub fn standard(api: Arc<dyn FacilityApi>) -> Self {
        Self::from_rules(vec![
            Arc::new(RepairJobItemFloor::new(api.clone())),
            Arc::new(RepairJobItemLocation::new(api.clone())),
            Arc::new(CleanBedsFloor::new(api.clone())),
            Arc::new(CleanBedsRoom::new(api.clone())),
            Arc::new(DeliverJobItemLocationTask::new(api.clone())),
            Arc::new(DeliverJobItemRoomTask::new(api)),
        ])
    }

    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Names of the rules whose precondition holds for `request`, in registry order.
    pub fn matching(&self, request: &JobRequest) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|r| r.matches(request))
            .map(|r| r.name())
            .collect()
    }
}
