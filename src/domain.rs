use serde::{Deserialize, Serialize};

use crate::error::RuleError;

pub const LOCATION_TYPE_FLOOR: &str = "Floor";
pub const LOCATION_TYPE_ROOM: &str = "Room";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobItem {
    pub id: i64,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationType {
    pub id: i64,
    pub display_name: String,
}

/// Reduced snapshot of a location's parent. Kept separate from `Location`
/// so the value graph stays acyclic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentLocation {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_location: Option<ParentLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_type: Option<LocationType>,
}

impl Location {
    /// True when the location carries a type whose display name is `type_name`.
    /// An untyped location never matches.
    pub fn is_of_type(&self, type_name: &str) -> bool {
        self.location_type
            .as_ref()
            .is_some_and(|t| t.display_name == type_name)
    }

    pub fn is_child_of(&self, parent_id: i64) -> bool {
        self.parent_location
            .as_ref()
            .is_some_and(|p| p.id == parent_id)
    }
}

/// A job request as seen by the rules. May be partially populated when the
/// loader failed to resolve some of its references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_item: Option<JobItem>,
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl JobRequest {
    /// Department name, if a department was resolved.
    pub fn department_name(&self) -> Option<&str> {
        self.department.as_ref().map(|d| d.name.as_str())
    }

    /// Job item display name, if an item was resolved.
    pub fn item_name(&self) -> Option<&str> {
        self.job_item.as_ref().map(|i| i.display_name.as_str())
    }

    pub fn locations_of_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a Location> + 'a {
        self.locations.iter().filter(move |l| l.is_of_type(type_name))
    }

    /// The request holds exactly one location and it is a floor.
    pub fn is_single_floor(&self) -> bool {
        matches!(self.locations.as_slice(), [only] if only.is_of_type(LOCATION_TYPE_FLOOR))
    }
}

/// Inbound request shape: raw reference ids, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequestDto {
    pub department_id: i64,
    pub job_item_id: i64,
    pub locations_id: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobAction {
    Repair,
    Clean,
    Deliver,
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobAction::Repair => "repair",
            JobAction::Clean => "clean",
            JobAction::Deliver => "deliver",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDepartment {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobItemRef {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLocation {
    pub id: i64,
}

/// Normalized payload submitted to the facility API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub action: JobAction,
    pub department: JobDepartment,
    pub item: JobItemRef,
    pub locations: Vec<JobLocation>,
}

impl Job {
    pub fn new<'a>(
        action: JobAction,
        department: &Department,
        item: &JobItem,
        locations: impl IntoIterator<Item = &'a Location>,
    ) -> Self {
        Self {
            action,
            department: JobDepartment { id: department.id },
            item: JobItemRef {
                name: item.display_name.clone(),
            },
            locations: locations
                .into_iter()
                .map(|l| JobLocation { id: l.id })
                .collect(),
        }
    }
}

/// Outcome of one rule execution. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub rule: String,
    pub request: JobRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(
        serialize_with = "crate::error::serialize_rule_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<RuleError>,
}

impl JobResult {
    pub fn from_outcome(
        rule: &str,
        request: JobRequest,
        outcome: Result<serde_json::Value, RuleError>,
    ) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            rule: rule.to_string(),
            request,
            result,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
