use serde::{Serialize, Serializer};
use std::io;

/// Failure reported by a facility API implementation. The engine treats it as
/// opaque and passes it through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("decode: {0}")]
    Decode(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("config: {0}")]
    Config(String),
}

impl PortError {
    pub fn kind(&self) -> &'static str {
        match self {
            PortError::Transport(_) => "transport",
            PortError::NotFound(_) => "not_found",
            PortError::Api { .. } => "api",
            PortError::Decode(_) => "decode",
            PortError::Auth(_) => "auth",
            PortError::Config(_) => "config",
        }
    }
}

/// Failure of a single rule's action, captured inside its `JobResult`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("no locations found for this job")]
    NoLocations,

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("rule {0} executed without a satisfied precondition")]
    PreconditionViolated(String),

    #[error("rule {rule} aborted: {reason}")]
    Aborted { rule: String, reason: String },
}

impl RuleError {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleError::NoLocations => "no_locations",
            RuleError::Port(e) => e.kind(),
            RuleError::PreconditionViolated(_) => "precondition_violated",
            RuleError::Aborted { .. } => "aborted",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    kind: &'a str,
    message: String,
}

pub(crate) fn serialize_rule_error<S: Serializer>(
    error: &Option<RuleError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    error
        .as_ref()
        .map(|e| ErrorBody {
            kind: e.kind(),
            message: e.to_string(),
        })
        .serialize(serializer)
}

/// Which reference a loader unit was resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LoadField {
    #[serde(rename = "department")]
    Department,
    #[serde(rename = "jobItem")]
    JobItem,
    #[serde(rename = "location")]
    Location,
}

impl LoadField {
    pub fn tag(&self) -> &'static str {
        match self {
            LoadField::Department => "department",
            LoadField::JobItem => "jobItem",
            LoadField::Location => "location",
        }
    }
}

impl std::fmt::Display for LoadField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A reference that failed to resolve, tagged by field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {source}")]
pub struct LoadError {
    pub field: LoadField,
    pub source: PortError,
}

impl Serialize for LoadError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a> {
            field: LoadField,
            kind: &'a str,
            message: String,
        }
        Tagged {
            field: self.field,
            kind: self.source.kind(),
            message: self.source.to_string(),
        }
        .serialize(serializer)
    }
}

/// Errors produced by the job engine and the command line.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to load job request: {}", join_load_errors(.0))]
    Load(Vec<LoadError>),

    #[error("no rules matched for this job")]
    NoRuleMatched,

    #[error("facility api: {0}")]
    Port(#[from] PortError),

    #[error("config: {0}")]
    Config(String),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Request-level failures a client could fix, as opposed to setup failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRequest(_) | EngineError::Load(_) | EngineError::NoRuleMatched
        )
    }
}

fn join_load_errors(errors: &[LoadError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
