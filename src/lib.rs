pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod engine;
pub mod engineering_rules;
pub mod error;
pub mod facility_api;
pub mod housekeeping_rules;
pub mod http_api;
pub mod loader;
pub mod memory_api;
pub mod room_service_rules;
pub mod rule;

pub use config::{AuthConfig, Backend, EngineConfig, HttpApiConfig};
pub use dispatcher::{dispatch, Dispatcher};
pub use domain::{
    Department, Job, JobAction, JobItem, JobRequest, JobRequestDto, JobResult, Location,
    LocationType, ParentLocation,
};
pub use engine::JobEngine;
pub use error::{EngineError, LoadError, LoadField, PortError, RuleError};
pub use facility_api::FacilityApi;
pub use http_api::HttpFacilityApi;
pub use loader::{load, load_dto, LoadedRequest};
pub use memory_api::{FacilityFixture, MemoryFacilityApi, Operation};
pub use rule::{Rule, RuleRegistry, Trade};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::{Department, JobItem, Location, LocationType, ParentLocation};

    pub fn department(id: i64, name: &str) -> Department {
        Department {
            id,
            name: name.to_string(),
        }
    }

    pub fn item(id: i64, display_name: &str) -> JobItem {
        JobItem {
            id,
            display_name: display_name.to_string(),
        }
    }

    pub fn location(id: i64, type_name: &str, parent: Option<i64>) -> Location {
        Location {
            id,
            name: id.to_string(),
            display_name: format!("{type_name} {id}"),
            parent_location: parent.map(|p| ParentLocation {
                id: p,
                name: p.to_string(),
                display_name: format!("Floor {p}"),
            }),
            location_type: Some(LocationType {
                id: 1,
                display_name: type_name.to_string(),
            }),
        }
    }
}
