use clap::Parser;
use job_rule_engine::{
    AuthConfig, Backend, EngineConfig, EngineError, FacilityApi, HttpApiConfig, HttpFacilityApi,
    JobEngine, JobRequestDto, MemoryFacilityApi,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "job-rule-engine", about = "Route a facility job request through the job rules")]
struct Cli {
    /// Department id
    #[arg(long)]
    department: i64,

    /// Job item id
    #[arg(long)]
    item: i64,

    /// Location id (repeatable)
    #[arg(long = "location", required = true)]
    locations: Vec<i64>,

    /// YAML fixture for the in-memory facility; uses the HTTP API when absent
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Facility API base URL
    #[arg(long, env = "FACILITY_BASE_URL", default_value = "")]
    base_url: String,

    #[arg(long, env = "FACILITY_API_VERSION", default_value = "v1")]
    api_version: String,

    #[arg(long, env = "FACILITY_RETRY_MAX", default_value_t = 3)]
    retry_max: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[arg(long, env = "FACILITY_AUTH_URL")]
    auth_url: Option<String>,

    #[arg(long, env = "FACILITY_CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, env = "FACILITY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Dispatch even when some references fail to load
    #[arg(long)]
    accept_partial: bool,
}

impl Cli {
    fn config(&self) -> Result<EngineConfig, EngineError> {
        let auth = match (&self.auth_url, &self.client_id, &self.client_secret) {
            (Some(auth_url), Some(client_id), Some(client_secret)) => Some(AuthConfig {
                auth_url: auth_url.clone(),
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            }),
            (None, None, None) => None,
            _ => {
                return Err(EngineError::Config(
                    "auth url, client id and client secret must be set together".to_string(),
                ))
            }
        };
        Ok(EngineConfig {
            backend: match &self.fixture {
                Some(path) => Backend::Memory {
                    fixture: path.clone(),
                },
                None => Backend::Http,
            },
            http: HttpApiConfig {
                base_url: self.base_url.clone(),
                api_version: self.api_version.clone(),
                retry_max: self.retry_max,
                request_timeout: Duration::from_secs(self.timeout_secs),
                auth,
                ..HttpApiConfig::default()
            },
            accept_partial: self.accept_partial,
        })
    }

    fn request(&self) -> JobRequestDto {
        JobRequestDto {
            department_id: self.department,
            job_item_id: self.item,
            locations_id: self.locations.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::from(0),
        Err(e) if e.is_client_error() => {
            error!(error = %e, "job request rejected");
            ExitCode::from(1)
        }
        Err(e) => {
            error!(error = %e, "engine error");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<(), EngineError> {
    let cli = Cli::parse();
    let config = cli.config()?;

    let api: Arc<dyn FacilityApi> = match &config.backend {
        Backend::Memory { fixture } => {
            info!(fixture = %fixture.display(), "using in-memory facility");
            Arc::new(MemoryFacilityApi::from_yaml_file(fixture)?)
        }
        Backend::Http => {
            info!(base_url = %config.http.base_url, "using facility api");
            Arc::new(HttpFacilityApi::new(&config.http)?)
        }
    };

    let engine = JobEngine::standard(api).accept_partial(config.accept_partial);
    let results = engine.handle(&cli.request()).await?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
