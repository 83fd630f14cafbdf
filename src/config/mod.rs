pub mod agent;
pub mod run_mode;

pub use agent::{ resolve_agent_variant, AgentType };
pub use run_mode::{ resolve_endpoint, EndpointDescriptor, RunMode };

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cli::Args;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown run mode: '{0}' (expected local, dev or prod)")]
    UnknownRunMode(String),

    #[error("Unknown agent type: '{0}'")]
    UnknownAgent(String),

    #[error("Invalid endpoint URL '{0}': {1}")]
    InvalidEndpoint(String, #[source] url::ParseError),

    #[error("Failed to set up backend client: {0}")]
    Client(String),
}

/// Raw deployment settings, read once at startup.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub run_mode: String,
    pub port: Option<u16>,
    pub agent: String,
    pub base_url: Option<String>,
    pub store_path: PathBuf,
    pub request_timeout: Duration,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            run_mode: "local".to_string(),
            port: None,
            agent: agent::PROBIOT.to_string(),
            base_url: None,
            store_path: PathBuf::from(".nervo/identity.json"),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Args> for DeploymentConfig {
    fn from(args: &Args) -> Self {
        Self {
            run_mode: args.run_mode.clone(),
            port: args.port,
            agent: args.agent.clone(),
            base_url: args.base_url.clone().filter(|url| !url.trim().is_empty()),
            store_path: PathBuf::from(&args.store_path),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
        }
    }
}

/// Source of the backend endpoint and agent variant for a session.
pub trait EnvironmentResolver: Send + Sync {
    fn endpoint(&self) -> Result<EndpointDescriptor, ConfigError>;
    fn agent(&self) -> Result<AgentType, ConfigError>;
}

#[derive(Debug, Clone)]
pub struct StaticEnvironment {
    config: DeploymentConfig,
}

impl StaticEnvironment {
    pub fn new(config: DeploymentConfig) -> Self {
        Self { config }
    }
}

impl EnvironmentResolver for StaticEnvironment {
    fn endpoint(&self) -> Result<EndpointDescriptor, ConfigError> {
        match &self.config.base_url {
            Some(raw) => {
                let run_mode: RunMode = self.config.run_mode.parse()?;
                EndpointDescriptor::custom(run_mode, raw)
            }
            None => resolve_endpoint(&self.config.run_mode, self.config.port),
        }
    }

    fn agent(&self) -> Result<AgentType, ConfigError> {
        resolve_agent_variant(&self.config.agent)
    }
}
