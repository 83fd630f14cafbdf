pub mod cli;
pub mod config;
pub mod gateway;
pub mod identity;
pub mod models;
pub mod session;
pub mod terminal;

use cli::Args;
use config::DeploymentConfig;
use log::info;
use session::SessionController;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Chat Configuration ---");
    info!("Run Mode: {}", args.run_mode);
    info!("Port: {}", args.port.map(|p| p.to_string()).unwrap_or_else(|| "mode default".to_string()));
    info!("Base URL Override: {}", args.base_url.as_deref().unwrap_or("none"));
    info!("Agent: {}", args.agent);
    info!("Identity Store: {}", args.store_path);
    info!("Request Timeout: {}s", args.request_timeout_secs);
    info!("New Conversation: {}", args.new_conversation);
    info!("--------------------------");

    let config = DeploymentConfig::from(&args);
    let controller = Arc::new(SessionController::from_config(&config));
    terminal::run_terminal(controller, args.new_conversation).await?;

    Ok(())
}
