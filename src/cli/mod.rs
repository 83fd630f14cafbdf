use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Backend Args ---
    /// Deployment mode selecting the backend (local, dev, prod)
    #[arg(long, env = "NERVO_RUN_MODE", default_value = "local")]
    pub run_mode: String,

    /// Backend port for local and dev modes. Ignored in prod.
    #[arg(long, env = "NERVO_PORT")]
    pub port: Option<u16>,

    /// Agent variant the backend should answer with (probiot, w3a, leo, groot, nervoznyak)
    #[arg(long, env = "NERVO_AGENT", default_value = "probiot")]
    pub agent: String,

    /// Explicit backend base URL (e.g., http://127.0.0.1:3000). Overrides the host chosen by the run mode.
    #[arg(long, env = "NERVO_BASE_URL")]
    pub base_url: Option<String>,

    /// Timeout in seconds for a single backend request.
    #[arg(long, env = "NERVO_REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    // --- Identity Args ---
    /// Path of the file holding the anonymous user and conversation ids.
    #[arg(long, env = "NERVO_STORE_PATH", default_value = ".nervo/identity.json")]
    pub store_path: String,

    /// Start a fresh conversation instead of resuming the stored one.
    #[arg(long, env = "NERVO_NEW_CONVERSATION", default_value = "false")]
    pub new_conversation: bool,
}
