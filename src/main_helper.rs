use crate::constants::{DEFAULT_BASE_URL, TOKEN_KEY};
use crate::session::SessionStore;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Base URL of the RAG backend.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
    /// Where the signed-in session is persisted between runs.
    #[arg(long, default_value = ".ragline_session.json")]
    pub session_file: String,
    #[arg(long, default_value = ".")]
    pub log_dir: String,
    /// Timeout for blocking requests; the streaming read is not bounded.
    #[arg(long, default_value_t = 120)]
    pub request_timeout_secs: u64,
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,
    /// Disable hybrid retrieval and query the vector index alone.
    #[arg(long, default_value_t = false)]
    pub vector_only: bool,
}

/// Everything one session of the client needs; passed explicitly instead
/// of living in a process-wide singleton.
#[derive(Clone)]
pub struct AppContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub store: Arc<dyn SessionStore>,
    pub args: Arc<Args>,
}

impl AppContext {
    pub fn new(client: reqwest::Client, args: Arc<Args>, store: Arc<dyn SessionStore>) -> Self {
        let base_url = args.base_url.trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            store,
            args,
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.args.request_timeout_secs)
    }

    pub fn hybrid_enabled(&self) -> bool {
        !self.args.vector_only
    }
}
