pub mod analyze;
pub mod nodes;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use mscan_core::config::AppConfig;
use mscan_infrastructure::ConfigService;
use mscan_interaction::HttpResultClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings and the HTTP client shared by every command.
pub struct Context {
    pub config: AppConfig,
    pub client: HttpResultClient,
}

impl Context {
    pub fn load(config_path: Option<&Path>, server: Option<String>) -> Result<Self> {
        let config = ConfigService::load(config_path)?;
        let base_url = server.unwrap_or_else(|| server_url(&config));
        let client = HttpResultClient::new(base_url).with_timeout(REQUEST_TIMEOUT)?;
        Ok(Self { config, client })
    }
}

/// Root URL of the configured server.
pub fn server_url(config: &AppConfig) -> String {
    let host = match config.server.host.as_str() {
        "0.0.0.0" | "" => "127.0.0.1",
        host => host,
    };
    format!("http://{}:{}", host, config.server.port)
}
