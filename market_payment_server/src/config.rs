use std::env;

use gateway_tools::GatewayConfig;
use log::*;
use mps_common::parse_boolean_flag;

const DEFAULT_MPS_HOST: &str = "127.0.0.1";
const DEFAULT_MPS_PORT: u16 = 8360;
const DEFAULT_WORKER_POLL_SECS: u64 = 5;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address,
    /// rather than the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather
    /// than the connection's remote address.
    pub use_forwarded: bool,
    /// Gateway keysets, selected by the dev/prod environment flag.
    pub gateway: GatewayConfig,
    /// Base URL of the push/in-app notification service.
    pub notify_base_url: String,
    /// Base URL of the transactional mailer service.
    pub mailer_base_url: String,
    /// How often the task queue worker polls for due jobs.
    pub worker_poll_interval: std::time::Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPS_HOST.to_string(),
            port: DEFAULT_MPS_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            gateway: GatewayConfig::default(),
            notify_base_url: "http://localhost:8370".to_string(),
            mailer_base_url: "http://localhost:8371".to_string(),
            worker_poll_interval: std::time::Duration::from_secs(DEFAULT_WORKER_POLL_SECS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPS_HOST").ok().unwrap_or_else(|| DEFAULT_MPS_HOST.into());
        let port = env::var("MPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPS_PORT. {e} Using the default, {DEFAULT_MPS_PORT}, instead."
                    );
                    DEFAULT_MPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MPS_PORT);
        let database_url = env::var("MPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MPS_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("MPS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("MPS_USE_FORWARDED").ok(), false);
        let gateway = GatewayConfig::new_from_env_or_default();
        let notify_base_url = env::var("MPS_NOTIFY_BASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ MPS_NOTIFY_BASE_URL is not set. Notifications will go to the local default.");
            "http://localhost:8370".to_string()
        });
        let mailer_base_url = env::var("MPS_MAILER_BASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ MPS_MAILER_BASE_URL is not set. Receipt emails will go to the local default.");
            "http://localhost:8371".to_string()
        });
        let worker_poll_interval = env::var("MPS_WORKER_POLL_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for MPS_WORKER_POLL_SECS. {e}"))
                    .ok()
            })
            .map(std::time::Duration::from_secs)
            .unwrap_or_else(|| std::time::Duration::from_secs(DEFAULT_WORKER_POLL_SECS));
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            gateway,
            notify_base_url,
            mailer_base_url,
            worker_poll_interval,
        }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The subset of the server configuration that handlers need at request time. Kept small and
/// secret-free so it can be shared as app data.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane_without_any_environment() {
        let config = ServerConfig::new("0.0.0.0", 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert!(!config.use_x_forwarded_for);
        assert_eq!(config.worker_poll_interval, std::time::Duration::from_secs(5));
    }
}
