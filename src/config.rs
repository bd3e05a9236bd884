use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Clinic notification hub
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "clinic-hub", version, about = "Clinic real-time notification hub")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "CLINICHUB_PORT", default_value = "8090")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "CLINICHUB_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./clinic-hub.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "CLINICHUB_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys)
    #[arg(long, env = "CLINICHUB_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Number of dispatch worker tasks draining the event queue
    #[arg(long, env = "CLINICHUB_DISPATCH_WORKERS", default_value = "4")]
    pub dispatch_workers: usize,

    /// Near-future window (minutes) within which a scheduled reminder is
    /// pushed immediately instead of waiting for the scheduler
    #[arg(long, env = "CLINICHUB_REMINDER_WINDOW_MINS", default_value = "5")]
    pub reminder_window_mins: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8090,
            bind_address: "0.0.0.0".to_string(),
            config: "./clinic-hub.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            dispatch_workers: 4,
            reminder_window_mins: 5,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (CLINICHUB_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("CLINICHUB_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Clinic Notification Hub Configuration
# Place this file at ./clinic-hub.toml or specify with --config <path>
# All settings can be overridden via environment variables (CLINICHUB_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8090)
# port = 8090

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# Number of dispatch worker tasks draining the event queue (default: 4)
# dispatch_workers = 4

# Reminders scheduled within this many minutes of creation are pushed
# immediately; anything further out is left to the external scheduler
# reminder_window_mins = 5
"#
    .to_string()
}
