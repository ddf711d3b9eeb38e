use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Perch chat server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "perch-server", version, about = "Perch real-time chat server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PERCH_PORT", default_value = "4000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "PERCH_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./perch.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PERCH_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, JWT signing key)
    #[arg(long, env = "PERCH_DATA_DIR", default_value = "./data")]
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            bind_address: "0.0.0.0".to_string(),
            config: "./perch.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PERCH_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("PERCH_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Perch Chat Server Configuration
# Place this file at ./perch.toml or specify with --config <path>
# All settings can be overridden via environment variables (PERCH_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 4000)
# port = 4000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"
"#
    .to_string()
}
