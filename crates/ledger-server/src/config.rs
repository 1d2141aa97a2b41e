use config::{Config, ConfigError, Environment, File};
use ledger_core::{FeeMode, IngestOptions, LedgerShape};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted ledger upload in bytes
    pub max_upload_bytes: usize,
}

/// Defaults applied to every ledger unless a request overrides them
#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// "absolute" or "percentage"
    pub fee_mode: String,
    /// Fee percentage used when a row has no fee% cell
    pub fee_percent: f64,
    /// "account" or "position"; detected from the columns when unset
    #[serde(default)]
    pub shape: Option<String>,
    pub apply_leverage: bool,
    pub histogram_bins: usize,
    /// Largest `bins` a request may ask for
    pub max_histogram_bins: usize,
}

impl AnalysisConfig {
    pub fn ingest_options(&self) -> Result<IngestOptions, String> {
        let fee_mode = FeeMode::parse(&self.fee_mode, self.fee_percent)
            .ok_or_else(|| format!("Unknown fee mode: {}", self.fee_mode))?;

        let shape = match &self.shape {
            Some(s) => Some(LedgerShape::from_str(s).ok_or_else(|| format!("Unknown ledger shape: {}", s))?),
            None => None,
        };

        Ok(IngestOptions {
            shape,
            fee_mode,
            apply_leverage: self.apply_leverage,
        })
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("analysis.fee_mode", "absolute")?
            .set_default("analysis.fee_percent", 0.0)?
            .set_default("analysis.apply_leverage", false)?
            .set_default("analysis.histogram_bins", 20)?
            .set_default("analysis.max_histogram_bins", 1000)?
            // Load from config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (LEDGER__SERVER__PORT, etc.)
            // Using double underscore as separator to handle nested keys with underscores
            .add_source(
                Environment::with_prefix("LEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
