use config::{Config, ConfigError, Environment, File};
use ledger_core::{FeeMode, IngestOptions};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// "absolute" or "percentage"
    pub fee_mode: String,
    pub fee_percent: f64,
    /// "account" or "position"; detected from the columns when unset
    #[serde(default)]
    pub shape: Option<String>,
    pub apply_leverage: bool,
    pub histogram_bins: usize,
}

impl AnalysisConfig {
    pub fn ingest_options(&self) -> anyhow::Result<IngestOptions> {
        let fee_mode = FeeMode::parse(&self.fee_mode, self.fee_percent)
            .ok_or_else(|| anyhow::anyhow!("Unknown fee mode: {}", self.fee_mode))?;

        let shape = match &self.shape {
            Some(s) => Some(
                ledger_core::LedgerShape::from_str(s)
                    .ok_or_else(|| anyhow::anyhow!("Unknown ledger shape: {}", s))?,
            ),
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
            .set_default("analysis.fee_mode", "absolute")?
            .set_default("analysis.fee_percent", 0.0)?
            .set_default("analysis.apply_leverage", false)?
            .set_default("analysis.histogram_bins", 20)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // LEDGER__ANALYSIS__FEE_MODE, etc.
            .add_source(
                Environment::with_prefix("LEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
