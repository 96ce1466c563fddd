use rust_decimal::Decimal;
use serde::Deserialize;

fn default_environment() -> String {
    "development".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_profit_floor() -> Decimal {
    Decimal::from(-1000)
}

fn default_scenario_attempt_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Postgres connection string; the in-memory ledger is used when
    /// unset.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Minimum permitted net position after any committed order.
    #[serde(default = "default_profit_floor")]
    pub profit_floor: Decimal,

    /// Processing-window jitter bounds in milliseconds. 0/0 disables the
    /// artificial delay; setting them widens the window concurrency
    /// races have to land in (load-testing device, not a production
    /// requirement).
    #[serde(default)]
    pub admission_delay_min_ms: u64,

    #[serde(default)]
    pub admission_delay_max_ms: u64,

    #[serde(default = "default_scenario_attempt_timeout_secs")]
    pub scenario_attempt_timeout_secs: u64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_everything_but_the_database() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, "development");
        assert!(config.database_url.is_none());
        assert_eq!(config.profit_floor, Decimal::from(-1000));
        assert_eq!(config.admission_delay_min_ms, 0);
        assert_eq!(config.admission_delay_max_ms, 0);
        assert_eq!(config.scenario_attempt_timeout_secs, 60);
    }
}
