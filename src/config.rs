use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub clearinghouse: ClearinghouseConfig,
    #[serde(default)]
    pub edi: EdiConfig,
    #[serde(default)]
    pub billing: BillingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClearinghouseConfig {
    #[serde(default = "default_clearinghouse_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Envelope identities written into every outbound 837.
#[derive(Debug, Deserialize, Clone)]
pub struct EdiConfig {
    #[serde(default = "default_submitter_id")]
    pub submitter_id: String,
    #[serde(default = "default_submitter_name")]
    pub submitter_name: String,
    #[serde(default = "default_receiver_id")]
    pub receiver_id: String,
    #[serde(default = "default_receiver_name")]
    pub receiver_name: String,
    #[serde(default = "default_contact_name")]
    pub contact_name: String,
    #[serde(default = "default_contact_phone")]
    pub contact_phone: String,
    /// `P` for production, `T` for test interchanges
    #[serde(default = "default_usage_indicator")]
    pub usage_indicator: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    #[serde(default = "default_appeal_window_days")]
    pub appeal_window_days: i64,
    #[serde(default)]
    pub denial_policy: DenialPolicy,
    #[serde(default)]
    pub allow_direct_resolution: bool,
    #[serde(default = "default_balance_tolerance_cents")]
    pub balance_tolerance_cents: i64,
}

/// What a second non-paying remittance does to a claim that was already denied.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DenialPolicy {
    /// Reuse the claim's open (pending) denial; only a new one once the
    /// previous was appealed or resolved.
    #[default]
    OnePerOpenDenial,
    /// Every denying remittance event records its own denial.
    OnePerRemittance,
}

fn default_database_path() -> String {
    "revcycle.db".to_string()
}

fn default_clearinghouse_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_submitter_id() -> String {
    "SUBMITTER01".to_string()
}

fn default_submitter_name() -> String {
    "CLINIC BILLING".to_string()
}

fn default_receiver_id() -> String {
    "CLEARINGHOUSE".to_string()
}

fn default_receiver_name() -> String {
    "CLEARINGHOUSE".to_string()
}

fn default_contact_name() -> String {
    "BILLING OFFICE".to_string()
}

fn default_contact_phone() -> String {
    "5555550100".to_string()
}

fn default_usage_indicator() -> String {
    "P".to_string()
}

fn default_appeal_window_days() -> i64 {
    90
}

fn default_balance_tolerance_cents() -> i64 {
    1
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path() }
    }
}

impl Default for ClearinghouseConfig {
    fn default() -> Self {
        Self {
            base_url: default_clearinghouse_url(),
            api_token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EdiConfig {
    fn default() -> Self {
        Self {
            submitter_id: default_submitter_id(),
            submitter_name: default_submitter_name(),
            receiver_id: default_receiver_id(),
            receiver_name: default_receiver_name(),
            contact_name: default_contact_name(),
            contact_phone: default_contact_phone(),
            usage_indicator: default_usage_indicator(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            appeal_window_days: default_appeal_window_days(),
            denial_policy: DenialPolicy::default(),
            allow_direct_resolution: false,
            balance_tolerance_cents: default_balance_tolerance_cents(),
        }
    }
}

impl Config {
    /// Load `path` (extension optional, file optional) overlaid with
    /// `REVCYCLE__SECTION__KEY` environment variables.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("REVCYCLE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.edi.usage_indicator.as_str(), "P" | "T") {
            anyhow::bail!(
                "edi.usage_indicator must be P or T, got {}",
                self.edi.usage_indicator
            );
        }
        if self.billing.appeal_window_days < 0 {
            anyhow::bail!("billing.appeal_window_days must not be negative");
        }
        if self.clearinghouse.base_url.trim().is_empty() {
            anyhow::bail!("clearinghouse.base_url must be set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load("does/not/exist").expect("defaults should load");
        assert_eq!(config.billing.denial_policy, DenialPolicy::OnePerOpenDenial);
        assert_eq!(config.edi.usage_indicator, "P");
        assert!(!config.billing.allow_direct_resolution);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[database]
path = "/tmp/billing.db"

[edi]
usage_indicator = "T"

[billing]
appeal_window_days = 60
denial_policy = "one_per_remittance"
allow_direct_resolution = true
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.path, "/tmp/billing.db");
        assert_eq!(config.edi.usage_indicator, "T");
        assert_eq!(config.billing.appeal_window_days, 60);
        assert_eq!(config.billing.denial_policy, DenialPolicy::OnePerRemittance);
        assert!(config.billing.allow_direct_resolution);
        // untouched sections keep their defaults
        assert_eq!(config.clearinghouse.timeout_secs, 30);
    }

    #[test]
    fn test_rejects_bad_usage_indicator() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[edi]\nusage_indicator = \"X\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert!(Config::load(&path).is_err());
    }
}
