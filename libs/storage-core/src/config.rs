use serde::Deserialize;

use crate::error::StorageError;

/// Storage account settings, usually parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage account name, the first label of every endpoint host.
    pub account: String,

    /// Shared-access signature query suffix. A leading `?` is tolerated.
    #[serde(default)]
    pub shared_access_signature: Option<String>,

    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default = "default_endpoint_suffix")]
    pub endpoint_suffix: String,

    /// Whole-request timeout handed to the HTTP client.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Sent as the `MaxDataServiceVersion` default header.
    #[serde(default = "default_max_data_service_version")]
    pub max_data_service_version: String,
}

fn default_scheme() -> String {
    "http".into()
}
fn default_endpoint_suffix() -> String {
    "core.windows.net".into()
}
fn default_max_data_service_version() -> String {
    "3.0;NetFx".into()
}

impl StorageConfig {
    /// Config for `account` with every other field at its default.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            shared_access_signature: None,
            scheme: default_scheme(),
            endpoint_suffix: default_endpoint_suffix(),
            request_timeout_secs: None,
            max_data_service_version: default_max_data_service_version(),
        }
    }

    pub fn load(path: &str) -> Result<Self, StorageError> {
        let content = std::fs::read_to_string(path).map_err(|e| StorageError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        Self::parse(&content).map_err(|e| match e {
            StorageError::Config { context, detail } => StorageError::Config {
                context,
                detail: format!("'{path}': {detail}"),
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, StorageError> {
        let config: StorageConfig = toml::from_str(content).map_err(|e| StorageError::Config {
            context: "parse",
            detail: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        if self.account.is_empty() {
            return Err(StorageError::Config {
                context: "account",
                detail: "account name is empty".into(),
            });
        }
        if !self
            .account
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(StorageError::Config {
                context: "account",
                detail: format!("invalid account name '{}'", self.account),
            });
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(StorageError::Config {
                context: "scheme",
                detail: format!("unsupported scheme '{}'", self.scheme),
            });
        }
        Ok(())
    }
}
