use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::registry::providers::{AcrClient, GcrClient};
use crate::registry::{LoginManager, ProviderOptions};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Auto-login switches, one per cloud provider
    #[serde(default)]
    pub providers: ProviderOptions,
    #[serde(default)]
    pub gcp: GcpSettings,
    #[serde(default)]
    pub azure: AzureSettings,
    /// Upper bound for a single login call in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GcpSettings {
    /// Metadata server token URL override
    #[serde(default)]
    pub token_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AzureSettings {
    /// IMDS token endpoint override
    #[serde(default)]
    pub imds_endpoint: Option<String>,
}

/// Environment variable naming the directory holding `oci-login.{toml,yaml,yml}`
const CONFIG_DIR_ENV: &str = "OCI_LOGIN_CONFIG_DIR";

fn default_timeout_secs() -> u64 {
    30
}

impl Settings {
    /// Load settings from an optional config file plus the environment.
    ///
    /// Sources, later ones winning:
    /// 1. `oci-login.{toml,yaml,yml}` in `OCI_LOGIN_CONFIG_DIR` (default: current dir)
    /// 2. `OCI_LOGIN_*` environment variables, `__` separating nested keys
    ///    (e.g. `OCI_LOGIN_PROVIDERS__AWS_AUTO_LOGIN=true`)
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| ".".into());
        Self::load(&config_dir)
    }

    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let (settings, unused_fields) = Self::load_from(config_dir, env::vars().collect())?;

        for field in &unused_fields {
            tracing::warn!("Unknown configuration field in oci-login config: {}", field);
        }

        Ok(settings)
    }

    /// Load from `config_dir` and the given environment, returning the
    /// settings together with any unknown configuration keys
    fn load_from(
        config_dir: &str,
        vars: config::Map<String, String>,
    ) -> Result<(Self, Vec<String>), ConfigError> {
        let mut builder = Config::builder();

        let mut found = false;
        for ext in ["toml", "yaml", "yml"] {
            let path = format!("{}/oci-login.{}", config_dir, ext);
            if Path::new(&path).exists() {
                tracing::info!("Loading config file: {}", path);
                builder = builder.add_source(config::File::with_name(&path));
                found = true;
                break;
            }
        }
        if !found {
            tracing::debug!(
                "Optional config file not found: {}/oci-login.{{toml,yaml,yml}}",
                config_dir
            );
        }

        // The config dir variable shares the prefix but selects the file, it is not a setting
        let vars = vars
            .into_iter()
            .filter(|(key, _)| !key.eq_ignore_ascii_case(CONFIG_DIR_ENV))
            .collect();

        builder = builder.add_source(
            Environment::with_prefix("OCI_LOGIN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(vars)),
        );

        let config = builder.build()?;

        let mut unused_fields = Vec::new();
        let settings: Settings = serde_ignored::deserialize(config, |path| {
            unused_fields.push(path.to_string());
        })
        .map_err(|e| ConfigError::Message(format!("Failed to deserialize settings: {}", e)))?;

        Ok((settings, unused_fields))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build a login manager with the configured endpoint overrides applied
    pub fn login_manager(&self) -> LoginManager {
        let mut manager = LoginManager::new();

        if let Some(url) = &self.gcp.token_url {
            manager = manager.with_gcr_client(Arc::new(
                GcrClient::new().with_token_url(url.clone()),
            ));
        }
        if let Some(url) = &self.azure.imds_endpoint {
            manager = manager.with_acr_client(Arc::new(
                AcrClient::new().with_imds_endpoint(url.clone()),
            ));
        }

        manager
    }
}
