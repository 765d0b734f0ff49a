use serde::{Deserialize, Serialize};

/// Per-provider opt-in for automatic credential acquisition
///
/// Each flag lets the matching client use ambient cloud identity (instance
/// role, workload identity, managed identity) to fetch registry credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOptions {
    /// Attempt to get credentials for images in ECR
    #[serde(default)]
    pub aws_auto_login: bool,
    /// Attempt to get credentials for images in GCR / Artifact Registry
    #[serde(default)]
    pub gcp_auto_login: bool,
    /// Attempt to get credentials for images in ACR
    #[serde(default)]
    pub azure_auto_login: bool,
}

impl ProviderOptions {
    /// Replace each flag that has an explicit override, keeping the rest
    pub fn with_overrides(
        mut self,
        aws_auto_login: Option<bool>,
        gcp_auto_login: Option<bool>,
        azure_auto_login: Option<bool>,
    ) -> Self {
        if let Some(enabled) = aws_auto_login {
            self.aws_auto_login = enabled;
        }
        if let Some(enabled) = gcp_auto_login {
            self.gcp_auto_login = enabled;
        }
        if let Some(enabled) = azure_auto_login {
            self.azure_auto_login = enabled;
        }
        self
    }
}

/// Access token returned by the GCE metadata server
#[derive(Debug, Deserialize)]
pub struct MetadataToken {
    pub access_token: String,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Entra ID token response (IMDS and the v2.0 token endpoint share this shape)
#[derive(Debug, Deserialize)]
pub struct AadToken {
    pub access_token: String,
}

/// Response of the ACR `/oauth2/exchange` endpoint
#[derive(Debug, Deserialize)]
pub struct AcrRefreshToken {
    pub refresh_token: String,
}
