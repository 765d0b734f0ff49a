use async_trait::async_trait;
use oci_distribution::{secrets::RegistryAuth, Reference};
use reqwest::Client;
use tracing::{debug, info};

use super::GcrLogin;
use crate::context::LoginContext;
use crate::error::{LoginError, Result};
use crate::registry::models::MetadataToken;
use crate::registry::Provider;

/// GCE metadata server endpoint for the default service account's token
pub const GCP_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Username GCR and Artifact Registry accept alongside an OAuth2 access token
const GCP_TOKEN_USERNAME: &str = "oauth2accesstoken";

/// Whether `host` is a Google Container Registry or Artifact Registry host
///
/// Matches "gcr.io", regional "*.gcr.io" and "<region>-docker.pkg.dev".
pub fn valid_host(host: &str) -> bool {
    host == "gcr.io" || host.ends_with(".gcr.io") || host.ends_with("-docker.pkg.dev")
}

/// GCR credential client using the GCE metadata server
///
/// Works on GCE, GKE (with workload identity) and Cloud Run, wherever the
/// metadata server hands out tokens for the attached service account.
#[derive(Debug, Clone)]
pub struct GcrClient {
    http: Client,
    token_url: String,
}

impl Default for GcrClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GcrClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            token_url: GCP_TOKEN_URL.to_string(),
        }
    }

    /// Override the metadata token URL
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    async fn get_login_auth(&self, ctx: &LoginContext) -> Result<RegistryAuth> {
        debug!("Requesting GCP access token from {}", self.token_url);

        let response = ctx
            .run(
                self.http
                    .get(&self.token_url)
                    .header("Metadata-Flavor", "Google")
                    .send(),
            )
            .await??;

        let status = response.status();
        if !status.is_success() {
            let body = ctx.run(response.text()).await?.unwrap_or_default();
            return Err(LoginError::provider(
                Provider::Gcp,
                format!(
                    "unexpected status from metadata server: {} (body: {})",
                    status, body
                ),
            ));
        }

        let token: MetadataToken = ctx.run(response.json()).await??;
        if let Some(expires_in) = token.expires_in {
            debug!("GCP access token valid for {}s", expires_in);
        }

        Ok(RegistryAuth::Basic(
            GCP_TOKEN_USERNAME.to_string(),
            token.access_token,
        ))
    }
}

#[async_trait]
impl GcrLogin for GcrClient {
    async fn login(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
        reference: &Reference,
    ) -> Result<RegistryAuth> {
        if !auto_login {
            info!("GCR authentication is not enabled, skipping auto-login for {}", image);
            return Err(LoginError::UnconfiguredProvider(Provider::Gcp));
        }

        info!(
            "Logging in to GCP registry {} for {}",
            reference.registry(),
            image
        );
        self.get_login_auth(ctx).await
    }
}
