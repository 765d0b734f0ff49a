use async_trait::async_trait;
use oci_distribution::{secrets::RegistryAuth, Reference};
use reqwest::Client;
use std::env;
use std::path::PathBuf;
use tracing::{debug, info};
use url::Url;

use super::AcrLogin;
use crate::context::LoginContext;
use crate::error::{LoginError, Result};
use crate::registry::models::{AadToken, AcrRefreshToken};
use crate::registry::Provider;

/// Azure Instance Metadata Service managed identity token endpoint
pub const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Username ACR expects alongside a refresh token
const ACR_TOKEN_USERNAME: &str = "00000000-0000-0000-0000-000000000000";

const ACR_HOST_SUFFIXES: [&str; 4] = [".azurecr.io", ".azurecr.cn", ".azurecr.de", ".azurecr.us"];

/// Whether `host` is an Azure Container Registry host
pub fn valid_host(host: &str) -> bool {
    ACR_HOST_SUFFIXES
        .iter()
        .any(|suffix| host.ends_with(suffix))
}

/// Azure cloud a registry lives in, derived from its host suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AzureCloud {
    Public,
    China,
    UsGovernment,
}

impl AzureCloud {
    pub fn from_registry_host(host: &str) -> Self {
        if host.ends_with(".azurecr.cn") {
            AzureCloud::China
        } else if host.ends_with(".azurecr.us") {
            AzureCloud::UsGovernment
        } else {
            AzureCloud::Public
        }
    }

    /// ARM resource the Entra ID token is requested for
    pub fn resource(&self) -> &'static str {
        match self {
            AzureCloud::Public => "https://management.core.windows.net/",
            AzureCloud::China => "https://management.core.chinacloudapi.cn/",
            AzureCloud::UsGovernment => "https://management.core.usgovcloudapi.net/",
        }
    }

    pub fn authority_host(&self) -> &'static str {
        match self {
            AzureCloud::Public => "https://login.microsoftonline.com/",
            AzureCloud::China => "https://login.chinacloudapi.cn/",
            AzureCloud::UsGovernment => "https://login.microsoftonline.us/",
        }
    }
}

/// Source of the Entra ID access token exchanged for ACR credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AzureCredential {
    /// Federated token file projected by AKS workload identity
    WorkloadIdentity {
        token_file: PathBuf,
        client_id: String,
        tenant_id: String,
        /// Overrides the cloud's default authority host
        authority_host: Option<String>,
    },
    /// Managed identity from IMDS; `client_id` selects a user-assigned identity
    ManagedIdentity { client_id: Option<String> },
}

impl AzureCredential {
    /// Workload identity when the AKS webhook variables are present,
    /// managed identity otherwise
    pub fn from_env() -> Self {
        let token_file = env::var("AZURE_FEDERATED_TOKEN_FILE").ok();
        let client_id = env::var("AZURE_CLIENT_ID").ok().filter(|v| !v.is_empty());
        let tenant_id = env::var("AZURE_TENANT_ID").ok();

        match (token_file, client_id.clone(), tenant_id) {
            (Some(token_file), Some(client_id), Some(tenant_id)) => {
                AzureCredential::WorkloadIdentity {
                    token_file: PathBuf::from(token_file),
                    client_id,
                    tenant_id,
                    authority_host: env::var("AZURE_AUTHORITY_HOST").ok(),
                }
            }
            _ => AzureCredential::ManagedIdentity { client_id },
        }
    }
}

fn unexpected_status(what: &str, status: reqwest::StatusCode, body: String) -> LoginError {
    LoginError::provider(
        Provider::Azure,
        format!("{}: unexpected status {} (body: {})", what, status, body),
    )
}

/// ACR credential client
///
/// Obtains an Entra ID access token for the registry's cloud and exchanges
/// it at the registry's `/oauth2/exchange` endpoint for an ACR refresh token.
#[derive(Debug, Clone)]
pub struct AcrClient {
    http: Client,
    credential: Option<AzureCredential>,
    imds_endpoint: String,
    exchange_endpoint: Option<String>,
}

impl Default for AcrClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AcrClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            credential: None,
            imds_endpoint: IMDS_TOKEN_URL.to_string(),
            exchange_endpoint: None,
        }
    }

    /// Use a fixed credential instead of detecting one from the environment
    pub fn with_credential(mut self, credential: AzureCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_imds_endpoint(mut self, url: impl Into<String>) -> Self {
        self.imds_endpoint = url.into();
        self
    }

    /// Send the token exchange to `base` instead of `https://<registry>`
    pub fn with_exchange_endpoint(mut self, base: impl Into<String>) -> Self {
        self.exchange_endpoint = Some(base.into());
        self
    }

    async fn aad_token(&self, ctx: &LoginContext, cloud: AzureCloud) -> Result<String> {
        let credential = self
            .credential
            .clone()
            .unwrap_or_else(AzureCredential::from_env);

        let response = match credential {
            AzureCredential::WorkloadIdentity {
                token_file,
                client_id,
                tenant_id,
                authority_host,
            } => {
                let assertion = ctx
                    .run(tokio::fs::read_to_string(&token_file))
                    .await?
                    .map_err(|e| {
                        LoginError::provider(
                            Provider::Azure,
                            format!(
                                "failed to read federated token file {}: {}",
                                token_file.display(),
                                e
                            ),
                        )
                    })?;

                let authority = authority_host.as_deref().unwrap_or(cloud.authority_host());
                let token_url = Url::parse(authority)
                    .and_then(|base| base.join(&format!("{}/oauth2/v2.0/token", tenant_id)))
                    .map_err(|e| {
                        LoginError::provider(
                            Provider::Azure,
                            format!("invalid authority host {}: {}", authority, e),
                        )
                    })?;
                let scope = format!("{}.default", cloud.resource());

                debug!("Requesting Entra ID token via workload identity from {}", token_url);
                ctx.run(
                    self.http
                        .post(token_url)
                        .form(&[
                            ("client_id", client_id.as_str()),
                            ("scope", scope.as_str()),
                            (
                                "client_assertion_type",
                                "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
                            ),
                            ("client_assertion", assertion.trim()),
                            ("grant_type", "client_credentials"),
                        ])
                        .send(),
                )
                .await??
            }
            AzureCredential::ManagedIdentity { client_id } => {
                let mut params = vec![
                    ("api-version", "2018-02-01".to_string()),
                    ("resource", cloud.resource().to_string()),
                ];
                if let Some(client_id) = client_id {
                    params.push(("client_id", client_id));
                }
                let token_url = Url::parse_with_params(&self.imds_endpoint, &params).map_err(|e| {
                    LoginError::provider(
                        Provider::Azure,
                        format!("invalid IMDS endpoint {}: {}", self.imds_endpoint, e),
                    )
                })?;

                debug!("Requesting Entra ID token from IMDS");
                ctx.run(self.http.get(token_url).header("Metadata", "true").send())
                    .await??
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = ctx.run(response.text()).await?.unwrap_or_default();
            return Err(unexpected_status("Entra ID token request failed", status, body));
        }

        let token: AadToken = ctx.run(response.json()).await??;
        Ok(token.access_token)
    }

    async fn exchange(
        &self,
        ctx: &LoginContext,
        registry: &str,
        access_token: &str,
    ) -> Result<String> {
        let base = self
            .exchange_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}", registry));
        let exchange_url = format!("{}/oauth2/exchange", base.trim_end_matches('/'));

        debug!("Exchanging Entra ID token for ACR refresh token at {}", exchange_url);
        let response = ctx
            .run(
                self.http
                    .post(&exchange_url)
                    .form(&[
                        ("grant_type", "access_token"),
                        ("service", registry),
                        ("access_token", access_token),
                    ])
                    .send(),
            )
            .await??;

        let status = response.status();
        if !status.is_success() {
            let body = ctx.run(response.text()).await?.unwrap_or_default();
            return Err(unexpected_status("ACR token exchange failed", status, body));
        }

        let token: AcrRefreshToken = ctx.run(response.json()).await??;
        Ok(token.refresh_token)
    }
}

#[async_trait]
impl AcrLogin for AcrClient {
    async fn login(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
        reference: &Reference,
    ) -> Result<RegistryAuth> {
        if !auto_login {
            info!("ACR authentication is not enabled, skipping auto-login for {}", image);
            return Err(LoginError::UnconfiguredProvider(Provider::Azure));
        }

        let registry = reference.registry();
        let cloud = AzureCloud::from_registry_host(registry);
        info!("Logging in to Azure registry {} for {}", registry, image);

        let access_token = self.aad_token(ctx, cloud).await?;
        let refresh_token = self.exchange(ctx, registry, &access_token).await?;

        Ok(RegistryAuth::Basic(
            ACR_TOKEN_USERNAME.to_string(),
            refresh_token,
        ))
    }
}
