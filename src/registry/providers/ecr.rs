use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_ecr::Client as SdkEcrClient;
use base64::Engine;
use oci_distribution::secrets::RegistryAuth;
use regex::Regex;
use tracing::{debug, info};

use super::EcrLogin;
use crate::context::LoginContext;
use crate::error::{LoginError, Result};
use crate::registry::Provider;

lazy_static::lazy_static! {
    // Not anchored: ECR hosts embedded in pull-through-cache paths must match too
    static ref REGISTRY_PART_RE: Regex =
        Regex::new(r"([0-9+]*).dkr.ecr(?:-fips)?\.([^/.]*)\.(amazonaws\.com[.cn]*)").unwrap();
}

/// Extract the AWS account ID and region from an ECR image or registry string
///
/// Returns `None` if the string does not contain an ECR registry host.
///
/// # Example
/// "123456789012.dkr.ecr.us-east-1.amazonaws.com/app:v1" → ("123456789012", "us-east-1")
pub fn parse_image(image: &str) -> Option<(String, String)> {
    let caps = REGISTRY_PART_RE.captures(image)?;
    let account_id = caps.get(1)?.as_str().to_string();
    let region = caps.get(2)?.as_str().to_string();
    Some((account_id, region))
}

/// Decode an ECR authorization token into (username, password)
///
/// The token is base64 of "AWS:password".
pub(crate) fn decode_authorization_token(token: &str) -> Result<(String, String)> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(token)
        .map_err(|e| {
            LoginError::provider(Provider::Aws, format!("failed to decode ECR token: {}", e))
        })?;

    let decoded_str = String::from_utf8(decoded)
        .map_err(|_| LoginError::provider(Provider::Aws, "ECR token is not valid UTF-8"))?;

    match decoded_str.split_once(':') {
        Some((username, password)) => Ok((username.to_string(), password.to_string())),
        None => Err(LoginError::provider(Provider::Aws, "invalid ECR token format")),
    }
}

/// Extract a clean error message from an AWS SDK error's Debug output
fn format_sdk_error<E: std::fmt::Debug>(err: &E) -> String {
    let debug_str = format!("{:?}", err);

    // Pattern: message: Some("actual error message")
    if let Some(start) = debug_str.find("message: Some(\"") {
        let start = start + 15;
        if let Some(end) = debug_str[start..].find("\")") {
            return debug_str[start..start + end].to_string();
        }
    }

    if debug_str.chars().count() > 200 {
        format!("{}...", debug_str.chars().take(200).collect::<String>())
    } else {
        debug_str
    }
}

/// ECR credential client backed by `GetAuthorizationToken`
///
/// Uses the default AWS credential chain (env vars, profile, IAM role, IRSA)
/// with the region taken from the image's registry host.
#[derive(Debug, Clone, Default)]
pub struct EcrClient {
    config: Option<SdkConfig>,
    endpoint_url: Option<String>,
}

impl EcrClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preloaded AWS config instead of the default chain. The region is
    /// still taken from the image.
    pub fn with_config(mut self, config: SdkConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Send ECR API calls to a custom endpoint (e.g. a VPC endpoint)
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    async fn sdk_client(&self, ctx: &LoginContext, region: &str) -> Result<SdkEcrClient> {
        let region = Region::new(region.to_string());

        if let Some(config) = &self.config {
            let mut builder = aws_sdk_ecr::config::Builder::from(config).region(region);
            if let Some(url) = &self.endpoint_url {
                builder = builder.endpoint_url(url);
            }
            return Ok(SdkEcrClient::from_conf(builder.build()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
        if let Some(url) = &self.endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let config = ctx.run(loader.load()).await?;
        Ok(SdkEcrClient::new(&config))
    }

    async fn get_login_auth(&self, ctx: &LoginContext, region: &str) -> Result<RegistryAuth> {
        let client = self.sdk_client(ctx, region).await?;

        let response = ctx
            .run(client.get_authorization_token().send())
            .await?
            .map_err(|e| LoginError::provider(Provider::Aws, format_sdk_error(&e)))?;

        let token = response
            .authorization_data()
            .first()
            .and_then(|data| data.authorization_token())
            .ok_or_else(|| {
                LoginError::provider(Provider::Aws, "no authorization token returned from ECR")
            })?;

        let (username, password) = decode_authorization_token(token)?;
        Ok(RegistryAuth::Basic(username, password))
    }
}

#[async_trait]
impl EcrLogin for EcrClient {
    async fn login(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
    ) -> Result<RegistryAuth> {
        if !auto_login {
            info!("ECR authentication is not enabled, skipping auto-login for {}", image);
            return Err(LoginError::UnconfiguredProvider(Provider::Aws));
        }

        info!("Logging in to AWS ECR for {}", image);

        let (account_id, region) = parse_image(image).ok_or_else(|| LoginError::InvalidImage {
            provider: Provider::Aws,
            image: image.to_string(),
        })?;
        debug!("ECR registry account {} in region {}", account_id, region);

        self.get_login_auth(ctx, &region).await
    }
}
