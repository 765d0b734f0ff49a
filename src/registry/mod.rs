pub mod manager;
pub mod models;
pub mod providers;

pub use manager::{LoginManager, LoginRequest};
pub use models::ProviderOptions;

use oci_distribution::Reference;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Container registry provider hosting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
    /// Any registry without provider-specific login
    Generic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Gcp => "gcp",
            Provider::Azure => "azure",
            Provider::Generic => "generic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "gcp" => Ok(Provider::Gcp),
            "azure" => Ok(Provider::Azure),
            "generic" => Ok(Provider::Generic),
            other => Err(format!("unknown registry provider: {}", other)),
        }
    }
}

/// Determine which registry provider hosts `image`.
///
/// Checks run in a fixed order and the first match wins:
/// 1. the image string matches the ECR registry pattern (anywhere in the
///    string, so pull-through-cache paths count)
/// 2. the registry host is a GCR / Artifact Registry host
/// 3. the registry host is an Azure Container Registry host
///
/// Anything else is [`Provider::Generic`]. Pure and free of I/O.
pub fn image_registry_provider(image: &str, reference: &Reference) -> Provider {
    let provider = if providers::ecr::parse_image(image).is_some() {
        Provider::Aws
    } else if providers::gcr::valid_host(reference.registry()) {
        Provider::Gcp
    } else if providers::acr::valid_host(reference.registry()) {
        Provider::Azure
    } else {
        Provider::Generic
    };

    tracing::debug!(
        "Classified image {} (registry {}) as {}",
        image,
        reference.registry(),
        provider
    );
    provider
}
