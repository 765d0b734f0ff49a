pub mod acr;
pub mod ecr;
pub mod gcr;

pub use acr::AcrClient;
pub use ecr::EcrClient;
pub use gcr::GcrClient;

use async_trait::async_trait;
use oci_distribution::{secrets::RegistryAuth, Reference};

use crate::context::LoginContext;
use crate::error::Result;

/// Credential source for AWS Elastic Container Registry
#[async_trait]
pub trait EcrLogin: Send + Sync {
    /// Get registry credentials for `image`
    ///
    /// # Arguments
    /// * `ctx` - Cancellation and deadline for the call
    /// * `auto_login` - Whether ambient AWS identity may be used
    /// * `image` - The full image string (e.g., "123456789012.dkr.ecr.us-east-1.amazonaws.com/app:v1")
    async fn login(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
    ) -> Result<RegistryAuth>;
}

/// Credential source for Google Container Registry and Artifact Registry
#[async_trait]
pub trait GcrLogin: Send + Sync {
    async fn login(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
        reference: &Reference,
    ) -> Result<RegistryAuth>;
}

/// Credential source for Azure Container Registry
#[async_trait]
pub trait AcrLogin: Send + Sync {
    async fn login(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
        reference: &Reference,
    ) -> Result<RegistryAuth>;
}
