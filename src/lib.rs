//! Registry provider detection and credential dispatch for OCI images.
//!
//! [`registry::image_registry_provider`] decides whether an image lives in
//! AWS ECR, Google GCR/Artifact Registry, Azure ACR or a generic registry.
//! [`registry::LoginManager`] routes a login to the matching provider client
//! and hands back the resulting [`oci_distribution::secrets::RegistryAuth`].

pub mod context;
pub mod error;
pub mod registry;
pub mod settings;

pub use context::LoginContext;
pub use error::LoginError;
pub use registry::{image_registry_provider, LoginManager, Provider, ProviderOptions};
