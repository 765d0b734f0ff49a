use oci_distribution::{secrets::RegistryAuth, Reference};
use std::sync::Arc;
use tracing::debug;

use super::models::ProviderOptions;
use super::providers::{AcrClient, AcrLogin, EcrClient, EcrLogin, GcrClient, GcrLogin};
use super::{image_registry_provider, Provider};
use crate::context::LoginContext;
use crate::error::Result;

/// A classified login request carrying exactly what its provider client needs
#[derive(Debug, Clone, Copy)]
pub enum LoginRequest<'a> {
    Aws {
        auto_login: bool,
        image: &'a str,
    },
    Gcp {
        auto_login: bool,
        image: &'a str,
        reference: &'a Reference,
    },
    Azure {
        auto_login: bool,
        image: &'a str,
        reference: &'a Reference,
    },
    Generic,
}

impl<'a> LoginRequest<'a> {
    /// Classify `image` and pick the matching auto-login flag from `opts`
    pub fn new(image: &'a str, reference: &'a Reference, opts: &ProviderOptions) -> Self {
        match image_registry_provider(image, reference) {
            Provider::Aws => LoginRequest::Aws {
                auto_login: opts.aws_auto_login,
                image,
            },
            Provider::Gcp => LoginRequest::Gcp {
                auto_login: opts.gcp_auto_login,
                image,
                reference,
            },
            Provider::Azure => LoginRequest::Azure {
                auto_login: opts.azure_auto_login,
                image,
                reference,
            },
            Provider::Generic => LoginRequest::Generic,
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            LoginRequest::Aws { .. } => Provider::Aws,
            LoginRequest::Gcp { .. } => Provider::Gcp,
            LoginRequest::Azure { .. } => Provider::Azure,
            LoginRequest::Generic => Provider::Generic,
        }
    }
}

/// Login manager for the supported registry providers
///
/// Holds one credential client per cloud provider and routes each login to
/// the client matching the image's registry. Clients are replaced with the
/// `with_*_client` builders before the manager is shared; once built it is
/// immutable and safe to use from concurrent tasks.
#[derive(Clone)]
pub struct LoginManager {
    ecr: Arc<dyn EcrLogin>,
    gcr: Arc<dyn GcrLogin>,
    acr: Arc<dyn AcrLogin>,
}

impl Default for LoginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginManager {
    /// Create a manager with the default ECR, GCR and ACR clients
    pub fn new() -> Self {
        Self {
            ecr: Arc::new(EcrClient::new()),
            gcr: Arc::new(GcrClient::new()),
            acr: Arc::new(AcrClient::new()),
        }
    }

    /// Override the default ECR client
    pub fn with_ecr_client(mut self, client: Arc<dyn EcrLogin>) -> Self {
        self.ecr = client;
        self
    }

    /// Override the default GCR client
    pub fn with_gcr_client(mut self, client: Arc<dyn GcrLogin>) -> Self {
        self.gcr = client;
        self
    }

    /// Override the default ACR client
    pub fn with_acr_client(mut self, client: Arc<dyn AcrLogin>) -> Self {
        self.acr = client;
        self
    }

    /// Authenticate against the registry hosting `image`.
    ///
    /// Returns `Ok(None)` for generic registries, which need no
    /// provider-specific credentials. Client results, including errors, are
    /// returned unchanged.
    pub async fn login(
        &self,
        ctx: &LoginContext,
        image: &str,
        reference: &Reference,
        opts: &ProviderOptions,
    ) -> Result<Option<RegistryAuth>> {
        let request = LoginRequest::new(image, reference, opts);
        self.dispatch(ctx, request).await
    }

    /// Forward an already classified request to its provider client
    pub async fn dispatch(
        &self,
        ctx: &LoginContext,
        request: LoginRequest<'_>,
    ) -> Result<Option<RegistryAuth>> {
        debug!("Dispatching {} registry login", request.provider());

        match request {
            LoginRequest::Aws { auto_login, image } => {
                self.ecr.login(ctx, auto_login, image).await.map(Some)
            }
            LoginRequest::Gcp {
                auto_login,
                image,
                reference,
            } => self
                .gcr
                .login(ctx, auto_login, image, reference)
                .await
                .map(Some),
            LoginRequest::Azure {
                auto_login,
                image,
                reference,
            } => self
                .acr
                .login(ctx, auto_login, image, reference)
                .await
                .map(Some),
            LoginRequest::Generic => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoginError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        auto_login: bool,
        image: String,
        registry: Option<String>,
        has_deadline: bool,
    }

    /// Test double recording every login call
    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    impl RecordingClient {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(
            &self,
            ctx: &LoginContext,
            provider: Provider,
            auto_login: bool,
            image: &str,
            reference: Option<&Reference>,
        ) -> Result<RegistryAuth> {
            self.calls.lock().unwrap().push(Call {
                auto_login,
                image: image.to_string(),
                registry: reference.map(|r| r.registry().to_string()),
                has_deadline: ctx.deadline().is_some(),
            });
            if self.fail {
                Err(LoginError::provider(provider, "access denied"))
            } else {
                Ok(RegistryAuth::Basic(
                    format!("{}-user", provider),
                    "secret".to_string(),
                ))
            }
        }
    }

    #[async_trait]
    impl EcrLogin for RecordingClient {
        async fn login(
            &self,
            ctx: &LoginContext,
            auto_login: bool,
            image: &str,
        ) -> Result<RegistryAuth> {
            self.record(ctx, Provider::Aws, auto_login, image, None)
        }
    }

    #[async_trait]
    impl GcrLogin for RecordingClient {
        async fn login(
            &self,
            ctx: &LoginContext,
            auto_login: bool,
            image: &str,
            reference: &Reference,
        ) -> Result<RegistryAuth> {
            self.record(ctx, Provider::Gcp, auto_login, image, Some(reference))
        }
    }

    #[async_trait]
    impl AcrLogin for RecordingClient {
        async fn login(
            &self,
            ctx: &LoginContext,
            auto_login: bool,
            image: &str,
            reference: &Reference,
        ) -> Result<RegistryAuth> {
            self.record(ctx, Provider::Azure, auto_login, image, Some(reference))
        }
    }

    struct Harness {
        ecr: Arc<RecordingClient>,
        gcr: Arc<RecordingClient>,
        acr: Arc<RecordingClient>,
        manager: LoginManager,
    }

    fn harness() -> Harness {
        let ecr = Arc::new(RecordingClient::default());
        let gcr = Arc::new(RecordingClient::default());
        let acr = Arc::new(RecordingClient::default());
        let manager = LoginManager::new()
            .with_ecr_client(ecr.clone())
            .with_gcr_client(gcr.clone())
            .with_acr_client(acr.clone());
        Harness {
            ecr,
            gcr,
            acr,
            manager,
        }
    }

    fn options() -> ProviderOptions {
        ProviderOptions {
            aws_auto_login: true,
            gcp_auto_login: false,
            azure_auto_login: true,
        }
    }

    async fn login(manager: &LoginManager, image: &str) -> Result<Option<RegistryAuth>> {
        let reference = Reference::try_from(image).unwrap();
        manager
            .login(&LoginContext::background(), image, &reference, &options())
            .await
    }

    #[tokio::test]
    async fn test_generic_login_returns_none_without_calling_clients() {
        let h = harness();

        let auth = login(&h.manager, "docker.io/library/nginx").await.unwrap();

        assert!(auth.is_none());
        assert!(h.ecr.calls().is_empty());
        assert!(h.gcr.calls().is_empty());
        assert!(h.acr.calls().is_empty());
    }

    #[tokio::test]
    async fn test_aws_login_forwards_flag_and_image() {
        let h = harness();
        let image = "123456789012.dkr.ecr.us-west-2.amazonaws.com/my-repo:v1";

        let auth = login(&h.manager, image).await.unwrap();

        match auth {
            Some(RegistryAuth::Basic(user, pass)) => {
                assert_eq!(user, "aws-user");
                assert_eq!(pass, "secret");
            }
            other => panic!("unexpected auth: {:?}", other),
        }
        assert_eq!(
            h.ecr.calls(),
            vec![Call {
                auto_login: true,
                image: image.to_string(),
                registry: None,
                has_deadline: false,
            }]
        );
        assert!(h.gcr.calls().is_empty());
        assert!(h.acr.calls().is_empty());
    }

    #[tokio::test]
    async fn test_gcp_login_forwards_gcp_flag_and_reference() {
        let h = harness();

        login(&h.manager, "gcr.io/my-project/my-repo").await.unwrap();

        let calls = h.gcr.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].auto_login);
        assert_eq!(calls[0].registry.as_deref(), Some("gcr.io"));
        assert!(h.ecr.calls().is_empty());
        assert!(h.acr.calls().is_empty());
    }

    #[tokio::test]
    async fn test_azure_login_forwards_azure_flag_and_reference() {
        let h = harness();

        login(&h.manager, "myregistry.azurecr.io/my-repo").await.unwrap();

        let calls = h.acr.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].auto_login);
        assert_eq!(calls[0].image, "myregistry.azurecr.io/my-repo");
        assert_eq!(calls[0].registry.as_deref(), Some("myregistry.azurecr.io"));
        assert!(h.ecr.calls().is_empty());
        assert!(h.gcr.calls().is_empty());
    }

    #[tokio::test]
    async fn test_client_error_is_returned_unchanged() {
        let ecr = Arc::new(RecordingClient::failing());
        let manager = LoginManager::new().with_ecr_client(ecr.clone());

        let err = login(&manager, "123456789012.dkr.ecr.us-west-2.amazonaws.com/app")
            .await
            .unwrap_err();

        match err {
            LoginError::Provider { provider, message } => {
                assert_eq!(provider, Provider::Aws);
                assert_eq!(message, "access denied");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(ecr.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_override_replaces_previous_client() {
        let old = Arc::new(RecordingClient::default());
        let new = Arc::new(RecordingClient::default());
        let manager = LoginManager::new()
            .with_gcr_client(old.clone())
            .with_gcr_client(new.clone());

        login(&manager, "gcr.io/my-project/my-repo").await.unwrap();
        login(&manager, "us-docker.pkg.dev/my-project/repo/app").await.unwrap();

        assert!(old.calls().is_empty());
        assert_eq!(new.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_context_is_passed_to_client() {
        let h = harness();
        let image = "123456789012.dkr.ecr.us-west-2.amazonaws.com/app";
        let reference = Reference::try_from(image).unwrap();
        let ctx = LoginContext::background().with_timeout(Duration::from_secs(30));

        h.manager
            .login(&ctx, image, &reference, &options())
            .await
            .unwrap();

        assert!(h.ecr.calls()[0].has_deadline);
    }

    #[test]
    fn test_login_request_selects_provider_flag() {
        let opts = ProviderOptions {
            aws_auto_login: false,
            gcp_auto_login: true,
            azure_auto_login: false,
        };
        let image = "europe-west1-docker.pkg.dev/project/repo/app";
        let reference = Reference::try_from(image).unwrap();

        let request = LoginRequest::new(image, &reference, &opts);

        assert_eq!(request.provider(), Provider::Gcp);
        assert!(matches!(
            request,
            LoginRequest::Gcp {
                auto_login: true,
                ..
            }
        ));
    }
}
