use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oci_distribution::{secrets::RegistryAuth, Reference};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oci_login::settings::Settings;
use oci_login::registry::LoginRequest;
use oci_login::{image_registry_provider, LoginContext, Provider};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the registry provider hosting an image
    #[command(visible_alias = "p")]
    Provider {
        /// Image reference (e.g., 123456789012.dkr.ecr.us-east-1.amazonaws.com/app:v1)
        image: String,
    },
    /// Obtain registry credentials for an image and print them as JSON
    Login {
        /// Image reference
        image: String,
        /// Use ambient AWS identity for ECR images (`--aws-autologin=false` disables)
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        aws_autologin: Option<bool>,
        /// Use ambient GCP identity for GCR / Artifact Registry images (`=false` disables)
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        gcp_autologin: Option<bool>,
        /// Use ambient Azure identity for ACR images (`=false` disables)
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        azure_autologin: Option<bool>,
        /// Timeout in seconds (overrides configured timeout_secs)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Debug, Serialize)]
struct LoginOutput {
    provider: Provider,
    registry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

fn parse_reference(image: &str) -> Result<Reference> {
    Reference::try_from(image).with_context(|| format!("Invalid image reference: {}", image))
}

async fn handle_login(
    settings: &Settings,
    image: &str,
    cli_options: (Option<bool>, Option<bool>, Option<bool>),
    timeout: Option<u64>,
) -> Result<()> {
    let reference = parse_reference(image)?;

    let (aws, gcp, azure) = cli_options;
    let opts = settings.providers.with_overrides(aws, gcp, azure);

    let timeout = timeout
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| settings.timeout());

    let token = CancellationToken::new();
    let ctx = LoginContext::with_cancellation(token.clone()).with_timeout(timeout);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling login");
            token.cancel();
        }
    });

    debug!("Provider options: {:?}", opts);
    let request = LoginRequest::new(image, &reference, &opts);
    let provider = request.provider();
    let auth = settings
        .login_manager()
        .dispatch(&ctx, request)
        .await
        .with_context(|| format!("Failed to log in for {}", image))?;

    let (username, password) = match auth {
        Some(RegistryAuth::Basic(username, password)) => (Some(username), Some(password)),
        _ => (None, None),
    };

    let output = LoginOutput {
        provider,
        registry: reference.registry().to_string(),
        username,
        password,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::new().context("Failed to load settings")?;

    match &cli.command {
        Commands::Provider { image } => {
            let reference = parse_reference(image)?;
            println!("{}", image_registry_provider(image, &reference));
        }
        Commands::Login {
            image,
            aws_autologin,
            gcp_autologin,
            azure_autologin,
            timeout,
        } => {
            handle_login(
                &settings,
                image,
                (*aws_autologin, *gcp_autologin, *azure_autologin),
                *timeout,
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn autologin_flags(args: &[&str]) -> (Option<bool>, Option<bool>, Option<bool>) {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Login {
                aws_autologin,
                gcp_autologin,
                azure_autologin,
                ..
            } => (aws_autologin, gcp_autologin, azure_autologin),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_autologin_flags_enable_disable_and_default() {
        let flags = autologin_flags(&[
            "oci-login",
            "login",
            "gcr.io/project/app",
            "--aws-autologin",
            "--gcp-autologin=false",
        ]);
        assert_eq!(flags, (Some(true), Some(false), None));
    }
}
