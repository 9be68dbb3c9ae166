//! Seams to the AWS control plane: EKS cluster lookup and STS caller identity.
use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Connection details of an EKS cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    pub arn: String,
    pub endpoint: String,
    /// PEM bundle, already decoded from the API's base64.
    pub ca_certificate: Vec<u8>,
}

impl ClusterDescriptor {
    /// Builds a descriptor from the base64 CA data the EKS API returns.
    pub fn from_encoded(
        arn: impl Into<String>,
        endpoint: impl Into<String>,
        ca_data: &str,
    ) -> anyhow::Result<Self> {
        let ca_certificate = STANDARD
            .decode(ca_data.trim())
            .context("decoding cluster certificate authority data")?;
        Ok(Self {
            arn: arn.into(),
            endpoint: endpoint.into(),
            ca_certificate,
        })
    }
}

#[async_trait]
pub trait ClusterDescriber {
    async fn describe_cluster(&self, name: &str) -> anyhow::Result<ClusterDescriptor>;
}

#[async_trait]
pub trait CallerIdentity {
    /// Account id of whoever the ambient credentials belong to.
    async fn caller_account(&self) -> anyhow::Result<String>;
}

/// EKS and STS clients sharing one resolved SDK configuration.
#[derive(Debug, Clone)]
pub struct AwsCloud {
    eks: aws_sdk_eks::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsCloud {
    /// Resolves the default credential chain, optionally overriding its region,
    /// and checks that credentials are actually available.
    pub async fn load(region: Option<&str>) -> anyhow::Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            debug!(region, "Overriding default region");
            loader = loader.region(Region::new(region.to_owned()));
        }
        let config = loader.load().await;
        check_credentials(&config).await.map_err(|e| {
            anyhow!(
                "could not load AWS credentials, have you run configure-aws-credentials first? {e:#}"
            )
        })?;
        Ok(Self::from_config(&config))
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            eks: aws_sdk_eks::Client::new(config),
            sts: aws_sdk_sts::Client::new(config),
        }
    }
}

async fn check_credentials(config: &SdkConfig) -> anyhow::Result<()> {
    let provider = config
        .credentials_provider()
        .context("no credentials provider configured")?;
    provider.provide_credentials().await?;
    Ok(())
}

#[async_trait]
impl ClusterDescriber for AwsCloud {
    async fn describe_cluster(&self, name: &str) -> anyhow::Result<ClusterDescriptor> {
        debug!(name, "Describing cluster");
        let output = self
            .eks
            .describe_cluster()
            .name(name)
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "could not fetch cluster details: {}",
                    aws_sdk_eks::error::DisplayErrorContext(e)
                )
            })?;
        let cluster = output
            .cluster()
            .with_context(|| format!("cluster {name} was not returned"))?;
        let arn = cluster
            .arn()
            .with_context(|| format!("cluster {name} has no ARN"))?;
        let endpoint = cluster
            .endpoint()
            .with_context(|| format!("cluster {name} has no endpoint yet"))?;
        let ca_data = cluster
            .certificate_authority()
            .and_then(|ca| ca.data())
            .with_context(|| format!("cluster {name} has no certificate authority data"))?;
        ClusterDescriptor::from_encoded(arn, endpoint, ca_data)
    }
}

#[async_trait]
impl CallerIdentity for AwsCloud {
    async fn caller_account(&self) -> anyhow::Result<String> {
        let output = self.sts.get_caller_identity().send().await.map_err(|e| {
            anyhow!(
                "could not resolve caller identity: {}",
                aws_sdk_sts::error::DisplayErrorContext(e)
            )
        })?;
        output
            .account()
            .map(str::to_owned)
            .context("caller identity has no account")
    }
}
