use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::args::helper_args;
use crate::clean::{write_config, KubeConfig};
use crate::cloud::{CallerIdentity, ClusterDescriber};
use crate::helper::{resolve_helper_path, HelperStore};
use crate::request::AuthRequest;
use crate::role::qualify_role;

/// The run was interrupted while waiting on AWS.
#[derive(Debug, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled.into()),
        res = fut => res,
    }
}

/// Writes kubeconfig entries for EKS clusters into one kubeconfig file.
pub struct Authenticator<C, H> {
    kubeconfig: PathBuf,
    cloud: C,
    helpers: H,
}

impl<C, H> Authenticator<C, H>
where
    C: ClusterDescriber + CallerIdentity + Sync,
    H: HelperStore,
{
    pub fn new(kubeconfig: impl Into<PathBuf>, cloud: C, helpers: H) -> Self {
        Self {
            kubeconfig: kubeconfig.into(),
            cloud,
            helpers,
        }
    }

    pub fn cloud(&self) -> &C {
        &self.cloud
    }

    pub fn helpers(&self) -> &H {
        &self.helpers
    }

    /// Directory holding the kubeconfig and the staged helper copies.
    pub fn kube_dir(&self) -> &Path {
        self.kubeconfig
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Describes the cluster and merges a cluster, context and exec user for it
    /// into the kubeconfig, making the new context current.
    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        debug!(name = %request.cluster_name, "Configuring cluster access");
        request.validate()?;

        let kube_dir = self.kube_dir();
        fs::create_dir_all(kube_dir)
            .with_context(|| format!("Creating {}", kube_dir.display()))?;

        debug!(path = %self.kubeconfig.display(), "Loading existing config");
        let mut kc = KubeConfig::load_or_default(&self.kubeconfig)?;

        let cluster = cancellable(cancel, self.cloud.describe_cluster(&request.cluster_name)).await?;
        let context_name = request.context_name(&cluster.arn);
        let user_name = request.user_name(&cluster.arn);
        kc.merge_cluster(&cluster, context_name, user_name);

        let role_arn = match request.role_to_assume() {
            Some(role) => Some(cancellable(cancel, qualify_role(role, &self.cloud)).await?),
            None => None,
        };
        debug!(
            role_to_assume = ?role_arn,
            role_external_id = request.external_id(),
            role_session_name = ?request.session_name(),
            forward_session_name = request.forward_session_name,
            "Resolved role options"
        );
        let args = helper_args(request, role_arn.as_deref());

        let helper = resolve_helper_path(&self.helpers, kube_dir);
        kc.merge_exec_user(user_name, &helper, args);

        debug!(path = %self.kubeconfig.display(), "Writing config");
        write_config(kc, &self.kubeconfig)?;
        info!(
            context = context_name,
            path = %self.kubeconfig.display(),
            "Updated kubeconfig"
        );
        Ok(())
    }
}
