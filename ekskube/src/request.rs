use thiserror::Error;

/// Rejections raised before anything touches the filesystem or the network.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("name must be specified")]
    EmptyName,
    #[error("cannot specify both forward-session-name and role-session-name parameter")]
    ConflictingSessionName,
}

/// Everything needed to generate one kubeconfig entry.
///
/// Empty strings are treated the same as absent values throughout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequest {
    /// EKS cluster name.
    pub cluster_name: String,
    /// Overrides the region from the default AWS configuration chain.
    pub region: Option<String>,
    /// Role ARN, or a bare role name in the caller's account.
    pub role_to_assume: Option<String>,
    pub role_session_name: Option<String>,
    pub role_external_id: Option<String>,
    /// Map the federated caller's session name onto the assumed session.
    pub forward_session_name: bool,
    pub context_alias: Option<String>,
    pub user_alias: Option<String>,
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl AuthRequest {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.cluster_name.is_empty() {
            return Err(RequestError::EmptyName);
        }
        if self.forward_session_name && self.session_name().is_some() {
            return Err(RequestError::ConflictingSessionName);
        }
        Ok(())
    }

    pub fn region(&self) -> Option<&str> {
        non_empty(&self.region)
    }

    pub fn role_to_assume(&self) -> Option<&str> {
        non_empty(&self.role_to_assume)
    }

    pub fn session_name(&self) -> Option<&str> {
        non_empty(&self.role_session_name)
    }

    pub fn external_id(&self) -> &str {
        self.role_external_id.as_deref().unwrap_or_default()
    }

    /// Context name: the alias when one is given, the cluster ARN otherwise.
    pub fn context_name<'a>(&'a self, cluster_arn: &'a str) -> &'a str {
        resolve_alias(&self.context_alias, cluster_arn)
    }

    pub fn user_name<'a>(&'a self, cluster_arn: &'a str) -> &'a str {
        resolve_alias(&self.user_alias, cluster_arn)
    }
}

pub fn resolve_alias<'a>(alias: &'a Option<String>, cluster_arn: &'a str) -> &'a str {
    non_empty(alias).unwrap_or(cluster_arn)
}
