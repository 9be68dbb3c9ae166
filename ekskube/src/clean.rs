use std::{collections::BTreeMap, path::Path};

use serde_yaml::Mapping;

use crate::direct;
pub use crate::direct::{
    ApiVersion, Cluster, ClusterSpec, Context, ContextSpec, ExecConfig, ExecEnvVar,
    InteractiveMode, Kind, User, UserSpec, EXEC_API_VERSION,
};

/// A kubeconfig keyed by entry name.
///
/// Names are unique keys here, so upserting an entry replaces any prior entry of
/// the same name instead of appending a duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct KubeConfig {
    pub kind: Kind,
    pub api_version: ApiVersion,
    pub contexts: BTreeMap<String, ContextSpec>,
    pub current_context: String,
    pub clusters: BTreeMap<String, ClusterSpec>,
    pub preferences: serde_yaml::Value,
    pub users: BTreeMap<String, UserSpec>,
    pub other: Mapping,
}

impl Default for KubeConfig {
    fn default() -> Self {
        direct::KubeConfig::default().into()
    }
}

impl From<direct::KubeConfig> for KubeConfig {
    fn from(kc: direct::KubeConfig) -> Self {
        Self {
            kind: kc.kind,
            api_version: kc.api_version,
            current_context: kc.current_context,
            preferences: kc.preferences,
            other: kc.other,
            contexts: kc
                .contexts
                .into_iter()
                .map(|ctx| (ctx.name, ctx.context))
                .collect(),
            clusters: kc
                .clusters
                .into_iter()
                .map(|cls| (cls.name, cls.cluster))
                .collect(),
            users: kc
                .users
                .into_iter()
                .map(|usr| (usr.name, usr.user))
                .collect(),
        }
    }
}

impl From<KubeConfig> for direct::KubeConfig {
    fn from(kc: KubeConfig) -> Self {
        direct::KubeConfig {
            kind: kc.kind,
            api_version: kc.api_version,
            preferences: kc.preferences,
            current_context: kc.current_context,
            other: kc.other,

            clusters: kc
                .clusters
                .into_iter()
                .map(|(name, cluster)| Cluster { name, cluster })
                .collect(),
            contexts: kc
                .contexts
                .into_iter()
                .map(|(name, context)| Context { name, context })
                .collect(),
            users: kc
                .users
                .into_iter()
                .map(|(name, user)| User { name, user })
                .collect(),
        }
    }
}

impl KubeConfig {
    /// Loads `path`, starting from an empty config when the file does not exist.
    pub fn load_or_default(path: &Path) -> anyhow::Result<KubeConfig> {
        Ok(direct::KubeConfig::read_if_exists(path)?
            .map(KubeConfig::from)
            .unwrap_or_default())
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        direct::KubeConfig::from(self.clone()).to_yaml()
    }
}

pub fn read_config(path: &Path) -> anyhow::Result<KubeConfig> {
    KubeConfig::load_or_default(path)
}

pub fn write_config(kc: KubeConfig, path: &Path) -> anyhow::Result<()> {
    direct::write_config(&kc.into(), path)
}
