//! The kubeconfig document as it is laid out on disk: lists of named entries.
//!
//! Every `*Spec` type carries an `other` mapping so keys this crate does not model
//! survive a read-modify-write untouched.
use std::fs;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use serde::*;
use serde_yaml::{Mapping, Value as YamlValue};

/// `apiVersion` written into exec entries for the credential helper.
pub const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

fn deserialize_null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    T: Default + Deserialize<'de>,
    D: Deserializer<'de>,
{
    let opt = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

fn empty_mapping() -> YamlValue {
    YamlValue::Mapping(Mapping::new())
}

fn deserialize_null_as_empty_mapping<'de, D>(deserializer: D) -> Result<YamlValue, D::Error>
where
    D: Deserializer<'de>,
{
    match YamlValue::deserialize(deserializer)? {
        YamlValue::Null => Ok(empty_mapping()),
        value => Ok(value),
    }
}

// region: Context
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContextSpec {
    pub cluster: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub other: Mapping,
}

impl ContextSpec {
    pub fn new(cluster: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            user: user.into(),
            namespace: None,
            other: Mapping::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Context {
    pub name: String,
    pub context: ContextSpec,
}
// endregion

// region: Cluster
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterSpec {
    pub server: String,
    /// Base64 of the PEM bundle, the way kubectl stores inline CA data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    #[serde(flatten)]
    pub other: Mapping,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Cluster {
    pub name: String,
    pub cluster: ClusterSpec,
}
// endregion

// region: User
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveMode {
    Never,
    IfAvailable,
    Always,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecEnvVar {
    pub name: String,
    pub value: String,
}

/// Credential plugin invocation, see
/// <https://kubernetes.io/docs/reference/access-authn-authz/authentication/#client-go-credential-plugins>.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<ExecEnvVar>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provide_cluster_info: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_mode: Option<InteractiveMode>,
    #[serde(flatten)]
    pub other: Mapping,
}

impl ExecConfig {
    /// A non-interactive `v1beta1` plugin call with an empty environment.
    pub fn never_interactive(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            api_version: Some(EXEC_API_VERSION.to_owned()),
            command: command.into(),
            args: Some(args),
            env: Some(Vec::new()),
            provide_cluster_info: Some(false),
            interactive_mode: Some(InteractiveMode::Never),
            other: Mapping::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub struct UserSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
    #[serde(flatten)]
    pub other: Mapping,
}

impl UserSpec {
    pub fn exec(exec: ExecConfig) -> Self {
        Self {
            exec: Some(exec),
            ..Self::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct User {
    pub name: String,
    pub user: UserSpec,
}
// endregion

// region: Common
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "v1")]
    V1,
}
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kind {
    #[default]
    Config,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(default)]
    pub kind: Kind,
    #[serde(rename = "apiVersion", default)]
    pub api_version: ApiVersion,
    #[serde(default = "empty_mapping", deserialize_with = "deserialize_null_as_empty_mapping")]
    pub preferences: YamlValue,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub clusters: Vec<Cluster>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub contexts: Vec<Context>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub users: Vec<User>,
    #[serde(default)]
    pub current_context: String,
    #[serde(flatten)]
    pub other: Mapping,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            kind: Kind::Config,
            api_version: ApiVersion::V1,
            preferences: empty_mapping(),
            clusters: Vec::new(),
            contexts: Vec::new(),
            users: Vec::new(),
            current_context: String::new(),
            other: Mapping::new(),
        }
    }
}

impl KubeConfig {
    /// Parses a kubeconfig. A blank document is an empty config.
    pub fn from_yaml(text: &str) -> anyhow::Result<KubeConfig> {
        if text.trim().is_empty() {
            return Ok(KubeConfig::default());
        }
        serde_yaml::from_str(text).context("Parsing kube config")
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("Serializing kube config")
    }

    /// Reads the kubeconfig at `path`, or `None` when nothing exists there yet.
    pub fn read_if_exists(path: impl AsRef<Path>) -> anyhow::Result<Option<KubeConfig>> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Reading kube config {}", path.display()))
            }
        };
        Self::from_yaml(&text)
            .with_context(|| format!("Loading kube config {}", path.display()))
            .map(Some)
    }
}

/// Replaces the file at `path` in one rename, so a failed write never leaves a
/// truncated kubeconfig behind. New files get `0o600`.
pub fn write_config(kc: &KubeConfig, path: &Path) -> anyhow::Result<()> {
    let text = kc.to_yaml()?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Creating temporary kube config in {}", dir.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("Writing kube config {}", path.display()))?;
    file.as_file()
        .sync_all()
        .with_context(|| format!("Writing kube config {}", path.display()))?;
    file.persist(path)
        .with_context(|| format!("Replacing kube config {}", path.display()))?;
    Ok(())
}
// endregion
