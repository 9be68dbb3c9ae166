pub mod args;
pub mod authenticate;
pub mod clean;
pub mod cloud;
pub mod direct;
pub mod helper;
mod merge;
pub mod request;
pub mod role;

use std::path::PathBuf;

use anyhow::Context as _;

pub use authenticate::{Authenticator, Cancelled};
pub use clean::*;
pub use cloud::{AwsCloud, CallerIdentity, ClusterDescriber, ClusterDescriptor};
pub use helper::{HelperStore, SystemHelperStore, HELPER_BINARY};
pub use request::{AuthRequest, RequestError};

pub fn kube_dir() -> anyhow::Result<PathBuf> {
    let home = home::home_dir().context("Cannot determine the home directory")?;
    Ok(home.join(".kube"))
}

/// `~/.kube/config`
pub fn default_kubeconfig_path() -> anyhow::Result<PathBuf> {
    Ok(kube_dir()?.join("config"))
}
