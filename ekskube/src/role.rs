use anyhow::Context as _;

use crate::cloud::CallerIdentity;

const ARN_PREFIX: &str = "arn:aws";

/// Whether `role` is already an ARN.
///
/// Only the `aws` partition prefix is checked, so short names are always
/// expanded into that partition. Roles in `aws-cn` or `aws-us-gov` have to be
/// passed as full ARNs.
pub fn is_qualified(role: &str) -> bool {
    role.starts_with(ARN_PREFIX)
}

pub fn role_arn(account: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account}:role/{role_name}")
}

/// Expands a bare role name into an ARN in the caller's account.
pub async fn qualify_role<I>(role: &str, identity: &I) -> anyhow::Result<String>
where
    I: CallerIdentity + Sync + ?Sized,
{
    if is_qualified(role) {
        return Ok(role.to_owned());
    }
    let account = identity
        .caller_account()
        .await
        .with_context(|| format!("expanding role name {role}"))?;
    Ok(role_arn(&account, role))
}
