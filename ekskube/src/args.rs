use crate::request::AuthRequest;

/// Session name used when the role is assumed without an explicit one.
pub const DEFAULT_SESSION_NAME: &str = "CloudBeesAutomations";

/// Arguments for `aws-iam-authenticator`.
///
/// `role_arn` must already be fully qualified (see [`crate::role::qualify_role`]).
/// Without a role the helper authenticates as the ambient identity.
pub fn helper_args(request: &AuthRequest, role_arn: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "token".to_owned(),
        "--cluster-id".to_owned(),
        request.cluster_name.clone(),
    ];

    let Some(role_arn) = role_arn else {
        return args;
    };
    args.extend(["--role".to_owned(), role_arn.to_owned()]);

    // Gated on the session name rather than the external id itself.
    if request.session_name().is_some() {
        args.extend(["--external-id".to_owned(), request.external_id().to_owned()]);
    }

    if request.forward_session_name {
        args.push("--forward-session-name".to_owned());
    } else {
        let session_name = request.session_name().unwrap_or(DEFAULT_SESSION_NAME);
        args.extend(["--session-name".to_owned(), session_name.to_owned()]);
    }

    args
}
