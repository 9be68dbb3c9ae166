use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use ekskube::{default_kubeconfig_path, AuthRequest, Authenticator, AwsCloud, Cancelled, SystemHelperStore};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Configures credentials for accessing EKS
///
/// Every option can also be given as an `INPUT_*` environment variable.
#[derive(Parser, Debug)]
#[command(name = "configure-eks-credentials", version)]
struct Args {
    /// The name of the cluster for which to create a kubeconfig entry
    #[arg(long, env = "INPUT_NAME", default_value_t)]
    name: String,

    /// Connect to a cluster in a region other than the default one
    #[arg(long, env = "INPUT_REGION")]
    region: Option<String>,

    /// To assume a role for cluster authentication, specify an IAM role ARN with this option
    #[arg(long, env = "INPUT_ROLE_TO_ASSUME")]
    role_to_assume: Option<String>,

    /// Session name to pass when assuming the IAM Role via `role-to-assume`
    #[arg(long, env = "INPUT_ROLE_SESSION_NAME")]
    role_session_name: Option<String>,

    /// External ID to pass when assuming the IAM Role via `role-to-assume`
    #[arg(long, env = "INPUT_ROLE_EXTERNAL_ID")]
    role_external_id: Option<String>,

    /// Enable mapping a federated sessions caller-specified-role-name attribute onto newly assumed sessions
    #[arg(
        long,
        env = "INPUT_FORWARD_SESSION_NAME",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    forward_session_name: bool,

    /// Alias for the cluster context name
    #[arg(long, env = "INPUT_ALIAS")]
    alias: Option<String>,

    /// Alias for the generated user name
    #[arg(long, env = "INPUT_USER_ALIAS")]
    user_alias: Option<String>,

    /// Kubeconfig to update [default: ~/.kube/config]
    #[arg(long, env = "INPUT_KUBECONFIG")]
    kubeconfig: Option<PathBuf>,
}

impl Args {
    fn into_request(self) -> AuthRequest {
        AuthRequest {
            cluster_name: self.name,
            region: self.region,
            role_to_assume: self.role_to_assume,
            role_session_name: self.role_session_name,
            role_external_id: self.role_external_id,
            forward_session_name: self.forward_session_name,
            context_alias: self.alias,
            user_alias: self.user_alias,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// First signal cancels in-flight AWS calls, the second exits right away.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Interrupted, cancelling. Interrupt again to exit immediately");
        cancel.cancel();
        shutdown_signal().await;
        std::process::exit(1);
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let kubeconfig = match args.kubeconfig.clone() {
        Some(path) => path,
        None => default_kubeconfig_path()?,
    };
    let request = args.into_request();
    // reject bad input before the credential chain goes to the network
    request.validate()?;

    let cloud = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Cancelled.into()),
        cloud = AwsCloud::load(request.region()) => cloud?,
    };

    Authenticator::new(kubeconfig, cloud, SystemHelperStore::new())
        .authenticate(&request, &cancel)
        .await
}
