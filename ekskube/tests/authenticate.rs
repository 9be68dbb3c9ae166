use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ekskube::{
    direct, AuthRequest, Authenticator, CallerIdentity, Cancelled, ClusterDescriber,
    ClusterDescriptor, HelperStore, InteractiveMode, KubeConfig, RequestError, EXEC_API_VERSION,
};
use tokio_util::sync::CancellationToken;

const ARN: &str = "arn:aws:eks:us-east-1:123456789012:cluster/demo";
const ENDPOINT: &str = "https://ABCDEF.gr7.us-east-1.eks.amazonaws.com";

#[derive(Default)]
struct FakeCloud {
    describes: AtomicUsize,
    identities: AtomicUsize,
}

#[async_trait]
impl ClusterDescriber for FakeCloud {
    async fn describe_cluster(&self, name: &str) -> anyhow::Result<ClusterDescriptor> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        assert_eq!(name, "demo");
        Ok(ClusterDescriptor {
            arn: ARN.to_owned(),
            endpoint: ENDPOINT.to_owned(),
            ca_certificate: b"-----BEGIN CERTIFICATE-----\n".to_vec(),
        })
    }
}

#[async_trait]
impl CallerIdentity for FakeCloud {
    async fn caller_account(&self) -> anyhow::Result<String> {
        self.identities.fetch_add(1, Ordering::SeqCst);
        Ok("123456789012".to_owned())
    }
}

/// Never answers, so only cancellation can finish a call.
struct HangingCloud;

#[async_trait]
impl ClusterDescriber for HangingCloud {
    async fn describe_cluster(&self, _name: &str) -> anyhow::Result<ClusterDescriptor> {
        std::future::pending().await
    }
}

#[async_trait]
impl CallerIdentity for HangingCloud {
    async fn caller_account(&self) -> anyhow::Result<String> {
        std::future::pending().await
    }
}

/// Helper store with a pinned staging name that records copies instead of
/// touching the filesystem.
struct FakeHelpers {
    located: Option<PathBuf>,
    fail_copy: bool,
    copies: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeHelpers {
    fn found() -> Self {
        Self {
            located: Some(PathBuf::from("/usr/local/bin/aws-iam-authenticator")),
            fail_copy: false,
            copies: Mutex::new(Vec::new()),
        }
    }

    fn missing() -> Self {
        Self {
            located: None,
            ..Self::found()
        }
    }

    fn broken_copy() -> Self {
        Self {
            fail_copy: true,
            ..Self::found()
        }
    }
}

impl HelperStore for FakeHelpers {
    fn locate(&self, _name: &str) -> Option<PathBuf> {
        self.located.clone()
    }

    fn copy_executable(&self, src: &Path, dst: &Path) -> io::Result<()> {
        if self.fail_copy {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        self.copies
            .lock()
            .unwrap()
            .push((src.to_owned(), dst.to_owned()));
        Ok(())
    }

    fn staged_name(&self, name: &str) -> String {
        format!("{name}-pinned")
    }
}

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn kube_dir(&self) -> PathBuf {
        self.dir.path().join(".kube")
    }

    fn config_path(&self) -> PathBuf {
        self.kube_dir().join("config")
    }

    fn authenticator<H: HelperStore>(
        &self,
        helpers: H,
    ) -> Authenticator<FakeCloud, H> {
        Authenticator::new(self.config_path(), FakeCloud::default(), helpers)
    }

    fn read(&self) -> KubeConfig {
        KubeConfig::load_or_default(&self.config_path()).unwrap()
    }
}

fn exec_args(kc: &KubeConfig, user: &str) -> Vec<String> {
    kc.users[user].exec.as_ref().unwrap().args.clone().unwrap()
}

#[tokio::test]
async fn empty_name_fails_before_any_call() {
    let fixture = Fixture::new();
    let auth = fixture.authenticator(FakeHelpers::found());

    let err = auth
        .authenticate(&AuthRequest::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.downcast_ref::<RequestError>(), Some(&RequestError::EmptyName));
    assert_eq!(auth.cloud().describes.load(Ordering::SeqCst), 0);
    assert!(!fixture.kube_dir().exists());
}

#[tokio::test]
async fn conflicting_session_options_are_rejected() {
    let fixture = Fixture::new();
    let cloud = FakeCloud::default();
    let auth = Authenticator::new(fixture.config_path(), cloud, FakeHelpers::found());
    let request = AuthRequest {
        role_to_assume: Some("deploy".into()),
        role_session_name: Some("ci".into()),
        forward_session_name: true,
        ..AuthRequest::new("demo")
    };

    let err = auth
        .authenticate(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<RequestError>(),
        Some(&RequestError::ConflictingSessionName)
    );
    assert_eq!(auth.cloud().describes.load(Ordering::SeqCst), 0);
    assert_eq!(auth.cloud().identities.load(Ordering::SeqCst), 0);
    assert!(!fixture.config_path().exists());
}

#[tokio::test]
async fn fresh_config_gets_exactly_one_entry_each() {
    let fixture = Fixture::new();
    let helpers = FakeHelpers::found();
    let auth = fixture.authenticator(helpers);

    auth.authenticate(&AuthRequest::new("demo"), &CancellationToken::new())
        .await
        .unwrap();

    let kc = fixture.read();
    assert_eq!(kc.clusters.len(), 1);
    assert_eq!(kc.contexts.len(), 1);
    assert_eq!(kc.users.len(), 1);
    assert_eq!(kc.current_context, ARN);
    assert_eq!(kc.clusters[ARN].server, ENDPOINT);
    assert_eq!(kc.contexts[ARN].cluster, ARN);
    assert_eq!(kc.contexts[ARN].user, ARN);

    let exec = kc.users[ARN].exec.as_ref().unwrap();
    assert_eq!(exec.api_version.as_deref(), Some(EXEC_API_VERSION));
    assert_eq!(exec.interactive_mode, Some(InteractiveMode::Never));
    assert_eq!(
        PathBuf::from(&exec.command),
        fixture.kube_dir().join("aws-iam-authenticator-pinned")
    );
    assert_eq!(exec_args(&kc, ARN), ["token", "--cluster-id", "demo"]);
}

#[tokio::test]
async fn staged_copy_comes_from_located_helper() {
    let fixture = Fixture::new();
    let auth = fixture.authenticator(FakeHelpers::found());
    auth.authenticate(&AuthRequest::new("demo"), &CancellationToken::new())
        .await
        .unwrap();

    let copies = auth_copies(&auth);
    assert_eq!(
        copies,
        [(
            PathBuf::from("/usr/local/bin/aws-iam-authenticator"),
            fixture.kube_dir().join("aws-iam-authenticator-pinned")
        )]
    );
}

fn auth_copies(auth: &Authenticator<FakeCloud, FakeHelpers>) -> Vec<(PathBuf, PathBuf)> {
    auth.helpers().copies.lock().unwrap().clone()
}

#[tokio::test]
async fn existing_entries_survive_the_merge() {
    let fixture = Fixture::new();
    fs::create_dir_all(fixture.kube_dir()).unwrap();
    let existing = r#"apiVersion: v1
kind: Config
preferences: {}
clusters:
- cluster:
    certificate-authority-data: AAAA
    server: https://other:6443
    tls-server-name: other.internal
  name: other
contexts:
- context:
    cluster: other
    namespace: team-a
    user: other-user
  name: other
current-context: other
users:
- name: other-user
  user:
    token: secret-token
"#;
    fs::write(fixture.config_path(), existing).unwrap();
    let before: direct::KubeConfig = direct::KubeConfig::from_yaml(existing).unwrap();
    let before_yaml = |kc: &direct::KubeConfig| {
        (
            serde_yaml::to_string(&kc.clusters[0]).unwrap(),
            serde_yaml::to_string(&kc.contexts[0]).unwrap(),
            serde_yaml::to_string(&kc.users[0]).unwrap(),
        )
    };

    let auth = fixture.authenticator(FakeHelpers::found());
    let request = AuthRequest {
        context_alias: Some("demo".into()),
        user_alias: Some("demo-user".into()),
        ..AuthRequest::new("demo")
    };
    auth.authenticate(&request, &CancellationToken::new())
        .await
        .unwrap();

    let text = fs::read_to_string(fixture.config_path()).unwrap();
    let after = direct::KubeConfig::from_yaml(&text).unwrap();
    let other_cluster = after.clusters.iter().find(|c| c.name == "other").unwrap();
    let other_context = after.contexts.iter().find(|c| c.name == "other").unwrap();
    let other_user = after.users.iter().find(|u| u.name == "other-user").unwrap();
    assert_eq!(
        before_yaml(&before),
        (
            serde_yaml::to_string(other_cluster).unwrap(),
            serde_yaml::to_string(other_context).unwrap(),
            serde_yaml::to_string(other_user).unwrap(),
        )
    );

    let kc = KubeConfig::from(after);
    assert_eq!(kc.clusters.keys().collect::<Vec<_>>(), [ARN, "other"]);
    assert_eq!(kc.contexts.keys().collect::<Vec<_>>(), ["demo", "other"]);
    assert_eq!(kc.users.keys().collect::<Vec<_>>(), ["demo-user", "other-user"]);
    assert_eq!(kc.current_context, "demo");
    assert_eq!(kc.contexts["demo"].user, "demo-user");
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let fixture = Fixture::new();
    let auth = fixture.authenticator(FakeHelpers::found());
    let request = AuthRequest {
        role_to_assume: Some("deploy".into()),
        ..AuthRequest::new("demo")
    };

    auth.authenticate(&request, &CancellationToken::new())
        .await
        .unwrap();
    let first = fs::read_to_string(fixture.config_path()).unwrap();
    auth.authenticate(&request, &CancellationToken::new())
        .await
        .unwrap();
    let second = fs::read_to_string(fixture.config_path()).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn short_role_name_is_expanded() {
    let fixture = Fixture::new();
    let auth = fixture.authenticator(FakeHelpers::found());
    let request = AuthRequest {
        role_to_assume: Some("myrole".into()),
        ..AuthRequest::new("demo")
    };
    auth.authenticate(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(auth.cloud().identities.load(Ordering::SeqCst), 1);
    assert_eq!(
        exec_args(&fixture.read(), ARN),
        [
            "token",
            "--cluster-id",
            "demo",
            "--role",
            "arn:aws:iam::123456789012:role/myrole",
            "--session-name",
            "CloudBeesAutomations"
        ]
    );
}

#[tokio::test]
async fn forwarded_session_name_replaces_session_name() {
    let fixture = Fixture::new();
    let auth = fixture.authenticator(FakeHelpers::found());
    let role = "arn:aws:iam::210987654321:role/deploy";
    let request = AuthRequest {
        role_to_assume: Some(role.into()),
        forward_session_name: true,
        ..AuthRequest::new("demo")
    };
    auth.authenticate(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(auth.cloud().identities.load(Ordering::SeqCst), 0);
    let args = exec_args(&fixture.read(), ARN);
    assert_eq!(args[3..], ["--role", role, "--forward-session-name"]);
}

#[tokio::test]
async fn missing_helper_is_recorded_by_name() {
    let fixture = Fixture::new();
    let auth = fixture.authenticator(FakeHelpers::missing());
    auth.authenticate(&AuthRequest::new("demo"), &CancellationToken::new())
        .await
        .unwrap();

    let kc = fixture.read();
    assert_eq!(kc.users[ARN].exec.as_ref().unwrap().command, "aws-iam-authenticator");
}

#[tokio::test]
async fn failed_copy_keeps_located_path() {
    let fixture = Fixture::new();
    let auth = fixture.authenticator(FakeHelpers::broken_copy());
    auth.authenticate(&AuthRequest::new("demo"), &CancellationToken::new())
        .await
        .unwrap();

    let kc = fixture.read();
    assert_eq!(
        kc.users[ARN].exec.as_ref().unwrap().command,
        "/usr/local/bin/aws-iam-authenticator"
    );
}

#[tokio::test]
async fn unreadable_config_is_fatal() {
    let fixture = Fixture::new();
    fs::create_dir_all(fixture.config_path()).unwrap();
    let auth = fixture.authenticator(FakeHelpers::found());

    assert!(auth
        .authenticate(&AuthRequest::new("demo"), &CancellationToken::new())
        .await
        .is_err());
    assert_eq!(auth.cloud().describes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_aborts_pending_lookup() {
    let fixture = Fixture::new();
    let auth = Authenticator::new(fixture.config_path(), HangingCloud, FakeHelpers::found());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = auth
        .authenticate(&AuthRequest::new("demo"), &cancel)
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<Cancelled>().is_some());
    assert!(!fixture.config_path().exists());
}
