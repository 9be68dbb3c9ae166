//! Finding `aws-iam-authenticator` and staging a private copy next to the kubeconfig.
//!
//! The staged copy keeps the generated config usable from processes (or
//! containers) that do not have the helper on their `PATH`.
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

pub const HELPER_BINARY: &str = "aws-iam-authenticator";

/// Filesystem and search-path operations needed to place the helper.
pub trait HelperStore {
    /// Looks `name` up on the search path.
    fn locate(&self, name: &str) -> Option<PathBuf>;

    /// Copies `src` to `dst` as a read-only executable.
    fn copy_executable(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// File name for a staged copy; unique per call.
    fn staged_name(&self, name: &str) -> String {
        format!("{name}-{}", Uuid::new_v4())
    }
}

/// [`HelperStore`] backed by `PATH` and the real filesystem.
#[derive(Debug, Clone, Default)]
pub struct SystemHelperStore {
    path: Option<OsString>,
}

impl SystemHelperStore {
    /// Searches the process `PATH`.
    pub fn new() -> Self {
        Self {
            path: std::env::var_os("PATH"),
        }
    }

    /// Searches an explicit `PATH`-style list instead.
    pub fn with_search_path(path: impl Into<OsString>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

impl HelperStore for SystemHelperStore {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let path = self.path.as_ref()?;
        std::env::split_paths(path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }

    fn copy_executable(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let mut source = fs::File::open(src)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o555);
        }
        let mut target = options.open(dst)?;
        io::copy(&mut source, &mut target)?;
        target.sync_all()
    }
}

/// Command path to record in the kubeconfig user entry.
///
/// Falls back to the bare binary name when the helper is not on the search
/// path, and to the located path when staging the copy fails. Neither is fatal.
pub fn resolve_helper_path<S>(store: &S, kube_dir: &Path) -> PathBuf
where
    S: HelperStore + ?Sized,
{
    let Some(located) = store.locate(HELPER_BINARY) else {
        warn!(
            "Cannot find helper binary {HELPER_BINARY} on the path. \
             Authentication will only work in containers that have this binary on the PATH"
        );
        return PathBuf::from(HELPER_BINARY);
    };
    debug!(path = %located.display(), "Found helper binary");

    let target = kube_dir.join(store.staged_name(HELPER_BINARY));
    match store.copy_executable(&located, &target) {
        Ok(()) => target,
        Err(e) => {
            warn!(
                "Cannot copy helper binary {HELPER_BINARY} to {}. \
                 Authentication will only work in containers that have this binary on the PATH: {e}",
                kube_dir.display()
            );
            located
        }
    }
}
