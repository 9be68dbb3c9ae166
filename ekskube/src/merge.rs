use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::clean::{ClusterSpec, ContextSpec, ExecConfig, KubeConfig, UserSpec};
use crate::cloud::ClusterDescriptor;

impl KubeConfig {
    /// Upserts the cluster (keyed by ARN) and a context pointing at it, then makes
    /// that context current. Other entries are left as they were.
    pub fn merge_cluster(&mut self, cluster: &ClusterDescriptor, context_name: &str, user_name: &str) {
        self.clusters.insert(
            cluster.arn.clone(),
            ClusterSpec {
                server: cluster.endpoint.clone(),
                certificate_authority_data: Some(STANDARD.encode(&cluster.ca_certificate)),
                certificate_authority: None,
                other: Default::default(),
            },
        );
        self.contexts.insert(
            context_name.to_owned(),
            ContextSpec::new(cluster.arn.as_str(), user_name),
        );
        self.current_context = context_name.to_owned();
    }

    /// Upserts a user that authenticates by running `command` with `args`.
    pub fn merge_exec_user(&mut self, user_name: &str, command: &Path, args: Vec<String>) {
        let exec = ExecConfig::never_interactive(command.to_string_lossy(), args);
        self.users.insert(user_name.to_owned(), UserSpec::exec(exec));
    }
}
