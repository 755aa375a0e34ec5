use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bagstore_auth::AuthConfig;
use bagstore_sync::SyncConfig;
use bagstore_types::WorkerId;

use crate::error::{ServerError, ServerResult};

/// Default listening port of a storage node.
pub const DEFAULT_PORT: u16 = 3333;

/// Everything a storage node needs to start.
///
/// Loaded from TOML; the CLI overrides individual fields from flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Storage working group worker this node operates as.
    pub worker_id: WorkerId,
    /// Root of the content store.
    pub uploads_dir: PathBuf,
    pub bind_addr: SocketAddr,
    /// GraphQL endpoint of the query node. Without one, indexed state is
    /// read from the ledger snapshot.
    pub query_node_url: Option<String>,
    /// File holding the operator's hex-encoded Ed25519 seed.
    pub operator_key: Option<PathBuf>,
    /// TOML ledger fixture backing the development ledger.
    pub ledger_snapshot: Option<PathBuf>,
    /// Reject uploads that do not carry a valid `x-upload-token`.
    pub require_upload_token: bool,
    pub sync: SyncConfig,
    pub auth: AuthConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            worker_id: WorkerId(0),
            uploads_dir: PathBuf::from("./uploads"),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            query_node_url: None,
            operator_key: None,
            ledger_snapshot: None,
            require_upload_token: false,
            sync: SyncConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn from_toml_str(input: &str) -> ServerResult<Self> {
        toml::from_str(input).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }
}

/// GraphQL endpoint served by a query node reachable at `host`
/// (`host` or `host:port`).
pub fn query_node_url(host: &str) -> String {
    format!("http://{host}/graphql")
}
