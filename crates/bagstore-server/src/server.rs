use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use bagstore_auth::TokenService;
use bagstore_crypto::SigningKey;
use bagstore_ledger::{
    Indexer, LedgerGateway, LedgerSnapshot, QueryNodeClient, DEFAULT_MAX_DATA_OBJECT_SIZE,
};
use bagstore_store::{ContentStore, FsContentStore};
use bagstore_sync::{HttpPeerTransport, IntervalTicker, PeerTransport, Synchronizer};
use bagstore_types::{Clock, SystemClock};

use crate::admission::{AdmissionService, OperatorIdentity};
use crate::config::NodeConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::{build_router, AppState};

/// A storage node: HTTP admission surface plus the background synchronizer.
pub struct StorageNode {
    config: NodeConfig,
    ledger: Arc<dyn LedgerGateway>,
    indexer: Arc<dyn Indexer>,
    store: Arc<dyn ContentStore>,
    transport: Option<Arc<dyn PeerTransport>>,
    signing_key: Option<Arc<SigningKey>>,
    clock: Arc<dyn Clock>,
}

impl StorageNode {
    pub fn new(
        config: NodeConfig,
        ledger: Arc<dyn LedgerGateway>,
        indexer: Arc<dyn Indexer>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            config,
            ledger,
            indexer,
            store,
            transport: None,
            signing_key: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Assemble a node from configuration: a filesystem store under
    /// `uploads_dir`, the snapshot-backed ledger, and the query node as
    /// indexer when one is configured.
    pub async fn from_config(config: NodeConfig) -> ServerResult<Self> {
        let snapshot = config.ledger_snapshot.as_ref().ok_or_else(|| {
            ServerError::Config("ledger_snapshot is required to back the ledger gateway".into())
        })?;
        let ledger = Arc::new(LedgerSnapshot::load(snapshot)?.into_ledger());
        let indexer: Arc<dyn Indexer> = match &config.query_node_url {
            Some(url) => {
                info!(url = %url, "using query node indexer");
                Arc::new(QueryNodeClient::new(url.clone())?)
            }
            None => ledger.clone(),
        };
        let store = FsContentStore::open(config.uploads_dir.clone()).await?;
        let signing_key = match &config.operator_key {
            Some(path) => Some(Arc::new(load_signing_key(path)?)),
            None => {
                warn!("no operator key configured: uploads cannot be accepted and tokens cannot be issued");
                None
            }
        };

        let mut node = Self::new(config, ledger, indexer, Arc::new(store));
        node.signing_key = signing_key;
        Ok(node)
    }

    pub fn with_signing_key(mut self, key: Arc<SigningKey>) -> Self {
        self.signing_key = Some(key);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the HTTP peer transport used by the synchronizer.
    pub fn with_transport(mut self, transport: Arc<dyn PeerTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Wire services together. The synchronizer is only built when sync is
    /// enabled; it is returned unstarted.
    pub async fn build(&self) -> ServerResult<(Router, Option<Arc<Synchronizer>>)> {
        let max_object_size = match self.ledger.max_data_object_size().await {
            Ok(size) => size,
            Err(e) => {
                warn!(error = %e, "could not read max object size, using default");
                DEFAULT_MAX_DATA_OBJECT_SIZE
            }
        };

        let tokens = TokenService::new(
            Arc::clone(&self.ledger),
            self.signing_key.clone(),
            Arc::clone(&self.clock),
            self.config.auth.clone(),
        );
        let admission = AdmissionService::new(
            OperatorIdentity::new(self.config.worker_id, self.signing_key.clone()),
            Arc::clone(&self.ledger),
            Arc::clone(&self.store),
            Arc::new(tokens),
        )
        .require_upload_token(self.config.require_upload_token);

        let sync = if self.config.sync.enabled {
            let transport = match &self.transport {
                Some(transport) => Arc::clone(transport),
                None => Arc::new(HttpPeerTransport::new(self.config.sync.task_timeout())?),
            };
            let synchronizer = Synchronizer::new(
                self.config.worker_id,
                &self.config.sync,
                Arc::clone(&self.ledger),
                Arc::clone(&self.indexer),
                Arc::clone(&self.store),
                transport,
            )
            .with_clock(Arc::clone(&self.clock));
            Some(Arc::new(synchronizer))
        } else {
            None
        };

        let state = AppState {
            admission: Arc::new(admission),
            store: Arc::clone(&self.store),
            sync: sync.clone(),
        };
        Ok((build_router(state, max_object_size), sync))
    }

    /// Serve until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(ctrl_c()).await
    }

    /// Serve until `signal` resolves, then drain HTTP connections and stop
    /// the synchronizer.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (router, sync) = self.build().await?;
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(
            addr = %listener.local_addr()?,
            worker = %self.config.worker_id,
            sync = self.config.sync.enabled,
            "storage node listening"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);

        let sync_task = sync.map(|synchronizer| {
            let ticker = IntervalTicker::new(self.config.sync.interval());
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move { synchronizer.run(ticker, shutdown).await })
        });

        let trigger = Arc::clone(&shutdown_tx);
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                signal.await;
                info!("shutdown requested");
                trigger.send_replace(true);
            })
            .await;

        shutdown_tx.send_replace(true);
        if let Some(task) = sync_task {
            if let Err(e) = task.await {
                error!(error = %e, "synchronizer task panicked");
            }
        }
        served?;
        info!("storage node stopped");
        Ok(())
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
}

/// Read an operator key file holding a hex-encoded Ed25519 seed.
pub fn load_signing_key(path: impl AsRef<Path>) -> ServerResult<SigningKey> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ServerError::OperatorKey(format!("{}: {e}", path.display())))?;
    SigningKey::from_hex(text.trim())
        .map_err(|e| ServerError::OperatorKey(format!("{}: {e}", path.display())))
}
