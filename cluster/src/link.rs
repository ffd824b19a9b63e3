use crate::transport::{queries, ConnectTarget, Connector, SqlParam, SqlSession, TextRow};
use crate::types::NodeId;
use parking_lot::RwLock;
use poolraft_common::{ConsensusError, Credentials, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Identity recorded by a successful [`ConsensusLink::init`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIdentity {
    pub cluster_id: String,
    pub local_node_id: NodeId,
    pub endpoint: String,
}

/// The pool's one connection to the consensus service.
///
/// Callers share it by reference (usually through an `Arc`). Statements run
/// one at a time: the session sits behind an async mutex held for the whole
/// request/response exchange.
pub struct ConsensusLink {
    connector: Arc<dyn Connector>,
    credentials: Credentials,
    connect_timeout: Duration,
    session: Mutex<Option<Box<dyn SqlSession>>>,
    identity: RwLock<Option<LinkIdentity>>,
}

impl ConsensusLink {
    pub fn new(connector: Arc<dyn Connector>, credentials: Credentials, connect_timeout: Duration) -> Self {
        Self {
            connector,
            credentials,
            connect_timeout,
            session: Mutex::new(None),
            identity: RwLock::new(None),
        }
    }

    /// Connect, verify the pgraft extension and run `pgraft_init()`.
    ///
    /// A second call while initialized succeeds without doing anything.
    /// Fails with [`ConsensusError::ServiceUnreachable`] when the connection
    /// cannot be opened and with the fatal [`ConsensusError::ExtensionAbsent`]
    /// when the extension is missing.
    pub async fn init(&self, cluster_id: &str, local_node_id: NodeId, address: &str, port: u16) -> Result<()> {
        let mut session = self.session.lock().await;

        if session.is_some() {
            info!("pgraft consensus already initialized");
            return Ok(());
        }

        let target = ConnectTarget::new(address, port, self.credentials.clone());
        let endpoint = target.endpoint();

        let mut conn = match self.connector.connect(&target, self.connect_timeout).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(endpoint = %endpoint, "pgraft consensus: failed to connect: {}", e);
                return Err(match e {
                    ConsensusError::ServiceUnreachable { .. } => e,
                    other => ConsensusError::ServiceUnreachable {
                        endpoint,
                        message: other.to_string(),
                    },
                });
            }
        };

        info!(endpoint = %endpoint, "pgraft consensus: connected to PostgreSQL");

        let extension_present = match conn.query(queries::EXTENSION_PRESENT, &[], 1).await {
            Ok(rows) => !rows.is_empty(),
            Err(e) => {
                warn!(endpoint = %endpoint, "pgraft consensus: extension check failed: {}", e);
                false
            }
        };

        if !extension_present {
            error!(endpoint = %endpoint, "pgraft consensus: pgraft extension not found");
            conn.close().await;
            return Err(ConsensusError::ExtensionAbsent { endpoint });
        }

        if let Err(e) = conn.query(queries::INIT, &[], 0).await {
            warn!(endpoint = %endpoint, "pgraft consensus: pgraft_init() returned: {}", e);
        }

        *self.identity.write() = Some(LinkIdentity {
            cluster_id: cluster_id.to_string(),
            local_node_id,
            endpoint,
        });
        *session = Some(conn);

        info!(cluster_id, node_id = local_node_id, "pgraft consensus: initialized successfully");
        Ok(())
    }

    /// Release the connection. Safe to call at any time, including before `init`.
    pub async fn shutdown(&self) {
        let taken = self.session.lock().await.take();
        if let Some(mut conn) = taken {
            conn.close().await;
        }
        *self.identity.write() = None;

        info!("pgraft consensus: shut down");
    }

    /// Initialized and the connection is still healthy.
    ///
    /// `false` means "unknown", never "not leader" or "no quorum".
    pub async fn is_enabled(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|conn| conn.is_healthy())
            .unwrap_or(false)
    }

    pub fn identity(&self) -> Option<LinkIdentity> {
        self.identity.read().clone()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Run one statement over the link
    pub async fn query(&self, sql: &str, params: &[SqlParam], columns: usize) -> Result<Vec<TextRow>> {
        let session = self.session.lock().await;

        let conn = match session.as_ref() {
            Some(conn) if conn.is_healthy() => conn,
            _ => return Err(ConsensusError::Disabled),
        };

        conn.query(sql, params, columns).await.map_err(|e| {
            warn!("pgraft consensus: query failed: {}", e);
            metrics::counter!("poolraft_query_failures_total").increment(1);
            e
        })
    }

    /// First column of the first row; `None` for no rows or NULL
    pub async fn query_scalar(&self, sql: &str, params: &[SqlParam]) -> Result<Option<String>> {
        let rows = self.query(sql, params, 1).await?;
        Ok(rows.first().and_then(|row| row.get(0)).map(str::to_string))
    }
}
