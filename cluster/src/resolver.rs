use crate::reply;
use crate::status::StatusQuery;
use crate::transport::{queries, ConnectTarget, Connector, SqlSession};
use crate::types::{BackendIndex, NodeId};
use poolraft_common::{BackendDescriptor, ConsensusError, Credentials, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Finds the backend whose pgraft node id matches the leader.
///
/// There is no mapping table between consensus node ids and backend
/// indexes, so each valid backend is probed in configuration order over a
/// short-lived connection until one reports the leader's node id. Probes run
/// one at a time, so at most one probe connection is open at any instant. If
/// several backends report the same node id the first one in configuration
/// order wins.
pub struct LeaderBackendResolver {
    connector: Arc<dyn Connector>,
    credentials: Credentials,
    probe_timeout: Duration,
}

impl LeaderBackendResolver {
    pub fn new(connector: Arc<dyn Connector>, credentials: Credentials, probe_timeout: Duration) -> Self {
        Self {
            connector,
            credentials,
            probe_timeout,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Ask the consensus service for the leader, then locate its backend
    pub async fn find_leader_backend(
        &self,
        status: &StatusQuery,
        backends: &[BackendDescriptor],
    ) -> Option<BackendIndex> {
        let leader_id = status.leader_id().await;
        self.resolve(leader_id, backends).await
    }

    /// Index of the backend reporting `leader_id`; no probes when `leader_id <= 0`
    pub async fn resolve(&self, leader_id: NodeId, backends: &[BackendDescriptor]) -> Option<BackendIndex> {
        if leader_id <= 0 {
            debug!("pgraft consensus: no valid leader_id ({})", leader_id);
            return None;
        }

        debug!("pgraft consensus: searching for backend with leader_id={}", leader_id);

        for (index, backend) in backends.iter().enumerate() {
            if !backend.valid {
                continue;
            }

            let node_id = match self.probe(index, backend).await {
                Ok(node_id) => node_id,
                Err(e) => {
                    debug!(backend = index, "pgraft consensus: probe failed: {}", e);
                    metrics::counter!("poolraft_leader_probes_total", "outcome" => "failed").increment(1);
                    continue;
                }
            };

            metrics::counter!("poolraft_leader_probes_total", "outcome" => "answered").increment(1);
            debug!("pgraft consensus: backend {} has node_id={}", index, node_id);

            if node_id == leader_id {
                info!(
                    "pgraft consensus: found leader at backend {} (pgraft node_id={})",
                    index, leader_id
                );
                return Some(index);
            }
        }

        warn!("pgraft consensus: could not find backend for leader_id={}", leader_id);
        None
    }

    /// Node id reported by one backend, bounded by the probe timeout
    async fn probe(&self, index: BackendIndex, backend: &BackendDescriptor) -> Result<NodeId> {
        let target = ConnectTarget::new(&backend.hostname, backend.port, self.credentials.clone());

        match tokio::time::timeout(self.probe_timeout, self.probe_node_id(&target)).await {
            Ok(result) => result,
            Err(_) => Err(ConsensusError::ProbeTimeout {
                index,
                endpoint: target.endpoint(),
                timeout: self.probe_timeout,
            }),
        }
    }

    async fn probe_node_id(&self, target: &ConnectTarget) -> Result<NodeId> {
        let mut conn = self.connector.connect(target, self.probe_timeout).await?;
        let node_id = read_node_id(&*conn).await;
        conn.close().await;
        node_id
    }
}

async fn read_node_id(conn: &dyn SqlSession) -> Result<NodeId> {
    let rows = conn.query(queries::LOCAL_NODE_ID, &[], 1).await?;
    let value = rows
        .first()
        .and_then(|row| row.get(0))
        .ok_or_else(|| ConsensusError::malformed("node_id", "no rows"))?;
    reply::parse_int("node_id", value)
}
