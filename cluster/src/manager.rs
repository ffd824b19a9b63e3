use crate::health::{ComponentHealth, HealthChecker, HealthReport};
use crate::kv::ReplicatedConfigStore;
use crate::link::ConsensusLink;
use crate::membership::MembershipControl;
use crate::mode::{resolve_mode, ConsensusMode};
use crate::quorum;
use crate::resolver::LeaderBackendResolver;
use crate::status::{StatusQuery, UNKNOWN_LEADER_ID, UNKNOWN_TERM};
use crate::transport::{Connector, PgConnector};
use crate::types::{BackendIndex, ClusterStatus, NodeId};
use parking_lot::RwLock;
use poolraft_common::{PoolSettings, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Consensus coordination for one pool process.
///
/// Owns the link to pgraft and every component built on it, and answers the
/// pool's leader/quorum questions. In heuristic mode the link stays down and
/// every accessor returns its "unknown" sentinel.
pub struct ConsensusManager {
    settings: RwLock<PoolSettings>,
    mode: RwLock<ConsensusMode>,
    connector: Arc<dyn Connector>,
    link: Arc<ConsensusLink>,
    status: StatusQuery,
    membership: MembershipControl,
    config_store: ReplicatedConfigStore,
    health: HealthChecker,
}

impl ConsensusManager {
    /// Credentials are bound to the link here; later reloads do not change them
    pub fn new(settings: PoolSettings, connector: Arc<dyn Connector>) -> Self {
        let link = Arc::new(ConsensusLink::new(
            connector.clone(),
            settings.credentials.clone(),
            settings.consensus.connect_timeout(),
        ));
        let status = StatusQuery::new(link.clone());

        Self {
            mode: RwLock::new(ConsensusMode::Heuristic),
            membership: MembershipControl::new(status.clone()),
            config_store: ReplicatedConfigStore::new(link.clone()),
            health: HealthChecker::new(status.clone()),
            settings: RwLock::new(settings),
            connector,
            link,
            status,
        }
    }

    /// Create a manager talking to PostgreSQL through sea-orm
    pub fn with_postgres(settings: PoolSettings) -> Self {
        Self::new(settings, Arc::new(PgConnector::new()))
    }

    /// Select the mode and, for pgraft mode, bring the link up.
    ///
    /// An unreachable service is returned as an error but leaves the manager
    /// usable (every accessor answers "unknown"); a missing extension is
    /// fatal and must stop the caller.
    pub async fn start(&self) -> Result<ConsensusMode> {
        let settings = self.settings.read().clone();
        let mode = resolve_mode(settings.consensus.enabled, settings.use_watchdog);
        *self.mode.write() = mode;

        info!("Starting consensus manager: mode={}", mode);

        if mode.is_consensus_backed() {
            self.connect(&settings).await?;
        }
        Ok(mode)
    }

    /// Apply new settings and re-evaluate the mode
    pub async fn reload(&self, settings: PoolSettings) -> Result<ConsensusMode> {
        let previous = self.settings.read().clone();
        let old_mode = self.mode();
        let new_mode = resolve_mode(settings.consensus.enabled, settings.use_watchdog);

        let endpoint_changed = previous.consensus.address != settings.consensus.address
            || previous.consensus.port != settings.consensus.port
            || previous.consensus.cluster_id != settings.consensus.cluster_id
            || previous.consensus.node_id != settings.consensus.node_id;

        *self.settings.write() = settings.clone();
        *self.mode.write() = new_mode;

        if old_mode != new_mode {
            info!("Consensus mode changed: {} -> {}", old_mode, new_mode);
        }

        match (old_mode.is_consensus_backed(), new_mode.is_consensus_backed()) {
            (true, false) => self.link.shutdown().await,
            (false, true) => self.connect(&settings).await?,
            (true, true) if endpoint_changed => {
                self.link.shutdown().await;
                self.connect(&settings).await?;
            }
            _ => {}
        }
        Ok(new_mode)
    }

    async fn connect(&self, settings: &PoolSettings) -> Result<()> {
        let consensus = &settings.consensus;
        let result = self
            .link
            .init(&consensus.cluster_id, consensus.node_id, &consensus.address, consensus.port)
            .await;

        if let Err(e) = &result {
            if e.is_fatal() {
                error!("pgraft consensus cannot start: {}", e);
            } else {
                warn!("pgraft consensus unavailable, answers will be unknown: {}", e);
            }
        }
        result
    }

    /// Release the consensus connection
    pub async fn shutdown(&self) {
        self.link.shutdown().await;
    }

    /// Mode chosen by the last `start` or `reload`
    pub fn mode(&self) -> ConsensusMode {
        *self.mode.read()
    }

    /// Current settings snapshot
    pub fn settings(&self) -> PoolSettings {
        self.settings.read().clone()
    }

    pub fn link(&self) -> &Arc<ConsensusLink> {
        &self.link
    }

    /// Read-only status queries over the link
    pub fn status_query(&self) -> &StatusQuery {
        &self.status
    }

    /// Leader-gated membership changes
    pub fn membership(&self) -> &MembershipControl {
        &self.membership
    }

    /// Replicated configuration values
    pub fn config_store(&self) -> &ReplicatedConfigStore {
        &self.config_store
    }

    pub fn health_checker(&self) -> &HealthChecker {
        &self.health
    }

    /// Consensus link is up and healthy
    pub async fn is_enabled(&self) -> bool {
        self.link.is_enabled().await
    }

    /// Whether this node is the consensus leader
    pub async fn is_leader(&self) -> bool {
        self.status.is_leader().await
    }

    /// Get the current leader node id
    pub async fn leader_id(&self) -> NodeId {
        self.status.leader_id().await
    }

    /// Get the current term
    pub async fn term(&self) -> i64 {
        self.status.term().await
    }

    /// Get the local Raft state label
    pub async fn state(&self) -> String {
        self.status.state().await
    }

    /// Fresh cluster status, if it can be read
    pub async fn cluster_status(&self) -> Option<ClusterStatus> {
        self.status.get_cluster_status().await
    }

    /// Whether the cluster holds a quorum
    pub async fn has_quorum(&self) -> bool {
        self.status.has_quorum().await
    }

    /// Whether the cluster can make binding decisions
    pub async fn can_make_decisions(&self) -> bool {
        self.status.can_make_decisions().await
    }

    /// Backend index of the current leader, probing the configured backends
    pub async fn leader_backend(&self) -> Option<BackendIndex> {
        let (backends, credentials, probe_timeout) = {
            let settings = self.settings.read();
            (
                settings.backends.clone(),
                settings.credentials.clone(),
                settings.consensus.probe_timeout(),
            )
        };

        let resolver = LeaderBackendResolver::new(self.connector.clone(), credentials, probe_timeout);
        resolver.find_leader_backend(&self.status, &backends).await
    }

    /// Read a replicated configuration value
    pub async fn get_config(&self, key: &str) -> Option<String> {
        self.config_store.get(key).await
    }

    /// Write a replicated configuration value
    pub async fn put_config(&self, key: &str, value: &str) -> bool {
        self.config_store.put(key, value).await
    }

    /// Add a member; only succeeds on the leader
    pub async fn add_node(&self, node_id: NodeId, address: &str, port: u16) -> bool {
        self.membership.add_node(node_id, address, port).await
    }

    /// Remove a member; only succeeds on the leader
    pub async fn remove_node(&self, node_id: NodeId) -> bool {
        self.membership.remove_node(node_id).await
    }

    /// Health of the consensus layer for the current mode
    pub async fn health(&self) -> HealthReport {
        let mode = self.mode();
        if !mode.is_consensus_backed() {
            return HealthReport::from_components(vec![ComponentHealth::healthy(
                "mode",
                "heuristic mode, consensus not in use",
            )]);
        }
        self.health.check().await
    }

    /// One consistent view built from a single status read
    pub async fn snapshot(&self) -> ClusterSnapshot {
        let mode = self.mode();
        let enabled = self.link.is_enabled().await;
        let status = self.status.get_cluster_status().await;
        let state = self.status.state().await;

        let snapshot = ClusterSnapshot {
            mode,
            enabled,
            leader_id: status.as_ref().map(|s| s.leader_id()).unwrap_or(UNKNOWN_LEADER_ID),
            term: status.as_ref().map(|s| s.current_term()).unwrap_or(UNKNOWN_TERM),
            state,
            has_quorum: status.as_ref().map(quorum::has_quorum).unwrap_or(false),
            can_make_decisions: status.as_ref().map(quorum::can_make_decisions).unwrap_or(false),
            status,
        };

        metrics::gauge!("poolraft_leader_id").set(snapshot.leader_id as f64);
        metrics::gauge!("poolraft_current_term").set(snapshot.term as f64);
        metrics::gauge!("poolraft_cluster_nodes")
            .set(snapshot.status.as_ref().map(|s| s.num_nodes()).unwrap_or(0) as f64);

        snapshot
    }
}

/// Point-in-time answers for the pool
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSnapshot {
    pub mode: ConsensusMode,
    pub enabled: bool,
    pub leader_id: NodeId,
    pub term: i64,
    pub state: String,
    pub has_quorum: bool,
    pub can_make_decisions: bool,
    pub status: Option<ClusterStatus>,
}
