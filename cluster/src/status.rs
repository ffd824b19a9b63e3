use crate::link::ConsensusLink;
use crate::quorum;
use crate::reply;
use crate::transport::queries;
use crate::types::{ClusterStatus, NodeId, NodeState};
use poolraft_common::{ConsensusError, Result};
use std::sync::Arc;
use tracing::warn;

/// Sentinel returned by [`StatusQuery::leader_id`] when the leader is unknown
pub const UNKNOWN_LEADER_ID: NodeId = -1;

/// Sentinel returned by [`StatusQuery::term`] when the term is unknown
pub const UNKNOWN_TERM: i64 = 0;

pub const STATE_DISABLED: &str = "disabled";
pub const STATE_UNKNOWN: &str = "unknown";

/// Worker state reported by a running pgraft background worker
pub const WORKER_RUNNING: &str = "RUNNING";

/// Read-only queries against the consensus service.
///
/// The `fetch_*` methods return errors; the plain accessors fold every error
/// into a sentinel (`false`, `-1`, `0`, `"disabled"`/`"unknown"`).
#[derive(Clone)]
pub struct StatusQuery {
    link: Arc<ConsensusLink>,
}

impl StatusQuery {
    pub fn new(link: Arc<ConsensusLink>) -> Self {
        Self { link }
    }

    /// Link the queries run over
    pub fn link(&self) -> &Arc<ConsensusLink> {
        &self.link
    }

    /// Aggregate status plus membership list in one fresh read
    pub async fn fetch_cluster_status(&self) -> Result<ClusterStatus> {
        let aggregate = self.link.query(queries::CLUSTER_STATUS, &[], 3).await?;
        let nodes = self.link.query(queries::NODES, &[], 4).await?;
        reply::parse_cluster_status(&aggregate, &nodes)
    }

    /// Fresh status, or `None` when the link is disabled or any field fails to parse
    pub async fn get_cluster_status(&self) -> Option<ClusterStatus> {
        match self.fetch_cluster_status().await {
            Ok(status) => Some(status),
            Err(ConsensusError::Disabled) => None,
            Err(e) => {
                warn!("pgraft consensus: could not read cluster status: {}", e);
                None
            }
        }
    }

    /// Whether this node leads; errors when it cannot be told
    pub async fn fetch_is_leader(&self) -> Result<bool> {
        let value = self.link.query_scalar(queries::IS_LEADER, &[]).await?;
        let value = value.ok_or_else(|| ConsensusError::malformed("is_leader", "NULL"))?;
        reply::parse_bool("is_leader", &value)
    }

    /// Whether this node leads; `false` when unknown
    pub async fn is_leader(&self) -> bool {
        self.fetch_is_leader()
            .await
            .map_err(|e| log_unknown("is_leader", &e))
            .unwrap_or(false)
    }

    /// Current leader id; `-1` when pgraft reports none
    pub async fn fetch_leader_id(&self) -> Result<NodeId> {
        let value = self.link.query_scalar(queries::LEADER_ID, &[]).await?;
        reply::parse_leader_id(value.as_deref())
    }

    /// Current leader id; `-1` when unknown
    pub async fn leader_id(&self) -> NodeId {
        self.fetch_leader_id()
            .await
            .map_err(|e| log_unknown("leader_id", &e))
            .unwrap_or(UNKNOWN_LEADER_ID)
    }

    /// Current term; NULL reads as `0`, negative terms are malformed
    pub async fn fetch_term(&self) -> Result<i64> {
        let value = self.link.query_scalar(queries::CURRENT_TERM, &[]).await?;
        reply::parse_term(value.as_deref())
    }

    /// Current term; `0` when unknown
    pub async fn term(&self) -> i64 {
        self.fetch_term()
            .await
            .map_err(|e| log_unknown("current_term", &e))
            .unwrap_or(UNKNOWN_TERM)
    }

    /// Local Raft state label, truncated to its bound
    pub async fn fetch_state(&self) -> Result<String> {
        match self.link.query_scalar(queries::STATE, &[]).await? {
            Some(value) => Ok(reply::parse_state(&value).as_str().to_string()),
            None => Ok(STATE_UNKNOWN.to_string()),
        }
    }

    /// Raft state label; `"disabled"` without a link, `"unknown"` on failure
    pub async fn state(&self) -> String {
        match self.fetch_state().await {
            Ok(state) => state,
            Err(ConsensusError::Disabled) => STATE_DISABLED.to_string(),
            Err(e) => {
                log_unknown("state", &e);
                STATE_UNKNOWN.to_string()
            }
        }
    }

    /// This node is a candidate in an ongoing election
    pub async fn election_in_progress(&self) -> bool {
        match self.fetch_state().await {
            Ok(state) => NodeState::from_label(&state) == NodeState::Candidate,
            Err(e) => {
                log_unknown("state", &e);
                false
            }
        }
    }

    /// Raw state of the pgraft background worker
    pub async fn fetch_worker_state(&self) -> Result<Option<String>> {
        self.link.query_scalar(queries::WORKER_STATE, &[]).await
    }

    /// The pgraft background worker reports `RUNNING`
    pub async fn is_healthy(&self) -> bool {
        match self.fetch_worker_state().await {
            Ok(state) => state.as_deref() == Some(WORKER_RUNNING),
            Err(e) => {
                log_unknown("worker_state", &e);
                false
            }
        }
    }

    /// Fresh status holds a majority of members
    pub async fn has_quorum(&self) -> bool {
        self.get_cluster_status()
            .await
            .map(|status| quorum::has_quorum(&status))
            .unwrap_or(false)
    }

    /// Quorum size of a fresh status; 0 when unknown
    pub async fn quorum_size(&self) -> usize {
        self.get_cluster_status()
            .await
            .map(|status| status.quorum_size())
            .unwrap_or(0)
    }

    /// Fresh status has both a quorum and a settled leader
    pub async fn can_make_decisions(&self) -> bool {
        self.get_cluster_status()
            .await
            .map(|status| quorum::can_make_decisions(&status))
            .unwrap_or(false)
    }
}

fn log_unknown(what: &str, err: &ConsensusError) {
    if !matches!(err, ConsensusError::Disabled) {
        warn!("pgraft consensus: {} unknown: {}", what, err);
    }
}
