use crate::reply;
use crate::status::StatusQuery;
use crate::transport::{queries, SqlParam};
use crate::types::NodeId;
use poolraft_common::{ConsensusError, Result};
use tracing::{info, warn};

/// Leader-only membership changes.
///
/// Leadership is checked with its own round-trip just before the change is
/// sent, so it can be lost in between; pgraft re-validates on its side.
#[derive(Clone)]
pub struct MembershipControl {
    status: StatusQuery,
}

impl MembershipControl {
    pub fn new(status: StatusQuery) -> Self {
        Self { status }
    }

    pub async fn try_add_node(&self, node_id: NodeId, address: &str, port: u16) -> Result<bool> {
        self.ensure_leader("add nodes").await?;

        let params = [
            SqlParam::from(node_id),
            SqlParam::from(address),
            SqlParam::from(i32::from(port)),
        ];
        let added = self.mutate("add_node", queries::ADD_NODE, &params).await?;

        if added {
            info!("pgraft consensus: added node {} ({}:{})", node_id, address, port);
        }
        Ok(added)
    }

    /// Add a member; `false` when not leader, disabled, or refused by pgraft
    pub async fn add_node(&self, node_id: NodeId, address: &str, port: u16) -> bool {
        self.try_add_node(node_id, address, port)
            .await
            .unwrap_or_else(|e| report_failure("add node", &e))
    }

    pub async fn try_remove_node(&self, node_id: NodeId) -> Result<bool> {
        self.ensure_leader("remove nodes").await?;

        let removed = self
            .mutate("remove_node", queries::REMOVE_NODE, &[SqlParam::from(node_id)])
            .await?;

        if removed {
            info!("pgraft consensus: removed node {}", node_id);
        }
        Ok(removed)
    }

    pub async fn remove_node(&self, node_id: NodeId) -> bool {
        self.try_remove_node(node_id)
            .await
            .unwrap_or_else(|e| report_failure("remove node", &e))
    }

    async fn ensure_leader(&self, operation: &'static str) -> Result<()> {
        if !self.status.link().is_enabled().await {
            return Err(ConsensusError::Disabled);
        }
        if !self.status.is_leader().await {
            warn!("pgraft consensus: only leader can {}", operation);
            metrics::counter!("poolraft_membership_rejections_total").increment(1);
            return Err(ConsensusError::UnauthorizedMutation { operation });
        }
        Ok(())
    }

    async fn mutate(&self, field: &'static str, sql: &str, params: &[SqlParam]) -> Result<bool> {
        match self.status.link().query_scalar(sql, params).await? {
            Some(value) => reply::parse_bool(field, &value),
            None => Ok(false),
        }
    }
}

fn report_failure(what: &str, err: &ConsensusError) -> bool {
    match err {
        // already logged where the rejection happened
        ConsensusError::UnauthorizedMutation { .. } | ConsensusError::Disabled => {}
        other => warn!("pgraft consensus: {} failed: {}", what, other),
    }
    false
}
