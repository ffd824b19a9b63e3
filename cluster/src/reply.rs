//! Interpretation of pgraft replies. The only place where `t`/`f` and
//! decimal text become native values.

use crate::status::{UNKNOWN_LEADER_ID, UNKNOWN_TERM};
use crate::transport::TextRow;
use crate::types::{ClusterStatus, HostName, NodeInfo, NodeState, NodeId, StateLabel};
use poolraft_common::{ConsensusError, Result};
use std::str::FromStr;

pub fn parse_bool(field: &'static str, raw: &str) -> Result<bool> {
    match raw {
        "t" => Ok(true),
        "f" => Ok(false),
        other => Err(ConsensusError::malformed(field, other)),
    }
}

pub fn parse_int<T: FromStr>(field: &'static str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConsensusError::malformed(field, raw))
}

/// Leader id cell; NULL means no settled leader
pub fn parse_leader_id(raw: Option<&str>) -> Result<NodeId> {
    match raw {
        Some(raw) => parse_int("leader_id", raw),
        None => Ok(UNKNOWN_LEADER_ID),
    }
}

/// Term cell; NULL reads as term 0, negative terms are rejected
pub fn parse_term(raw: Option<&str>) -> Result<i64> {
    let Some(raw) = raw else {
        return Ok(UNKNOWN_TERM);
    };
    let term: i64 = parse_int("current_term", raw)?;
    if term < 0 {
        return Err(ConsensusError::malformed("current_term", raw));
    }
    Ok(term)
}

pub fn parse_hostname(raw: &str) -> Result<HostName> {
    HostName::try_new(raw).ok_or_else(|| {
        ConsensusError::malformed("hostname", format!("{} bytes", raw.len()))
    })
}

pub fn parse_state(raw: &str) -> StateLabel {
    StateLabel::truncated(raw)
}

/// Aggregate row of `pgraft_get_cluster_status()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStatus {
    pub current_term: i64,
    pub leader_id: NodeId,
    pub num_nodes: i64,
}

pub fn parse_aggregate(row: &TextRow) -> Result<AggregateStatus> {
    Ok(AggregateStatus {
        current_term: parse_term(row.get(0))?,
        leader_id: parse_leader_id(row.get(1))?,
        num_nodes: parse_int("num_nodes", row.require(2, "num_nodes")?)?,
    })
}

/// One row of `pgraft_get_nodes()`: node_id, hostname, port, is_leader
pub fn parse_node(row: &TextRow, aggregate: &AggregateStatus) -> Result<NodeInfo> {
    let node_id = parse_int("node_id", row.require(0, "node_id")?)?;
    let hostname = parse_hostname(row.require(1, "hostname")?)?;
    let port = parse_int::<u16>("port", row.require(2, "port")?)?;
    let is_leader = parse_bool("is_leader", row.require(3, "is_leader")?)?;

    // membership rows carry no role; infer it from the leader flag
    let state = if is_leader {
        NodeState::Leader
    } else if aggregate.leader_id > 0 {
        NodeState::Follower
    } else {
        NodeState::Unknown
    };

    Ok(NodeInfo {
        node_id,
        hostname,
        port,
        is_leader,
        state,
        term: aggregate.current_term,
    })
}

/// Merge both replies; any unreadable field rejects the whole status
pub fn parse_cluster_status(aggregate_rows: &[TextRow], node_rows: &[TextRow]) -> Result<ClusterStatus> {
    let aggregate = aggregate_rows
        .first()
        .ok_or_else(|| ConsensusError::query("pgraft_get_cluster_status() returned no rows"))
        .and_then(parse_aggregate)?;

    let nodes = node_rows
        .iter()
        .map(|row| parse_node(row, &aggregate))
        .collect::<Result<Vec<_>>>()?;

    if aggregate.num_nodes != nodes.len() as i64 {
        tracing::debug!(
            reported = aggregate.num_nodes,
            listed = nodes.len(),
            "Aggregate node count differs from membership list; using the list"
        );
    }

    Ok(ClusterStatus::new(aggregate.leader_id, aggregate.current_term, nodes))
}
