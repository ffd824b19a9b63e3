//! Quorum arithmetic over a [`ClusterStatus`]. No I/O.

use crate::types::ClusterStatus;

/// Members needed for a binding decision: `floor(n/2) + 1`
pub fn quorum_size(num_nodes: usize) -> usize {
    num_nodes / 2 + 1
}

pub fn has_quorum(status: &ClusterStatus) -> bool {
    status.num_nodes() >= quorum_size(status.num_nodes())
}

/// Quorum alone is not enough: mid-election there is no leader to act on it
pub fn can_make_decisions(status: &ClusterStatus) -> bool {
    has_quorum(status) && status.leader_id() > 0
}
