use crate::quorum;
use serde::{Serialize, Serializer};

/// Consensus-layer node identifier (not a backend index)
pub type NodeId = i32;

/// Index into the pool's backend list
pub type BackendIndex = usize;

/// Longest hostname accepted from the consensus service
pub const MAX_HOSTNAME_LEN: usize = 255;

/// Longest state label kept from the consensus service
pub const MAX_STATE_LEN: usize = 31;

pub type HostName = BoundedString<MAX_HOSTNAME_LEN>;
pub type StateLabel = BoundedString<MAX_STATE_LEN>;

/// Owned string of at most `N` bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundedString<const N: usize>(String);

impl<const N: usize> BoundedString<N> {
    /// `None` when `value` is longer than `N` bytes
    pub fn try_new(value: &str) -> Option<Self> {
        (value.len() <= N).then(|| Self(value.to_string()))
    }

    /// Cut to `N` bytes at the last char boundary that fits
    pub fn truncated(value: &str) -> Self {
        let mut end = value.len().min(N);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        Self(value[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub const fn capacity() -> usize {
        N
    }
}

impl<const N: usize> std::fmt::Display for BoundedString<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> AsRef<str> for BoundedString<N> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<const N: usize> Serialize for BoundedString<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Raft role of a node as reported by pgraft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Leader,
    Follower,
    Candidate,
    Unknown,
}

impl NodeState {
    pub fn from_label(label: &str) -> Self {
        match label {
            "leader" => NodeState::Leader,
            "follower" => NodeState::Follower,
            "candidate" => NodeState::Candidate,
            _ => NodeState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Leader => "leader",
            NodeState::Follower => "follower",
            NodeState::Candidate => "candidate",
            NodeState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member of the consensus cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub node_id: NodeId,
    pub hostname: HostName,
    /// PostgreSQL port
    pub port: u16,
    pub is_leader: bool,
    pub state: NodeState,
    pub term: i64,
}

/// Snapshot of the consensus cluster.
///
/// Built once per query and never mutated afterwards. `num_nodes` always
/// equals the membership list length, and the quorum fields are derived from
/// it at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterStatus {
    num_nodes: usize,
    leader_id: NodeId,
    current_term: i64,
    quorum_size: usize,
    has_quorum: bool,
    nodes: Vec<NodeInfo>,
}

impl ClusterStatus {
    pub fn new(leader_id: NodeId, current_term: i64, nodes: Vec<NodeInfo>) -> Self {
        let num_nodes = nodes.len();
        let quorum_size = quorum::quorum_size(num_nodes);
        Self {
            num_nodes,
            leader_id,
            current_term,
            quorum_size,
            has_quorum: num_nodes >= quorum_size,
            nodes,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Leader node id; zero or negative means no settled leader
    pub fn leader_id(&self) -> NodeId {
        self.leader_id
    }

    pub fn current_term(&self) -> i64 {
        self.current_term
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    pub fn has_quorum(&self) -> bool {
        self.has_quorum
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn has_leader(&self) -> bool {
        self.leader_id > 0
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&NodeInfo> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn leader_info(&self) -> Option<&NodeInfo> {
        if !self.has_leader() {
            return None;
        }
        self.get_node(self.leader_id)
    }
}
