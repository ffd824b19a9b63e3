use serde::{Deserialize, Serialize};

/// Where leader and quorum decisions come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusMode {
    /// Watchdog heuristics (legacy failover)
    Heuristic,

    /// pgraft consensus service
    #[serde(rename = "pgraft")]
    ConsensusBacked,
}

impl ConsensusMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusMode::Heuristic => "heuristic",
            ConsensusMode::ConsensusBacked => "pgraft",
        }
    }

    pub fn is_consensus_backed(&self) -> bool {
        matches!(self, ConsensusMode::ConsensusBacked)
    }
}

impl std::fmt::Display for ConsensusMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsensusMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "heuristic" => Ok(ConsensusMode::Heuristic),
            "pgraft" => Ok(ConsensusMode::ConsensusBacked),
            other => Err(format!("unknown consensus mode: {}", other)),
        }
    }
}

/// Consensus needs both the consensus flag and a running watchdog
pub fn resolve_mode(consensus_flag: bool, watchdog_enabled: bool) -> ConsensusMode {
    if watchdog_enabled && consensus_flag {
        ConsensusMode::ConsensusBacked
    } else {
        ConsensusMode::Heuristic
    }
}
