pub mod health;
pub mod kv;
pub mod link;
pub mod manager;
pub mod membership;
pub mod mode;
pub mod quorum;
pub mod reply;
pub mod resolver;
pub mod status;
pub mod transport;
pub mod types;

pub use health::{HealthChecker, HealthReport, HealthStatus};
pub use kv::ReplicatedConfigStore;
pub use link::{ConsensusLink, LinkIdentity};
pub use manager::{ClusterSnapshot, ConsensusManager};
pub use membership::MembershipControl;
pub use mode::{resolve_mode, ConsensusMode};
pub use resolver::LeaderBackendResolver;
pub use status::StatusQuery;
pub use transport::{ConnectTarget, Connector, PgConnector, SqlParam, SqlSession, TextRow};
pub use types::*;

pub use poolraft_common::{BackendDescriptor, ConsensusError, Credentials, PoolSettings, Result};
