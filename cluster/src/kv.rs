use crate::link::ConsensusLink;
use crate::reply;
use crate::transport::{queries, SqlParam};
use poolraft_common::{ConsensusError, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Key/value settings replicated through pgraft. Nothing is cached locally.
#[derive(Clone)]
pub struct ReplicatedConfigStore {
    link: Arc<ConsensusLink>,
}

impl ReplicatedConfigStore {
    pub fn new(link: Arc<ConsensusLink>) -> Self {
        Self { link }
    }

    pub async fn try_put(&self, key: &str, value: &str) -> Result<bool> {
        let params = [SqlParam::from(key), SqlParam::from(value)];
        match self.link.query_scalar(queries::KV_PUT, &params).await? {
            Some(stored) => reply::parse_bool("kv_put", &stored),
            None => Ok(false),
        }
    }

    pub async fn put(&self, key: &str, value: &str) -> bool {
        match self.try_put(key, value).await {
            Ok(stored) => {
                debug!(key, stored, "pgraft consensus: replicated config put");
                stored
            }
            Err(ConsensusError::Disabled) => false,
            Err(e) => {
                warn!(key, "pgraft consensus: replicated config put failed: {}", e);
                false
            }
        }
    }

    pub async fn try_get(&self, key: &str) -> Result<Option<String>> {
        self.link.query_scalar(queries::KV_GET, &[SqlParam::from(key)]).await
    }

    /// Current value, or `None` when absent, disabled, or on failure
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(ConsensusError::Disabled) => None,
            Err(e) => {
                warn!(key, "pgraft consensus: replicated config get failed: {}", e);
                None
            }
        }
    }
}
