use crate::quorum;
use crate::status::{StatusQuery, WORKER_RUNNING};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: Some(message.into()),
        }
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: u64,
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    /// Worst component status wins
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let status = components
            .iter()
            .map(|c| c.status)
            .fold(HealthStatus::Healthy, |acc, s| match (acc, s) {
                (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
                (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
                _ => HealthStatus::Healthy,
            });

        Self {
            status,
            timestamp: current_timestamp(),
            components,
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Health of the consensus link and the pgraft worker behind it
#[derive(Clone)]
pub struct HealthChecker {
    status: StatusQuery,
}

impl HealthChecker {
    pub fn new(status: StatusQuery) -> Self {
        Self { status }
    }

    /// The pgraft worker reports `RUNNING`
    pub async fn is_healthy(&self) -> bool {
        self.status.is_healthy().await
    }

    pub async fn check(&self) -> HealthReport {
        let mut components = Vec::new();

        if !self.status.link().is_enabled().await {
            components.push(ComponentHealth::unhealthy("link", "consensus link is not enabled"));
            return HealthReport::from_components(components);
        }
        components.push(ComponentHealth::healthy("link", "connected"));

        match self.status.fetch_worker_state().await {
            Ok(Some(state)) if state == WORKER_RUNNING => {
                components.push(ComponentHealth::healthy("worker", state));
            }
            Ok(Some(state)) => {
                components.push(ComponentHealth::degraded("worker", format!("worker state {}", state)));
            }
            Ok(None) => {
                components.push(ComponentHealth::degraded("worker", "worker state not reported"));
            }
            Err(e) => {
                components.push(ComponentHealth::degraded("worker", e.to_string()));
            }
        }

        match self.status.get_cluster_status().await {
            Some(status) if quorum::can_make_decisions(&status) => {
                components.push(ComponentHealth::healthy(
                    "cluster",
                    format!(
                        "leader {} in term {}, {} nodes (quorum {})",
                        status.leader_id(),
                        status.current_term(),
                        status.num_nodes(),
                        status.quorum_size()
                    ),
                ));
            }
            Some(status) if !status.has_leader() => {
                components.push(ComponentHealth::degraded(
                    "cluster",
                    format!("no leader in term {}", status.current_term()),
                ));
            }
            Some(status) => {
                components.push(ComponentHealth::degraded(
                    "cluster",
                    format!("{} nodes, quorum {} not met", status.num_nodes(), status.quorum_size()),
                ));
            }
            None => {
                components.push(ComponentHealth::degraded("cluster", "cluster status unavailable"));
            }
        }

        HealthReport::from_components(components)
    }
}
