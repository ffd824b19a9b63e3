mod common;

use common::*;
use poolraft_cluster::transport::queries;
use poolraft_cluster::{ConsensusLink, MembershipControl, SqlParam, StatusQuery};
use poolraft_common::ConsensusError;
use std::sync::Arc;
use std::time::Duration;

async fn membership(server: FakeServer) -> (Arc<FakeConnector>, MembershipControl) {
    let connector = FakeConnector::new();
    connector.add_server(CONSENSUS_HOST, CONSENSUS_PORT, server);
    let link = Arc::new(ConsensusLink::new(
        connector.clone(),
        credentials(),
        Duration::from_secs(1),
    ));
    link.init("pool-a", 1, CONSENSUS_HOST, CONSENSUS_PORT).await.unwrap();
    connector.clear_log();
    (connector, MembershipControl::new(StatusQuery::new(link)))
}

fn leader() -> FakeServer {
    FakeServer {
        is_leader: text("t"),
        ..FakeServer::three_node_cluster()
    }
}

#[tokio::test]
async fn test_follower_cannot_add_node() {
    let (connector, membership) = membership(FakeServer::three_node_cluster()).await;

    assert!(!membership.add_node(4, "10.0.0.14", 5432).await);
    assert!(connector.executed_sql(queries::ADD_NODE).is_empty());

    let err = membership.try_add_node(4, "10.0.0.14", 5432).await.unwrap_err();
    assert!(matches!(err, ConsensusError::UnauthorizedMutation { .. }));
    assert!(connector.executed_sql(queries::ADD_NODE).is_empty());
}

#[tokio::test]
async fn test_follower_cannot_remove_node() {
    let (connector, membership) = membership(FakeServer::three_node_cluster()).await;

    assert!(!membership.remove_node(3).await);
    assert!(connector.executed_sql(queries::REMOVE_NODE).is_empty());
}

#[tokio::test]
async fn test_unknown_leadership_rejects_mutation() {
    let server = FakeServer {
        failing: [queries::IS_LEADER].into_iter().collect(),
        ..FakeServer::three_node_cluster()
    };
    let (connector, membership) = membership(server).await;

    assert!(!membership.add_node(4, "10.0.0.14", 5432).await);
    assert!(connector.executed_sql(queries::ADD_NODE).is_empty());
}

#[tokio::test]
async fn test_leader_adds_node_with_bound_parameters() {
    let (connector, membership) = membership(leader()).await;

    assert!(membership.add_node(4, "10.0.0.14", 5433).await);

    let calls = connector.executed_sql(queries::ADD_NODE);
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].params,
        vec![
            SqlParam::Int(4),
            SqlParam::Text("10.0.0.14".to_string()),
            SqlParam::Int(5433)
        ]
    );

    // leadership is re-checked right before the change
    let sql: Vec<String> = connector.executed().into_iter().map(|e| e.sql).collect();
    assert_eq!(sql, vec![queries::IS_LEADER, queries::ADD_NODE]);
}

#[tokio::test]
async fn test_leader_removes_node() {
    let (connector, membership) = membership(leader()).await;

    assert!(membership.remove_node(3).await);
    let calls = connector.executed_sql(queries::REMOVE_NODE);
    assert_eq!(calls[0].params, vec![SqlParam::Int(3)]);
}

#[tokio::test]
async fn test_service_refusal_is_reported_as_failure() {
    let server = FakeServer {
        add_node_reply: text("f"),
        remove_node_reply: None,
        ..leader()
    };
    let (_connector, membership) = membership(server).await;

    assert!(!membership.add_node(4, "10.0.0.14", 5432).await);
    assert!(!membership.try_add_node(4, "10.0.0.14", 5432).await.unwrap());
    assert!(!membership.remove_node(3).await);
}

#[tokio::test]
async fn test_failed_mutation_does_not_raise() {
    let server = FakeServer {
        failing: [queries::ADD_NODE].into_iter().collect(),
        ..leader()
    };
    let (_connector, membership) = membership(server).await;

    assert!(!membership.add_node(4, "10.0.0.14", 5432).await);
    assert!(membership
        .try_add_node(4, "10.0.0.14", 5432)
        .await
        .unwrap_err()
        .is_query_failure());
}

#[tokio::test]
async fn test_disabled_link_issues_nothing() {
    let connector = FakeConnector::new();
    let link = Arc::new(ConsensusLink::new(
        connector.clone(),
        credentials(),
        Duration::from_secs(1),
    ));
    let membership = MembershipControl::new(StatusQuery::new(link));

    assert!(!membership.add_node(4, "10.0.0.14", 5432).await);
    assert!(!membership.remove_node(4).await);
    assert!(matches!(
        membership.try_remove_node(4).await,
        Err(ConsensusError::Disabled)
    ));
    assert!(connector.executed().is_empty());
}
