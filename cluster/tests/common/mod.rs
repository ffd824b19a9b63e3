//! Scripted in-memory stand-in for PostgreSQL nodes running pgraft.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use poolraft_cluster::transport::queries;
use poolraft_cluster::{ConnectTarget, Connector, SqlParam, SqlSession, TextRow};
use poolraft_common::{ConsensusError, Credentials, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What one fake PostgreSQL node answers
#[derive(Debug, Clone)]
pub struct FakeServer {
    pub reachable: bool,
    pub connect_delay: Option<Duration>,
    pub extension: bool,
    pub connection_lost: bool,
    pub is_leader: Option<String>,
    pub node_id: Option<String>,
    pub leader_id: Option<String>,
    pub current_term: Option<String>,
    pub num_nodes: Option<String>,
    pub state: Option<String>,
    pub worker_state: Option<String>,
    pub nodes: Vec<TextRow>,
    pub add_node_reply: Option<String>,
    pub remove_node_reply: Option<String>,
    pub kv_put_reply: Option<String>,
    pub kv: HashMap<String, String>,
    pub failing: HashSet<&'static str>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self {
            reachable: true,
            connect_delay: None,
            extension: true,
            connection_lost: false,
            is_leader: text("f"),
            node_id: text("1"),
            leader_id: text("1"),
            current_term: text("1"),
            num_nodes: text("0"),
            state: text("follower"),
            worker_state: text("RUNNING"),
            nodes: Vec::new(),
            add_node_reply: text("t"),
            remove_node_reply: text("t"),
            kv_put_reply: text("t"),
            kv: HashMap::new(),
            failing: HashSet::new(),
        }
    }
}

impl FakeServer {
    /// A backend that only answers probes with its own node id
    pub fn with_node_id(node_id: i32) -> Self {
        Self {
            node_id: text(&node_id.to_string()),
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::default()
        }
    }

    /// A three-node cluster where node 2 leads in term 7
    pub fn three_node_cluster() -> Self {
        Self {
            leader_id: text("2"),
            current_term: text("7"),
            num_nodes: text("3"),
            state: text("follower"),
            nodes: vec![
                node_row(1, "pg1", 5432, false),
                node_row(2, "pg2", 5432, true),
                node_row(3, "pg3", 5432, false),
            ],
            ..Self::default()
        }
    }

    fn answer(&mut self, sql: &str, params: &[SqlParam]) -> Result<Vec<TextRow>> {
        if self.failing.contains(sql) {
            return Err(ConsensusError::query(format!("ERROR: function failed: {}", sql)));
        }

        let single = |cell: &Option<String>| vec![TextRow(vec![cell.clone()])];

        let rows = match sql {
            queries::EXTENSION_PRESENT => {
                if self.extension {
                    vec![TextRow::new(vec![Some("1")])]
                } else {
                    Vec::new()
                }
            }
            queries::INIT => vec![TextRow::default()],
            queries::IS_LEADER => single(&self.is_leader),
            queries::CLUSTER_STATUS => vec![TextRow(vec![
                self.current_term.clone(),
                self.leader_id.clone(),
                self.num_nodes.clone(),
            ])],
            queries::LEADER_ID => single(&self.leader_id),
            queries::CURRENT_TERM => single(&self.current_term),
            queries::STATE => single(&self.state),
            queries::LOCAL_NODE_ID => single(&self.node_id),
            queries::NODES => self.nodes.clone(),
            queries::ADD_NODE => single(&self.add_node_reply),
            queries::REMOVE_NODE => single(&self.remove_node_reply),
            queries::KV_PUT => {
                if let [SqlParam::Text(key), SqlParam::Text(value)] = params {
                    if self.kv_put_reply.as_deref() == Some("t") {
                        self.kv.insert(key.clone(), value.clone());
                    }
                }
                single(&self.kv_put_reply)
            }
            queries::KV_GET => {
                let value = match params {
                    [SqlParam::Text(key)] => self.kv.get(key).cloned(),
                    _ => None,
                };
                vec![TextRow(vec![value])]
            }
            queries::WORKER_STATE => single(&self.worker_state),
            other => return Err(ConsensusError::query(format!("unexpected statement: {}", other))),
        };
        Ok(rows)
    }
}

pub fn text(value: &str) -> Option<String> {
    Some(value.to_string())
}

pub fn node_row(node_id: i32, hostname: &str, port: u16, is_leader: bool) -> TextRow {
    TextRow(vec![
        text(&node_id.to_string()),
        text(hostname),
        text(&port.to_string()),
        text(if is_leader { "t" } else { "f" }),
    ])
}

/// A statement as seen by a fake server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
    pub endpoint: String,
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// [`Connector`] over a set of fake servers keyed by `host:port`
#[derive(Default)]
pub struct FakeConnector {
    servers: Mutex<HashMap<String, Arc<Mutex<FakeServer>>>>,
    connects: Mutex<Vec<String>>,
    executed: Arc<Mutex<Vec<Executed>>>,
    open: Arc<AtomicUsize>,
    max_open: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_server(&self, host: &str, port: u16, server: FakeServer) -> Arc<Mutex<FakeServer>> {
        let server = Arc::new(Mutex::new(server));
        self.servers
            .lock()
            .insert(format!("{}:{}", host, port), server.clone());
        server
    }

    /// Endpoints of every connection attempt, in order
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().clone()
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.executed.lock().clone()
    }

    pub fn executed_sql(&self, sql: &str) -> Vec<Executed> {
        self.executed().into_iter().filter(|e| e.sql == sql).collect()
    }

    pub fn clear_log(&self) {
        self.executed.lock().clear();
        self.connects.lock().clear();
    }

    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn max_open_sessions(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, target: &ConnectTarget, _timeout: Duration) -> Result<Box<dyn SqlSession>> {
        let endpoint = target.endpoint();
        self.connects.lock().push(endpoint.clone());

        let server = self.servers.lock().get(&endpoint).cloned();
        let server = match server {
            Some(server) => server,
            None => {
                return Err(ConsensusError::ServiceUnreachable {
                    endpoint,
                    message: "no route to host".to_string(),
                })
            }
        };

        let (reachable, delay) = {
            let s = server.lock();
            (s.reachable, s.connect_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !reachable {
            return Err(ConsensusError::ServiceUnreachable {
                endpoint,
                message: "connection refused".to_string(),
            });
        }

        let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now_open, Ordering::SeqCst);

        Ok(Box::new(FakeSession {
            endpoint,
            server,
            executed: self.executed.clone(),
            open: self.open.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct FakeSession {
    endpoint: String,
    server: Arc<Mutex<FakeServer>>,
    executed: Arc<Mutex<Vec<Executed>>>,
    open: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl FakeSession {
    fn release(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl SqlSession for FakeSession {
    async fn query(&self, sql: &str, params: &[SqlParam], columns: usize) -> Result<Vec<TextRow>> {
        self.executed.lock().push(Executed {
            endpoint: self.endpoint.clone(),
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        let rows = self.server.lock().answer(sql, params)?;
        Ok(rows
            .into_iter()
            .map(|row| TextRow(row.0.into_iter().take(columns).collect()))
            .collect())
    }

    fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.server.lock().connection_lost
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.release();
    }
}

pub const CONSENSUS_HOST: &str = "consensus.local";
pub const CONSENSUS_PORT: u16 = 5432;

pub fn credentials() -> Credentials {
    Credentials {
        user: "repl_check".to_string(),
        password: None,
        database: "postgres".to_string(),
    }
}
