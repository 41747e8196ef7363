//! 测试辅助工具模块
//! Test utilities module

#![cfg(test)]

use crate::client::{ClientHandle, DataValue, EndpointMetadata, NodeId, Session};
use crate::config::ClientConfiguration;
use crate::endpoint::EndpointUrl;
use crate::error::{Error, Result};
use crate::pool::ClientPool;
use crate::validator::ConnectionValidator;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::time::Instant;

pub const TEST_URL: &str = "opc.tcp://127.0.0.1:4840";

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "opcua_link=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// What the next `connect` call on a [`MockClient`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Succeed,
    Fail,
    /// Never completes.
    Hang,
}

/// What `read_value` on a [`MockClient`] does.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadBehavior {
    Value(DataValue),
    Empty,
    Fail,
    Hang,
}

/// A scriptable in-memory client.
pub struct MockClient {
    metadata: EndpointMetadata,
    connected: AtomicBool,
    session_usable: AtomicBool,
    /// Consumed front to back; `default_connect` applies once empty.
    connect_script: Mutex<VecDeque<ConnectBehavior>>,
    default_connect: Mutex<ConnectBehavior>,
    fail_disconnect: AtomicBool,
    read: Mutex<ReadBehavior>,
    read_delay: Mutex<Duration>,
    connect_times: Mutex<Vec<Instant>>,
    next_session: AtomicU64,
    pub disconnect_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self::for_configuration(&ClientConfiguration::new("mock"))
    }

    pub fn for_configuration(configuration: &ClientConfiguration) -> Self {
        Self {
            metadata: EndpointMetadata {
                endpoint_url: TEST_URL.to_string(),
                application_name: configuration.application_name.clone(),
                application_uri: configuration.application_uri.clone(),
                product_uri: configuration.product_uri.clone(),
            },
            connected: AtomicBool::new(false),
            session_usable: AtomicBool::new(true),
            connect_script: Mutex::new(VecDeque::new()),
            default_connect: Mutex::new(ConnectBehavior::Succeed),
            fail_disconnect: AtomicBool::new(false),
            read: Mutex::new(ReadBehavior::Value(DataValue::new(
                crate::client::Variant::Int32(0),
            ))),
            read_delay: Mutex::new(Duration::ZERO),
            connect_times: Mutex::new(Vec::new()),
            next_session: AtomicU64::new(1),
            disconnect_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
        }
    }

    pub fn script_connects(&self, behaviors: impl IntoIterator<Item = ConnectBehavior>) {
        self.connect_script.lock().unwrap().extend(behaviors);
    }

    pub fn set_default_connect(&self, behavior: ConnectBehavior) {
        *self.default_connect.lock().unwrap() = behavior;
    }

    pub fn set_read(&self, behavior: ReadBehavior) {
        *self.read.lock().unwrap() = behavior;
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    pub fn set_session_usable(&self, usable: bool) {
        self.session_usable.store(usable, Ordering::SeqCst);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_times.lock().unwrap().len()
    }

    /// Instants at which `connect` was entered.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.connect_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientHandle for MockClient {
    async fn connect(&self) -> Result<Session> {
        self.connect_times.lock().unwrap().push(Instant::now());
        let behavior = self
            .connect_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(*self.default_connect.lock().unwrap());
        match behavior {
            ConnectBehavior::Succeed => {
                self.connected.store(true, Ordering::SeqCst);
                let id = self.next_session.fetch_add(1, Ordering::SeqCst);
                Ok(Session {
                    session_id: format!("session-{id}"),
                })
            }
            ConnectBehavior::Fail => Err(Error::Client("connection refused".into())),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(Error::Client("close session failed".into()));
        }
        Ok(())
    }

    async fn read_value(&self, _node: &NodeId) -> Result<Option<DataValue>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let behavior = self.read.lock().unwrap().clone();
        match behavior {
            ReadBehavior::Value(value) => Ok(Some(value)),
            ReadBehavior::Empty => Ok(None),
            ReadBehavior::Fail => Err(Error::Client("bad read".into())),
            ReadBehavior::Hang => std::future::pending().await,
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_session_usable(&self) -> bool {
        self.session_usable.load(Ordering::SeqCst)
    }

    fn metadata(&self) -> EndpointMetadata {
        self.metadata.clone()
    }
}

/// A pool that always hands out the same client and audits checkouts.
pub struct MockPool {
    pub client: Arc<MockClient>,
    exhausted: AtomicBool,
    pub acquires: AtomicUsize,
    pub releases: AtomicUsize,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
    double_releases: AtomicUsize,
}

impl MockPool {
    /// A pool handing out a client built from `ClientConfiguration::new("plant")`.
    pub fn new() -> Arc<Self> {
        Self::for_configuration(&ClientConfiguration::new("plant"))
    }

    pub fn for_configuration(configuration: &ClientConfiguration) -> Arc<Self> {
        Arc::new(Self {
            client: Arc::new(MockClient::for_configuration(configuration)),
            exhausted: AtomicBool::new(false),
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            max_outstanding: AtomicUsize::new(0),
            double_releases: AtomicUsize::new(0),
        })
    }

    pub fn set_exhausted(&self, exhausted: bool) {
        self.exhausted.store(exhausted, Ordering::SeqCst);
    }

    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn double_releases(&self) -> usize {
        self.double_releases.load(Ordering::SeqCst)
    }
}

impl ClientPool for MockPool {
    type Client = MockClient;

    fn acquire(&self, _configuration: &ClientConfiguration) -> Option<Arc<MockClient>> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self.exhausted.load(Ordering::SeqCst) {
            return None;
        }
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(now, Ordering::SeqCst);
        Some(self.client.clone())
    }

    fn release(&self, _client: Arc<MockClient>) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        let released = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if released.is_err() {
            self.double_releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A validator whose answers are set by the test.
pub struct MockValidator {
    pub reachable: AtomicBool,
}

impl MockValidator {
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl ConnectionValidator for MockValidator {
    fn active_session(&self, client: &dyn ClientHandle) -> bool {
        client.is_session_usable()
    }

    async fn reachable_from_local_host(&self, _url: &EndpointUrl) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}
