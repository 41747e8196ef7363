//! tests/common/harness.rs
use async_trait::async_trait;
use opcua_link::client::{ClientHandle, DataValue, EndpointMetadata, NodeId, Session, Variant};
use opcua_link::config::{ClientConfiguration, Config, StaticConfigurationLoader};
use opcua_link::pool::{ClientFactory, KeyedClientPool};
use opcua_link::{ConnectionManager, Error, Result};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, Once,
};

pub const ENDPOINT: &str = "opc.tcp://127.0.0.1:4840";
pub const CONFIG_FILE: &str = "plant-client.json";

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "opcua_link=debug,lifecycle=info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// An in-memory endpoint that can be taken offline and brought back.
#[derive(Default)]
pub struct SimulatedServer {
    online: AtomicBool,
    next_session: AtomicU64,
    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
}

impl SimulatedServer {
    pub fn new() -> Arc<Self> {
        let server = Self::default();
        server.online.store(true, Ordering::SeqCst);
        Arc::new(server)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// A client talking to a [`SimulatedServer`].
pub struct SimulatedClient {
    server: Arc<SimulatedServer>,
    metadata: EndpointMetadata,
    connected: AtomicBool,
}

#[async_trait]
impl ClientHandle for SimulatedClient {
    async fn connect(&self) -> Result<Session> {
        if !self.server.is_online() {
            return Err(Error::Client("endpoint refused the connection".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        self.server.sessions_opened.fetch_add(1, Ordering::SeqCst);
        let id = self.server.next_session.fetch_add(1, Ordering::SeqCst);
        Ok(Session {
            session_id: format!("sim-{id}"),
        })
    }

    async fn disconnect(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.server.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn read_value(&self, _node: &NodeId) -> Result<Option<DataValue>> {
        if !self.server.is_online() {
            return Err(Error::Client("endpoint went away".into()));
        }
        // ServerState.Running
        Ok(Some(DataValue::new(Variant::Int32(0))))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn metadata(&self) -> EndpointMetadata {
        self.metadata.clone()
    }
}

/// Creates [`SimulatedClient`]s bound to one server and counts them.
pub struct SimulatedFactory {
    server: Arc<SimulatedServer>,
    pub created: AtomicUsize,
}

impl ClientFactory for SimulatedFactory {
    type Client = SimulatedClient;

    fn create(&self, configuration: &ClientConfiguration) -> Result<SimulatedClient> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedClient {
            server: self.server.clone(),
            metadata: EndpointMetadata {
                endpoint_url: ENDPOINT.to_string(),
                application_name: configuration.application_name.clone(),
                application_uri: configuration.application_uri.clone(),
                product_uri: configuration.product_uri.clone(),
            },
            connected: AtomicBool::new(false),
        })
    }
}

pub type SimPool = Arc<KeyedClientPool<SimulatedFactory>>;

/// A test harness wiring a manager to a keyed pool of simulated clients.
pub struct TestHarness {
    pub server: Arc<SimulatedServer>,
    pub pool: SimPool,
    pub loader: StaticConfigurationLoader,
}

impl TestHarness {
    pub fn new(max_per_key: usize) -> Self {
        init_tracing();
        let server = SimulatedServer::new();
        let factory = SimulatedFactory {
            server: server.clone(),
            created: AtomicUsize::new(0),
        };
        let loader = StaticConfigurationLoader::new()
            .with(CONFIG_FILE, ClientConfiguration::new("plant"));
        Self {
            server,
            pool: Arc::new(KeyedClientPool::new(factory, max_per_key)),
            loader,
        }
    }

    /// Creates a manager with the default validator over the shared pool.
    pub fn manager(&self, config: Config) -> ConnectionManager<SimPool> {
        ConnectionManager::new(self.pool.clone(), &self.loader, CONFIG_FILE, config)
            .expect("configuration is registered")
    }
}
