//! The connection manager: connect, disconnect, ping, reconnect and close for a
//! single logical connection backed by a pooled client.
//!
//! 连接管理器：为由池化客户端支持的单个逻辑连接提供连接、断开、ping、重连和关闭。

mod state;

#[cfg(test)]
mod tests;

use self::state::{CheckoutId, StateCell};
use crate::client::{ClientHandle, Session};
use crate::config::{ClientConfiguration, Config, ConfigurationLoader};
use crate::endpoint::EndpointUrl;
use crate::error::{Error, Result};
use crate::pool::ClientPool;
use crate::reconnect::{RetryPolicy, SequenceOutcome};
use crate::response::ConnectionResponse;
use crate::status::{ConnectionStatus, StatusSnapshot};
use crate::validator::{ConnectionValidator, DefaultValidator};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const CONNECT_FAILED: &str = "OPC UA connection failed";

/// The response type produced by a manager over pool `P`.
pub type Response<P> = ConnectionResponse<<P as ClientPool>::Client>;

/// Manages one logical connection to a remote endpoint.
///
/// The manager borrows at most one client from its pool at a time and returns
/// it on every cleanup path: `disconnect`, `close`, a failed connect, the start
/// of a reconnection sequence, and when the last handle is dropped.
///
/// Handles are cheap to clone and share the same state, so any operation can
/// be spawned onto another task and awaited there.
///
/// 管理与远程端点的一个逻辑连接。管理器一次最多从池中借用一个客户端，
/// 并在每个清理路径上归还。句柄克隆代价低且共享同一状态。
pub struct ConnectionManager<P: ClientPool, V: ConnectionValidator = DefaultValidator> {
    shared: Arc<Shared<P, V>>,
}

struct Shared<P: ClientPool, V: ConnectionValidator> {
    pool: P,
    validator: V,
    /// Loaded once at construction.
    configuration: ClientConfiguration,
    config: Config,
    state: StateCell<P::Client>,
    reconnect: Mutex<ReconnectSlot>,
}

/// The most recent reconnection sequence.
struct ReconnectSlot {
    generation: u64,
    token: CancellationToken,
}

impl<P: ClientPool, V: ConnectionValidator> Clone for ConnectionManager<P, V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<P: ClientPool> ConnectionManager<P, DefaultValidator> {
    /// Creates a manager with the [`DefaultValidator`], loading the client
    /// configuration from `existing_filename`.
    ///
    /// 使用 [`DefaultValidator`] 创建管理器，并从 `existing_filename` 加载客户端配置。
    pub fn new(
        pool: P,
        loader: &impl ConfigurationLoader,
        existing_filename: &str,
        config: Config,
    ) -> Result<Self> {
        Self::with_validator(pool, DefaultValidator::default(), loader, existing_filename, config)
    }
}

impl<P: ClientPool, V: ConnectionValidator> ConnectionManager<P, V> {
    pub fn with_validator(
        pool: P,
        validator: V,
        loader: &impl ConfigurationLoader,
        existing_filename: &str,
        config: Config,
    ) -> Result<Self> {
        let configuration = loader.load(existing_filename)?;
        Ok(Self::from_configuration(pool, validator, configuration, config))
    }

    /// Creates a manager from an already loaded configuration.
    pub fn from_configuration(
        pool: P,
        validator: V,
        configuration: ClientConfiguration,
        config: Config,
    ) -> Self {
        debug!(configuration = %configuration.name, "Connection manager created");
        Self {
            shared: Arc::new(Shared {
                pool,
                validator,
                configuration,
                config,
                state: StateCell::new(),
                reconnect: Mutex::new(ReconnectSlot {
                    generation: 0,
                    token: CancellationToken::new(),
                }),
            }),
        }
    }

    // --- Observation ---

    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.snapshot().status
    }

    pub fn last_activity(&self) -> Instant {
        self.shared.state.snapshot().last_activity
    }

    /// Status and timestamp read together.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.shared.state.snapshot()
    }

    /// Receives every status transition and timestamp refresh.
    ///
    /// 接收每次状态转换和时间戳刷新。
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.shared.state.subscribe()
    }

    /// Time since the last observable activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity().elapsed()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// The last URL used or attempted.
    pub fn last_url(&self) -> Option<EndpointUrl> {
        self.shared.state.last_url()
    }

    pub fn configuration(&self) -> &ClientConfiguration {
        &self.shared.configuration
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    // --- Connect ---

    /// Connects to the last remembered URL.
    ///
    /// 连接到最近记录的URL。
    pub async fn connect(&self) -> Result<Response<P>> {
        let url = self
            .shared
            .state
            .last_url()
            .ok_or_else(|| Error::InvalidState("no URL available for connection".into()))?;
        self.connect_endpoint(url).await
    }

    /// Validates `url`, remembers it, and connects to it.
    ///
    /// Failures after the URL check are wrapped in [`Error::Connection`]; the
    /// original cause is available through [`Error::root_cause`].
    ///
    /// 验证 `url`、记录它并连接。URL检查之后的失败被包装为 [`Error::Connection`]。
    pub async fn connect_to(&self, url: &str) -> Result<Response<P>> {
        let url = EndpointUrl::parse(url)?;
        self.connect_endpoint(url).await
    }

    async fn connect_endpoint(&self, url: EndpointUrl) -> Result<Response<P>> {
        let shared = &self.shared;
        // Remembered before anything can fail, so a later reconnect finds it.
        shared.state.remember_url(url.clone());
        shared.state.transition(ConnectionStatus::Connecting);
        info!(%url, configuration = %shared.configuration.name, "Connecting");

        // One checkout at a time: hand back whatever is held before acquiring.
        if let Some(previous) = shared.state.take() {
            debug!(%url, "Releasing previously held client before acquiring a new one");
            shared.pool.release(previous);
        }

        let Some(client) = shared.pool.acquire(&shared.configuration) else {
            warn!(%url, configuration = %shared.configuration.name, "No client available from pool");
            return Err(Error::connection(
                CONNECT_FAILED,
                Error::ResourceUnavailable(format!(
                    "no client available for configuration '{}'",
                    shared.configuration.name
                )),
            ));
        };

        let (checkout, displaced) = shared.state.install(client.clone());
        if let Some(displaced) = displaced {
            debug!(%url, "Releasing client installed by a concurrent connect");
            shared.pool.release(displaced);
        }
        let pending = PendingCheckout::new(shared.as_ref(), checkout);

        let deadline = shared.config.connection.connect_timeout;
        match tokio::time::timeout(deadline, self.open_session(&url, client.as_ref())).await {
            Ok(Ok(session)) => {
                pending.disarm();
                if !shared.state.transition_if_holding(checkout, ConnectionStatus::Connected) {
                    warn!(%url, "Client was released while connecting; discarding session");
                    return Err(Error::connection(
                        CONNECT_FAILED,
                        Error::InvalidState("connection slot changed while connecting".into()),
                    ));
                }
                info!(%url, session_id = %session.session_id, "Connected");
                Ok(self.create_response(ConnectionStatus::Connected, Some(session), Some(client)))
            }
            Ok(Err(e)) => {
                warn!(%url, error = %e, "Connection attempt failed");
                pending.abandon(ConnectionStatus::Error);
                Err(Error::connection(CONNECT_FAILED, e))
            }
            Err(_) => {
                warn!(%url, ?deadline, "Connection attempt timed out");
                pending.abandon(ConnectionStatus::Failed);
                Err(Error::connection("connection attempt timed out", Error::Timeout))
            }
        }
    }

    /// Validation and the network connect, run under the connect deadline.
    async fn open_session(&self, url: &EndpointUrl, client: &P::Client) -> Result<Session> {
        let validator = &self.shared.validator;
        if !validator.active_session(client) {
            return Err(Error::ValidationFailed("client session is not active".into()));
        }
        if !validator.reachable_from_local_host(url).await {
            return Err(Error::ValidationFailed(format!(
                "endpoint {url} is not reachable from this host"
            )));
        }
        client.connect().await
    }

    // --- Disconnect / close ---

    /// Disconnects the held client.
    ///
    /// Without a client this is a no-op that reports `Disconnected`. Otherwise
    /// the client is released and the status settles to `Disconnected` even if
    /// the network disconnect fails; the failure is reported afterwards.
    ///
    /// 断开持有的客户端。没有客户端时为空操作。否则即使网络断开失败，
    /// 也会先归还客户端并将状态置为 `Disconnected`，然后再报告失败。
    pub async fn disconnect(&self) -> Result<Response<P>> {
        let shared = &self.shared;
        let Some(client) = shared.state.take() else {
            trace!("Disconnect requested without a held client");
            return Ok(self.create_response(ConnectionStatus::Disconnected, None, None));
        };

        let result = client.disconnect().await;
        shared.pool.release(client);
        // A connect that started meanwhile owns the status now.
        shared.state.transition_if_empty(ConnectionStatus::Disconnected);

        match result {
            Ok(()) => {
                info!(configuration = %shared.configuration.name, "Disconnected");
                Ok(self.create_response(ConnectionStatus::Disconnected, None, None))
            }
            Err(e) => {
                warn!(error = %e, "Disconnect failed; client released anyway");
                Err(Error::disconnection("error during disconnection", e))
            }
        }
    }

    /// Cancels any running reconnection sequence, releases the held client and
    /// sets the status to `Disconnected`. Does not contact the endpoint.
    ///
    /// 取消正在运行的重连序列，归还持有的客户端并将状态置为 `Disconnected`。不联系端点。
    pub fn close(&self) {
        self.shared.reconnect.lock().token.cancel();
        self.cleanup();
        debug!(configuration = %self.shared.configuration.name, "Connection manager closed");
    }

    fn cleanup(&self) {
        if let Some(client) = self.shared.state.take() {
            self.shared.pool.release(client);
        }
        self.shared.state.transition(ConnectionStatus::Disconnected);
    }

    // --- Ping ---

    /// Reads the configured liveness node from the endpoint.
    ///
    /// Fails only when no connected client is held. Every other outcome is a
    /// response: `Connected` for a valid value, `NoResponse` for an empty one,
    /// `Error` for a transport failure or timeout.
    ///
    /// 从端点读取配置的存活节点。仅在没有已连接客户端时失败，其他结果都以响应返回。
    pub async fn ping(&self) -> Result<Response<P>> {
        let shared = &self.shared;
        let (checkout, client) = shared
            .state
            .current()
            .filter(|(_, client)| client.is_connected())
            .ok_or_else(|| Error::InvalidState("OPC UA client not connected".into()))?;

        let node = shared.config.connection.ping_node;
        let deadline = shared.config.connection.ping_timeout;
        let status = match tokio::time::timeout(deadline, client.read_value(&node)).await {
            Ok(Ok(Some(value))) if value.is_valid() => ConnectionStatus::Connected,
            Ok(Ok(_)) => {
                debug!(%node, "Ping returned no value");
                ConnectionStatus::NoResponse
            }
            Ok(Err(e)) => {
                warn!(%node, error = %e, "Ping failed");
                ConnectionStatus::Error
            }
            Err(_) => {
                warn!(%node, ?deadline, "Ping timed out");
                ConnectionStatus::Error
            }
        };
        drop(client);

        if shared.state.transition_if_holding(checkout, status) {
            trace!(%node, %status, "Ping completed");
            Ok(self.create_response(status, None, None))
        } else {
            debug!(%node, "Client released during ping; result discarded");
            Ok(self.create_response(ConnectionStatus::Disconnected, None, None))
        }
    }

    // --- Reconnection ---

    /// Reconnects to the remembered URL with exponential backoff.
    ///
    /// 以指数退避方式重连到记录的URL。
    pub async fn backoff_reconnect(&self) -> Result<Response<P>> {
        let url = self.remembered_url()?;
        let policy = RetryPolicy::backoff(&self.shared.config.reconnect);
        self.reconnect_with(url, policy, CancellationToken::new()).await
    }

    pub async fn backoff_reconnect_to(&self, url: &str) -> Result<Response<P>> {
        let url = EndpointUrl::parse(url)?;
        let policy = RetryPolicy::backoff(&self.shared.config.reconnect);
        self.reconnect_with(url, policy, CancellationToken::new()).await
    }

    /// Reconnects to the remembered URL with a constant wait between attempts.
    ///
    /// 以固定间隔重连到记录的URL。
    pub async fn linear_reconnect(&self) -> Result<Response<P>> {
        let url = self.remembered_url()?;
        let policy = RetryPolicy::linear(&self.shared.config.reconnect);
        self.reconnect_with(url, policy, CancellationToken::new()).await
    }

    pub async fn linear_reconnect_to(&self, url: &str) -> Result<Response<P>> {
        let url = EndpointUrl::parse(url)?;
        let policy = RetryPolicy::linear(&self.shared.config.reconnect);
        self.reconnect_with(url, policy, CancellationToken::new()).await
    }

    /// Runs a reconnection sequence with an explicit policy and token.
    ///
    /// The held client is released first. The sequence ends with the first
    /// `Connected` response, with a `ReconnectionFailed` response once the
    /// attempts are spent, or with a `Disconnected` response if `token` (or
    /// [`ConnectionManager::cancel_reconnect`]) cancels it. Starting a sequence
    /// cancels the previous one. Only a child of `token` is ever cancelled by
    /// the manager, so a shared shutdown token stays live.
    ///
    /// 使用显式策略和令牌运行重连序列。首先归还持有的客户端。
    /// 序列以第一个 `Connected` 响应结束；尝试耗尽时返回 `ReconnectionFailed`；
    /// 被取消时返回 `Disconnected`。开始新序列会取消前一个序列。
    /// 管理器只取消 `token` 的子令牌，从不取消调用者的令牌本身。
    pub async fn reconnect_with(
        &self,
        url: EndpointUrl,
        policy: RetryPolicy,
        token: CancellationToken,
    ) -> Result<Response<P>> {
        let token = token.child_token();
        let generation = {
            let mut current = self.shared.reconnect.lock();
            current.token.cancel();
            current.generation += 1;
            current.token = token.clone();
            current.generation
        };
        self.shared.state.remember_url(url.clone());
        self.cleanup();
        info!(%url, strategy = policy.name(), max_attempts = policy.max_attempts, "Starting reconnection");

        let outcome = policy
            .run(&token, |attempt| self.reconnect_attempt(url.clone(), attempt))
            .await;

        match outcome {
            SequenceOutcome::Succeeded { value, .. } => Ok(value),
            SequenceOutcome::Exhausted => {
                warn!(%url, strategy = policy.name(), "Reconnection failed");
                Ok(self.settle_exhausted(generation))
            }
            SequenceOutcome::Cancelled => {
                info!(%url, strategy = policy.name(), "Reconnection cancelled");
                // A newer sequence owns the client slot once it has replaced this one.
                if self.is_current_sequence(generation) {
                    self.cleanup();
                }
                Ok(self.create_response(ConnectionStatus::Disconnected, None, None))
            }
        }
    }

    /// Reports an exhausted sequence. The status only changes while no newer
    /// sequence has replaced this one.
    fn settle_exhausted(&self, generation: u64) -> Response<P> {
        if self.is_current_sequence(generation) {
            self.shared.state.transition(ConnectionStatus::ReconnectionFailed);
        } else {
            debug!(generation, "Superseded sequence exhausted; status left to the newer one");
        }
        self.create_response(ConnectionStatus::ReconnectionFailed, None, None)
    }

    fn is_current_sequence(&self, generation: u64) -> bool {
        self.shared.reconnect.lock().generation == generation
    }

    /// Cancels the running reconnection sequence, if any.
    ///
    /// 取消正在运行的重连序列（如果有）。
    pub fn cancel_reconnect(&self) {
        self.shared.reconnect.lock().token.cancel();
    }

    async fn reconnect_attempt(&self, url: EndpointUrl, attempt: u32) -> Option<Response<P>> {
        match self.connect_endpoint(url).await {
            Ok(response) if response.is_connected() => Some(response),
            Ok(response) => {
                debug!(attempt, status = %response.status(), "Reconnection attempt did not connect");
                None
            }
            Err(e) => {
                debug!(attempt, error = %e, "Reconnection attempt returned an error");
                None
            }
        }
    }

    fn remembered_url(&self) -> Result<EndpointUrl> {
        self.shared
            .state
            .last_url()
            .ok_or_else(|| Error::InvalidState("no previous URL available for reconnection".into()))
    }

    // --- Responses ---

    /// Refreshes the activity timestamp and snapshots the outcome with the
    /// metadata of the client held right now.
    fn create_response(
        &self,
        status: ConnectionStatus,
        session: Option<Session>,
        client: Option<Arc<P::Client>>,
    ) -> Response<P> {
        let (last_activity, held) = self.shared.state.touch();
        let metadata = held.map(|c| c.metadata()).unwrap_or_default();
        ConnectionResponse::builder(status, last_activity)
            .metadata(metadata)
            .session(session)
            .client(client)
            .build()
    }
}

impl<P: ClientPool, V: ConnectionValidator> Shared<P, V> {
    /// Releases `checkout` with `status`, unless another operation already
    /// replaced it.
    fn release_if_holding(&self, checkout: CheckoutId, status: ConnectionStatus) {
        if let Some(client) = self.state.take_if_holding(checkout, status) {
            self.pool.release(client);
        }
    }
}

/// A checkout whose connect has not settled yet.
///
/// Dropping it while armed, which happens when the connect future itself is
/// dropped, releases the checkout and settles the status to `Disconnected`.
///
/// 尚未完成连接的借出。若连接 future 在完成前被丢弃，则归还该借出并将状态置为 `Disconnected`。
struct PendingCheckout<'a, P: ClientPool, V: ConnectionValidator> {
    shared: &'a Shared<P, V>,
    checkout: CheckoutId,
    armed: bool,
}

impl<'a, P: ClientPool, V: ConnectionValidator> PendingCheckout<'a, P, V> {
    fn new(shared: &'a Shared<P, V>, checkout: CheckoutId) -> Self {
        Self {
            shared,
            checkout,
            armed: true,
        }
    }

    /// The session is open; the checkout stays in the slot.
    fn disarm(mut self) {
        self.armed = false;
    }

    /// The connect failed; give the checkout back with `status`.
    fn abandon(mut self, status: ConnectionStatus) {
        self.armed = false;
        self.shared.release_if_holding(self.checkout, status);
    }
}

impl<P: ClientPool, V: ConnectionValidator> Drop for PendingCheckout<'_, P, V> {
    fn drop(&mut self) {
        if self.armed {
            debug!(checkout = self.checkout, "Connect dropped before it settled; releasing its client");
            self.shared
                .release_if_holding(self.checkout, ConnectionStatus::Disconnected);
        }
    }
}

impl<P: ClientPool, V: ConnectionValidator> Drop for Shared<P, V> {
    fn drop(&mut self) {
        self.reconnect.get_mut().token.cancel();
        if let Some(client) = self.state.take() {
            debug!(configuration = %self.configuration.name, "Releasing client on drop");
            self.pool.release(client);
        }
    }
}
