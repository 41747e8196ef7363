//! 连接管理器的同步状态单元
//! Synchronized state cell of the connection manager
//!
//! Status, activity timestamp, the borrowed client and the remembered URL live
//! under one lock, so every transition updates status and timestamp together
//! and the client slot can only be emptied by one caller. The lock is never
//! held across an `.await`.
//!
//! 状态、活动时间戳、借用的客户端和记录的URL都在同一把锁下，
//! 因此每次转换都会同时更新状态和时间戳，客户端槽位只能被一个调用者清空。

use crate::endpoint::EndpointUrl;
use crate::status::{ConnectionStatus, StatusSnapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::trace;

/// Identifies one checkout of a client from the pool.
///
/// Async work remembers the id it started with and only applies its result if
/// the slot still holds that checkout.
///
/// 标识一次从池中借出的客户端。异步操作记住其开始时的 id，
/// 仅当槽位仍持有该借出时才应用结果。
pub(crate) type CheckoutId = u64;

struct Checkout<C> {
    id: CheckoutId,
    client: Arc<C>,
}

struct LinkState<C> {
    status: ConnectionStatus,
    last_activity: Instant,
    checkout: Option<Checkout<C>>,
    last_url: Option<EndpointUrl>,
    next_checkout: CheckoutId,
}

impl<C> LinkState<C> {
    /// Sets status and timestamp as one step. The timestamp never moves back.
    fn transition(&mut self, status: ConnectionStatus) {
        let old_status = self.status;
        self.status = status;
        self.touch();
        if old_status != status {
            trace!(from = %old_status, to = %status, "Status transition");
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now().max(self.last_activity);
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            last_activity: self.last_activity,
        }
    }

    fn holds(&self, id: CheckoutId) -> bool {
        self.checkout.as_ref().is_some_and(|c| c.id == id)
    }
}

pub(crate) struct StateCell<C> {
    inner: Mutex<LinkState<C>>,
    watch: watch::Sender<StatusSnapshot>,
}

impl<C> StateCell<C> {
    pub(crate) fn new() -> Self {
        let state = LinkState {
            status: ConnectionStatus::Unknown,
            last_activity: Instant::now(),
            checkout: None,
            last_url: None,
            next_checkout: 1,
        };
        let (watch, _) = watch::channel(state.snapshot());
        Self {
            inner: Mutex::new(state),
            watch,
        }
    }

    /// Runs `f` under the lock and publishes the resulting snapshot before
    /// releasing it, so observers see snapshots in transition order.
    fn update<R>(&self, f: impl FnOnce(&mut LinkState<C>) -> R) -> R {
        let mut state = self.inner.lock();
        let result = f(&mut state);
        self.watch.send_replace(state.snapshot());
        result
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock().snapshot()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.watch.subscribe()
    }

    pub(crate) fn transition(&self, status: ConnectionStatus) -> StatusSnapshot {
        self.update(|state| {
            state.transition(status);
            state.snapshot()
        })
    }

    /// Transitions only if `id` is still the current checkout.
    pub(crate) fn transition_if_holding(&self, id: CheckoutId, status: ConnectionStatus) -> bool {
        self.update(|state| {
            let holds = state.holds(id);
            if holds {
                state.transition(status);
            }
            holds
        })
    }

    /// Transitions only if no client is held.
    pub(crate) fn transition_if_empty(&self, status: ConnectionStatus) -> bool {
        self.update(|state| {
            let empty = state.checkout.is_none();
            if empty {
                state.transition(status);
            }
            empty
        })
    }

    /// Refreshes the timestamp and returns it with the currently held client.
    pub(crate) fn touch(&self) -> (Instant, Option<Arc<C>>) {
        self.update(|state| {
            state.touch();
            (
                state.last_activity,
                state.checkout.as_ref().map(|c| c.client.clone()),
            )
        })
    }

    /// Puts `client` into the slot and returns the client it displaced, which
    /// the caller must release.
    pub(crate) fn install(&self, client: Arc<C>) -> (CheckoutId, Option<Arc<C>>) {
        let mut state = self.inner.lock();
        let id = state.next_checkout;
        state.next_checkout += 1;
        let previous = state.checkout.replace(Checkout { id, client });
        (id, previous.map(|c| c.client))
    }

    pub(crate) fn current(&self) -> Option<(CheckoutId, Arc<C>)> {
        self.inner
            .lock()
            .checkout
            .as_ref()
            .map(|c| (c.id, c.client.clone()))
    }

    /// Empties the slot.
    pub(crate) fn take(&self) -> Option<Arc<C>> {
        self.inner.lock().checkout.take().map(|c| c.client)
    }

    /// Empties the slot and transitions, in one step, if `id` is still held.
    pub(crate) fn take_if_holding(&self, id: CheckoutId, status: ConnectionStatus) -> Option<Arc<C>> {
        self.update(|state| {
            if !state.holds(id) {
                return None;
            }
            state.transition(status);
            state.checkout.take().map(|c| c.client)
        })
    }

    #[cfg(test)]
    pub(crate) fn is_holding(&self) -> bool {
        self.inner.lock().checkout.is_some()
    }

    pub(crate) fn remember_url(&self, url: EndpointUrl) {
        self.inner.lock().last_url = Some(url);
    }

    pub(crate) fn last_url(&self) -> Option<EndpointUrl> {
        self.inner.lock().last_url.clone()
    }
}
