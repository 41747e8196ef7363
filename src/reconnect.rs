//! Bounded reconnection sequences.
//!
//! A sequence waits, attempts, and repeats until an attempt succeeds, the
//! attempt budget is spent, or its cancellation token fires. Waits are plain
//! timer sleeps raced against the token.
//!
//! 有界的重连序列。序列先等待再尝试，直到尝试成功、尝试次数耗尽或取消令牌触发。

use crate::config::ReconnectConfig;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// How the wait before each attempt evolves.
/// 每次尝试前等待时间的变化方式。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryStrategy {
    /// The wait starts at `initial` and is multiplied by `factor` after every attempt.
    /// 等待时间从 `initial` 开始，每次尝试后乘以 `factor`。
    Backoff { initial: Duration, factor: f64 },
    /// The same wait before every attempt.
    /// 每次尝试前等待相同的时间。
    Linear { interval: Duration },
}

/// A strategy together with its attempt budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub strategy: RetryStrategy,
    pub max_attempts: u32,
}

/// How a sequence ended.
/// 序列的结束方式。
#[derive(Debug, PartialEq, Eq)]
pub enum SequenceOutcome<T> {
    /// Attempt number `attempt` produced a value.
    Succeeded { value: T, attempt: u32 },
    /// Every attempt failed.
    Exhausted,
    /// The token fired before the sequence finished.
    Cancelled,
}

impl RetryPolicy {
    /// Exponential backoff: waits of 1000, 2000, 4000 ms with the default config.
    pub fn backoff(config: &ReconnectConfig) -> Self {
        Self {
            strategy: RetryStrategy::Backoff {
                initial: config.initial_wait,
                factor: config.backoff_factor,
            },
            max_attempts: config.max_attempts,
        }
    }

    /// Constant waits: 5000 ms before each attempt with the default config.
    pub fn linear(config: &ReconnectConfig) -> Self {
        Self {
            strategy: RetryStrategy::Linear {
                interval: config.linear_interval,
            },
            max_attempts: config.max_attempts,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.strategy {
            RetryStrategy::Backoff { .. } => "backoff",
            RetryStrategy::Linear { .. } => "linear",
        }
    }

    /// The wait before the 1-based `attempt`, or `None` once the budget is spent.
    ///
    /// 第 `attempt` 次（从1开始）尝试前的等待时间；超出次数时返回 `None`。
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let delay = match self.strategy {
            RetryStrategy::Linear { interval } => interval,
            RetryStrategy::Backoff { initial, factor } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let secs = initial.as_secs_f64() * factor.powi(exponent);
                Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
            }
        };
        Some(delay)
    }

    /// All waits of a full sequence, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_attempts).filter_map(|attempt| self.delay_for(attempt))
    }

    /// Runs a sequence. `attempt` receives the 1-based attempt number and
    /// resolves to `Some` on success.
    ///
    /// Cancellation is observed both while waiting and while an attempt is in
    /// flight; an in-flight attempt is dropped.
    ///
    /// 运行一个序列。等待期间和尝试进行中都会检查取消；进行中的尝试会被丢弃。
    pub async fn run<T, F, Fut>(&self, token: &CancellationToken, mut attempt: F) -> SequenceOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let mut number = 1;
        while let Some(delay) = self.delay_for(number) {
            trace!(strategy = self.name(), attempt = number, ?delay, "Waiting before reconnection attempt");
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(strategy = self.name(), attempt = number, "Reconnection cancelled while waiting");
                    return SequenceOutcome::Cancelled;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(strategy = self.name(), attempt = number, "Reconnection cancelled during attempt");
                    return SequenceOutcome::Cancelled;
                }
                result = attempt(number) => result,
            };

            if let Some(value) = result {
                info!(strategy = self.name(), attempt = number, "Reconnection attempt succeeded");
                return SequenceOutcome::Succeeded {
                    value,
                    attempt: number,
                };
            }
            debug!(strategy = self.name(), attempt = number, "Reconnection attempt failed");
            number += 1;
        }

        info!(strategy = self.name(), attempts = self.max_attempts, "Reconnection attempts exhausted");
        SequenceOutcome::Exhausted
    }
}
