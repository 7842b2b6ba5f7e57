// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Dispatcher abstraction and retry/observability plumbing.
//!
//! The request service never knows how a request reaches the TEE executor:
//! HTTP call, queue publish, or direct on-chain submission all hide behind
//! the [`Dispatcher`] trait. Retry policy, hooks, and the tracer are
//! injected so orchestration stays transport-free.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::{Key, Request};

/// Error produced by a dispatch attempt.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The TEE channel rejected or failed the hand-off; retryable.
    #[error("dispatch channel error: {0}")]
    Channel(String),

    /// The caller cancelled while attempts were outstanding.
    #[error("dispatch cancelled")]
    Cancelled,
}

/// Boxed future returned by dispatcher implementations.
pub type DispatchFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + 'a>>;

/// Hands a created request to the off-chain executor channel.
pub trait Dispatcher: Send + Sync {
    fn dispatch<'a>(&'a self, request: &'a Request, key: &'a Key) -> DispatchFuture<'a>;
}

/// Adapter letting an async closure satisfy [`Dispatcher`].
///
/// The closure receives owned copies of the request and key, so its future
/// does not borrow from the caller.
pub struct DispatcherFn<F>(pub F);

impl<F, Fut> Dispatcher for DispatcherFn<F>
where
    F: Fn(Request, Key) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    fn dispatch<'a>(&'a self, request: &'a Request, key: &'a Key) -> DispatchFuture<'a> {
        Box::pin((self.0)(request.clone(), key.clone()))
    }
}

/// Dispatcher that accepts every request without doing anything.
///
/// Default until a real channel is injected, mirroring a service booted
/// before its transport is wired.
pub struct NoopDispatcher;

impl Dispatcher for NoopDispatcher {
    fn dispatch<'a>(&'a self, _request: &'a Request, _key: &'a Key) -> DispatchFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Exponential backoff retry policy for dispatch attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts; `0` is treated as a single attempt.
    pub attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Ceiling on the delay between attempts.
    pub max_backoff: Duration,
    /// Backoff growth factor per attempt.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1,
        }
    }

    fn backoff_for(&self, completed_attempts: u32) -> Duration {
        let mut delay = self.initial_backoff;
        for _ in 1..completed_attempts {
            delay = delay.saturating_mul(self.multiplier.max(1));
            if delay >= self.max_backoff {
                break;
            }
        }
        delay.min(self.max_backoff)
    }
}

/// Run `op` under `policy`, aborting between attempts if `cancel` fires.
///
/// Returns the last error when all attempts fail, or
/// [`DispatchError::Cancelled`] when cancellation wins the backoff wait.
pub async fn retry<F, Fut>(
    cancel: &CancellationToken,
    policy: RetryPolicy,
    mut op: F,
) -> Result<(), DispatchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(), DispatchError>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_err = DispatchError::Channel("no attempts made".to_string());

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        match op(attempt).await {
            Ok(()) => return Ok(()),
            Err(err) => last_err = err,
        }
        if attempt < attempts {
            let delay = policy.backoff_for(attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            }
        }
    }

    Err(last_err)
}

// =============================================================================
// Hooks & Tracer
// =============================================================================

type AttemptHook = Arc<dyn Fn(&Request, u32) + Send + Sync>;
type OutcomeHook = Arc<dyn Fn(&Request, Option<&DispatchError>) + Send + Sync>;

/// Optional per-dispatch observability callbacks.
#[derive(Clone, Default)]
pub struct DispatchHooks {
    /// Called before each attempt with the 1-based attempt number.
    pub on_attempt: Option<AttemptHook>,
    /// Called once after the final outcome (`None` error means success).
    pub on_outcome: Option<OutcomeHook>,
}

/// Span over a dispatch operation; finished with the outcome.
pub trait DispatchSpan: Send {
    fn finish(self: Box<Self>, error: Option<&DispatchError>);
}

/// Starts spans around dispatch operations.
///
/// The default implementation records through `tracing`; a no-op is
/// available for tests and embedders that bring their own telemetry.
pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &'static str, request_id: &str, key_id: &str)
        -> Box<dyn DispatchSpan>;
}

/// Tracer that drops every span.
pub struct NoopTracer;

struct NoopSpan;

impl DispatchSpan for NoopSpan {
    fn finish(self: Box<Self>, _error: Option<&DispatchError>) {}
}

impl Tracer for NoopTracer {
    fn start_span(
        &self,
        _name: &'static str,
        _request_id: &str,
        _key_id: &str,
    ) -> Box<dyn DispatchSpan> {
        Box::new(NoopSpan)
    }
}

/// Tracer backed by the `tracing` subscriber.
pub struct LogTracer;

struct LogSpan {
    span: tracing::Span,
}

impl DispatchSpan for LogSpan {
    fn finish(self: Box<Self>, error: Option<&DispatchError>) {
        let _guard = self.span.enter();
        match error {
            None => tracing::debug!("dispatch span finished"),
            Some(err) => tracing::warn!(error = %err, "dispatch span failed"),
        }
    }
}

impl Tracer for LogTracer {
    fn start_span(
        &self,
        name: &'static str,
        request_id: &str,
        key_id: &str,
    ) -> Box<dyn DispatchSpan> {
        let span = tracing::info_span!(
            "dispatch",
            operation = name,
            request_id = %request_id,
            key_id = %key_id,
        );
        Box::new(LogSpan { span })
    }
}

/// Bundle of retry policy, hooks, and tracer applied to every dispatch.
#[derive(Clone)]
pub struct DispatchOptions {
    pub retry: RetryPolicy,
    pub hooks: DispatchHooks,
    pub tracer: Arc<dyn Tracer>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            hooks: DispatchHooks::default(),
            tracer: Arc::new(LogTracer),
        }
    }
}

impl DispatchOptions {
    /// Run a dispatcher call under the configured span, hooks, and retry
    /// policy.
    pub async fn run(
        &self,
        name: &'static str,
        cancel: &CancellationToken,
        request: &Request,
        key: &Key,
        dispatcher: &dyn Dispatcher,
    ) -> Result<(), DispatchError> {
        let span = self.tracer.start_span(name, &request.id, &key.id);
        let hooks = &self.hooks;

        let result = retry(cancel, self.retry, |attempt| {
            if let Some(on_attempt) = &hooks.on_attempt {
                on_attempt(request, attempt);
            }
            dispatcher.dispatch(request, key)
        })
        .await;

        let error = result.as_ref().err();
        if let Some(on_outcome) = &hooks.on_outcome {
            on_outcome(request, error);
        }
        span.finish(error);
        result
    }
}
