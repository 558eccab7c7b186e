// File: resilience.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;

use crate::error::TransportErrorKind;
use crate::transport::{Transport, TransportOutcome};
use crate::wire::EffectiveRequest;

/// Loss simulation plus bounded retry with a fixed backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Probability in [0, 1] that an attempt is dropped before it touches
    /// the network.
    pub loss_rate: f64,
    /// Total attempts per sample, counting simulated losses.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            loss_rate: 0.0,
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Why a single attempt did not produce a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    SimulatedLoss,
    Timeout,
    Reset,
    Other,
}

impl From<TransportErrorKind> for RetryReason {
    fn from(kind: TransportErrorKind) -> Self {
        match kind {
            TransportErrorKind::Timeout => RetryReason::Timeout,
            TransportErrorKind::Reset => RetryReason::Reset,
            TransportErrorKind::Other => RetryReason::Other,
        }
    }
}

/// Result of one step of the retry state machine.
#[derive(Debug)]
pub enum AttemptOutcome {
    Delivered(TransportOutcome),
    Retry(RetryReason),
}

/// Runs one attempt: either a simulated packet loss (no network call) or
/// a real delivery through the transport.
pub async fn attempt<T: Transport + ?Sized>(
    transport: &T,
    request: &EffectiveRequest,
    loss_rate: f64,
) -> AttemptOutcome {
    if loss_rate > 0.0 && rand::thread_rng().gen::<f64>() < loss_rate {
        return AttemptOutcome::Retry(RetryReason::SimulatedLoss);
    }
    match transport.deliver(request).await {
        Ok(outcome) => AttemptOutcome::Delivered(outcome),
        Err(err) => {
            debug!("delivery failed ({err})");
            AttemptOutcome::Retry(err.kind.into())
        }
    }
}

/// Drives attempts until one delivers or the budget is exhausted.
///
/// Terminal failures become synthetic outcomes (status 0) whose reason
/// reflects the final attempt's failure class, so a run never loses a
/// sample to a transport error. Attempts for one sample are strictly
/// sequential.
pub async fn deliver_with_retry<T: Transport + ?Sized>(
    transport: &T,
    request: &EffectiveRequest,
    policy: &RetryPolicy,
) -> TransportOutcome {
    let start = Instant::now();
    let mut last_reason = RetryReason::SimulatedLoss;

    for attempt_no in 1..=policy.max_retries {
        match attempt(transport, request, policy.loss_rate).await {
            AttemptOutcome::Delivered(outcome) => return outcome,
            AttemptOutcome::Retry(reason) => {
                debug!(
                    "attempt {}/{} failed: {:?}",
                    attempt_no, policy.max_retries, reason
                );
                last_reason = reason;
                // A lost packet always waits before the next try; a real
                // failure only waits when a retry is still available.
                if reason == RetryReason::SimulatedLoss || attempt_no < policy.max_retries {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    let tries = policy.max_retries;
    match last_reason {
        RetryReason::Timeout => {
            TransportOutcome::synthetic(format!("Timeout (tried {tries} times)"), false, start.elapsed())
        }
        RetryReason::Reset => {
            TransportOutcome::synthetic("Connection Reset by Peer", true, start.elapsed())
        }
        RetryReason::Other => TransportOutcome::synthetic("Connection Error", false, start.elapsed()),
        RetryReason::SimulatedLoss => {
            TransportOutcome::synthetic(format!("All {tries} attempts failed"), false, start.elapsed())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use crate::error::TransportError;
    use crate::httpspec::RequestSpec;
    use crate::wire::{resolve_destination, EffectiveRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request() -> EffectiveRequest {
        let spec = RequestSpec::parse("GET /a HTTP/1.1\nHost: x\n\n").unwrap();
        let dest = resolve_destination(&spec, None, Protocol::Http).unwrap();
        EffectiveRequest::new(spec, dest)
    }

    fn fast_policy(loss_rate: f64, max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            loss_rate,
            max_retries,
            backoff: Duration::from_millis(1),
        }
    }

    /// Counts deliveries; fails every attempt with a fixed kind, or
    /// succeeds when `kind` is None.
    struct ScriptedTransport {
        kind: Option<TransportErrorKind>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn failing(kind: TransportErrorKind) -> Self {
            ScriptedTransport {
                kind: Some(kind),
                calls: AtomicU32::new(0),
            }
        }

        fn succeeding() -> Self {
            ScriptedTransport {
                kind: None,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn deliver(
            &self,
            _request: &EffectiveRequest,
        ) -> Result<TransportOutcome, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.kind {
                None => Ok(TransportOutcome {
                    status: 200,
                    reason: "OK".to_string(),
                    body: String::new(),
                    connection_reset: false,
                    elapsed: Duration::ZERO,
                }),
                Some(TransportErrorKind::Timeout) => Err(TransportError::timeout("t")),
                Some(TransportErrorKind::Reset) => Err(TransportError::reset("r")),
                Some(TransportErrorKind::Other) => Err(TransportError::other("o")),
            }
        }
    }

    #[tokio::test]
    async fn zero_loss_never_skips_delivery() {
        let transport = ScriptedTransport::succeeding();
        let outcome = deliver_with_retry(&transport, &request(), &fast_policy(0.0, 3)).await;
        assert_eq!(outcome.status, 200);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn full_loss_never_touches_the_network() {
        let transport = ScriptedTransport::succeeding();
        let outcome = deliver_with_retry(&transport, &request(), &fast_policy(1.0, 3)).await;
        assert_eq!(transport.calls(), 0);
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.reason, "All 3 attempts failed");
        assert!(!outcome.connection_reset);
    }

    #[tokio::test]
    async fn reset_every_attempt_exhausts_exactly_max_retries() {
        let transport = ScriptedTransport::failing(TransportErrorKind::Reset);
        let outcome = deliver_with_retry(&transport, &request(), &fast_policy(0.0, 3)).await;
        assert_eq!(transport.calls(), 3);
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.reason, "Connection Reset by Peer");
        assert!(outcome.connection_reset);
    }

    #[tokio::test]
    async fn timeout_exhaustion_reports_attempt_count() {
        let transport = ScriptedTransport::failing(TransportErrorKind::Timeout);
        let outcome = deliver_with_retry(&transport, &request(), &fast_policy(0.0, 2)).await;
        assert_eq!(transport.calls(), 2);
        assert_eq!(outcome.reason, "Timeout (tried 2 times)");
        assert!(!outcome.connection_reset);
    }

    #[tokio::test]
    async fn other_errors_are_retried_then_reported_generically() {
        let transport = ScriptedTransport::failing(TransportErrorKind::Other);
        let outcome = deliver_with_retry(&transport, &request(), &fast_policy(0.0, 4)).await;
        assert_eq!(transport.calls(), 4);
        assert_eq!(outcome.reason, "Connection Error");
    }

    #[tokio::test]
    async fn single_attempt_budget_is_honored() {
        let transport = ScriptedTransport::failing(TransportErrorKind::Timeout);
        let outcome = deliver_with_retry(&transport, &request(), &fast_policy(0.0, 1)).await;
        assert_eq!(transport.calls(), 1);
        assert_eq!(outcome.reason, "Timeout (tried 1 times)");
    }
}
