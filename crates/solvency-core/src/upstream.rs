//! Timed, deadline-bounded access to the subject directory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::directory::{LookupRequest, SubjectDirectory, UpstreamFault};
use crate::retry::RetryConfig;
use crate::{CorrelationContext, DataCategory, SubjectId, SubjectRecord};

/// Default per-attempt deadline.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// A value paired with the wall time spent producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Timed<T> {
    pub result: T,
    pub elapsed: Duration,
    pub attempts: u32,
}

pub type UpstreamCall = Timed<Result<SubjectRecord, UpstreamFault>>;

/// Wraps a [`SubjectDirectory`] with per-attempt deadlines, bounded retries and timing.
#[derive(Clone)]
pub struct UpstreamClient {
    directory: Arc<dyn SubjectDirectory>,
    timeout: Duration,
    retry: RetryConfig,
}

impl UpstreamClient {
    pub fn new(directory: Arc<dyn SubjectDirectory>) -> Self {
        Self {
            directory,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn directory_name(&self) -> &'static str {
        self.directory.name()
    }

    /// Perform one logical lookup. Elapsed time is reported whatever the outcome.
    pub async fn call(
        &self,
        category: DataCategory,
        subject: &SubjectId,
        correlation: &CorrelationContext,
    ) -> UpstreamCall {
        let started = Instant::now();
        let operation = category.operation();
        let mut attempt = 0;

        let result = loop {
            attempt += 1;
            tracing::debug!(
                correlation_id = %correlation.id(),
                operation,
                subject = %subject,
                attempt,
                directory = self.directory.name(),
                "calling directory"
            );

            let outcome = self.attempt(category, subject, correlation).await;
            match outcome {
                Ok(record) => break Ok(record),
                Err(fault) if self.retry.should_retry(&fault, attempt) => {
                    let delay = self.retry.delay_for_retry(attempt - 1);
                    tracing::warn!(
                        correlation_id = %correlation.id(),
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %fault,
                        "directory call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(fault) => break Err(fault),
            }
        };

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => tracing::info!(
                correlation_id = %correlation.id(),
                operation,
                attempts = attempt,
                latency_ms = elapsed.as_secs_f64() * 1000.0,
                "directory call completed"
            ),
            Err(fault) => tracing::error!(
                correlation_id = %correlation.id(),
                operation,
                attempts = attempt,
                latency_ms = elapsed.as_secs_f64() * 1000.0,
                error = %fault,
                "directory call failed"
            ),
        }

        Timed {
            result,
            elapsed,
            attempts: attempt,
        }
    }

    async fn attempt(
        &self,
        category: DataCategory,
        subject: &SubjectId,
        correlation: &CorrelationContext,
    ) -> Result<SubjectRecord, UpstreamFault> {
        let operation = category.operation();
        let req = LookupRequest::new(category, subject.clone(), correlation.id());

        let record = tokio::time::timeout(self.timeout, self.directory.lookup(req))
            .await
            .map_err(|_| UpstreamFault::timeout(operation, self.timeout))??;

        if record.category() != category {
            return Err(UpstreamFault::decode(
                operation,
                format!("expected {category} record, got {}", record.category()),
            ));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::adapters::InMemoryDirectory;
    use crate::directory::{LookupFuture, UpstreamFaultKind};

    /// Fails with a retryable transport fault `failures` times, then delegates.
    struct FlakyDirectory {
        failures: u32,
        calls: AtomicU32,
        inner: InMemoryDirectory,
    }

    impl SubjectDirectory for FlakyDirectory {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn lookup<'a>(&'a self, req: LookupRequest) -> LookupFuture<'a> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.failures {
                    return Err(UpstreamFault::transport(req.operation(), "connection reset"));
                }
                self.inner.lookup(req).await
            })
        }
    }

    struct StalledDirectory;

    impl SubjectDirectory for StalledDirectory {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn lookup<'a>(&'a self, _req: LookupRequest) -> LookupFuture<'a> {
            Box::pin(std::future::pending::<Result<SubjectRecord, UpstreamFault>>())
        }
    }

    fn subject() -> SubjectId {
        SubjectId::parse("client-001").expect("valid id")
    }

    fn flaky(failures: u32) -> Arc<FlakyDirectory> {
        Arc::new(FlakyDirectory {
            failures,
            calls: AtomicU32::new(0),
            inner: InMemoryDirectory::with_fixtures(),
        })
    }

    #[tokio::test]
    async fn retries_transient_faults_until_success() {
        let directory = flaky(2);
        let client = UpstreamClient::new(directory.clone())
            .with_retry(RetryConfig::fixed(Duration::ZERO, 2));

        let call = client
            .call(DataCategory::Identity, &subject(), &CorrelationContext::new())
            .await;

        assert!(call.result.is_ok());
        assert_eq!(call.attempts, 3);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let directory = flaky(10);
        let client = UpstreamClient::new(directory.clone())
            .with_retry(RetryConfig::fixed(Duration::ZERO, 1));

        let call = client
            .call(DataCategory::Identity, &subject(), &CorrelationContext::new())
            .await;

        assert_eq!(
            call.result.expect_err("budget exhausted").kind(),
            UpstreamFaultKind::Transport
        );
        assert_eq!(call.attempts, 2);
    }

    #[tokio::test]
    async fn remote_faults_are_not_retried() {
        let client = UpstreamClient::new(Arc::new(InMemoryDirectory::new()))
            .with_retry(RetryConfig::fixed(Duration::ZERO, 3));

        let call = client
            .call(DataCategory::History, &subject(), &CorrelationContext::new())
            .await;

        assert_eq!(call.attempts, 1);
        assert_eq!(
            call.result.expect_err("unknown subject").code(),
            Some("Client.NotFound")
        );
    }

    #[tokio::test]
    async fn deadline_produces_timeout_fault() {
        let client = UpstreamClient::new(Arc::new(StalledDirectory))
            .with_timeout(Duration::from_millis(20))
            .with_retry(RetryConfig::no_retry());

        let call = client
            .call(DataCategory::Financials, &subject(), &CorrelationContext::new())
            .await;

        let fault = call.result.expect_err("stalled call");
        assert_eq!(fault.kind(), UpstreamFaultKind::Timeout);
        assert!(call.elapsed >= Duration::from_millis(20));
    }
}
