//! Request orchestration for `VerifySolvency`.
//!
//! Each request walks a fixed sequence of [`Stage`]s:
//!
//! ```text
//! Validating -> FetchingIdentity -> FetchingFinancials -> FetchingHistory
//!            -> Scoring -> Deciding -> Explaining -> Assembled -> Completed
//!                                            (any failure) -> Faulted
//! ```
//!
//! The three fetches are issued concurrently and composed in that order; the first
//! fault in composition order wins. Scoring, deciding and explaining run sequentially.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use serde::Serialize;
use tracing::Instrument;

use crate::adapters::{HttpDirectory, InMemoryDirectory};
use crate::cache::{CacheStats, TtlLruCache};
use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::directory::{SubjectDirectory, UpstreamFault};
use crate::fault::{Fault, FaultTranslator};
use crate::http_client::ReqwestHttpClient;
use crate::inflight::InFlight;
use crate::metrics::{CacheEvent, MetricsRecorder, MetricsSnapshot, Outcome};
use crate::rules::{SolvencyRules, StandardRules};
use crate::upstream::UpstreamClient;
use crate::{
    CacheKey, CategoryRecord, ClientIdentity, ConfigError, CorrelationContext, CorrelationId,
    CreditHistory, Financials, SolvencyReport, SubjectId, SubjectRecord,
};

/// Operation name under which whole requests are recorded.
pub const VERIFY_OPERATION: &str = "VerifySolvency";

/// Cache shared by every request: one opaque record per (category, subject).
pub type RecordCache = TtlLruCache<CacheKey, SubjectRecord>;

/// Per-request orchestration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    FetchingIdentity,
    FetchingFinancials,
    FetchingHistory,
    Scoring,
    Deciding,
    Explaining,
    Assembled,
    Completed,
    Faulted,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::FetchingIdentity => "fetching_identity",
            Self::FetchingFinancials => "fetching_financials",
            Self::FetchingHistory => "fetching_history",
            Self::Scoring => "scoring",
            Self::Deciding => "deciding",
            Self::Explaining => "explaining",
            Self::Assembled => "assembled",
            Self::Completed => "completed",
            Self::Faulted => "faulted",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Faulted)
    }

    /// Stages that run the scoring rules.
    pub const fn is_computation(self) -> bool {
        matches!(self, Self::Scoring | Self::Deciding | Self::Explaining)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one `VerifySolvency` request plus its per-request bookkeeping.
#[derive(Debug, Clone)]
pub struct Verification {
    pub correlation_id: CorrelationId,
    pub outcome: Result<SolvencyReport, Fault>,
    /// Stages entered, in order, ending with the terminal stage.
    pub stages: Vec<Stage>,
    pub elapsed: Duration,
    pub cache_hits: u32,
    pub cache_misses: u32,
}

impl Verification {
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn report(&self) -> Option<&SolvencyReport> {
        self.outcome.as_ref().ok()
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.outcome.as_ref().err()
    }

    pub fn entered(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

struct Fetched<T> {
    result: Result<T, UpstreamFault>,
    hit: bool,
}

struct RequestState<'a> {
    context: &'a CorrelationContext,
    stages: Vec<Stage>,
    cache_hits: u32,
    cache_misses: u32,
}

impl<'a> RequestState<'a> {
    fn new(context: &'a CorrelationContext) -> Self {
        Self {
            context,
            stages: Vec::with_capacity(10),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::trace!(stage = stage.as_str(), "stage entered");
        self.stages.push(stage);
    }

    fn count<T>(&mut self, fetched: &Fetched<T>) {
        if fetched.hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }

    fn finish(mut self, outcome: Result<SolvencyReport, Fault>) -> Verification {
        self.enter(if outcome.is_ok() {
            Stage::Completed
        } else {
            Stage::Faulted
        });
        Verification {
            correlation_id: self.context.id(),
            outcome,
            stages: self.stages,
            elapsed: self.context.elapsed(),
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
        }
    }
}

/// Orchestration gateway. Share it behind an [`Arc`]; every method takes `&self`.
pub struct SolvencyGateway {
    config: GatewayConfig,
    cache: RecordCache,
    upstream: UpstreamClient,
    rules: Arc<dyn SolvencyRules>,
    metrics: MetricsRecorder,
    translator: FaultTranslator,
    inflight: InFlight,
}

impl SolvencyGateway {
    pub fn builder() -> SolvencyGatewayBuilder {
        SolvencyGatewayBuilder::new()
    }

    /// `VerifySolvency(subjectId) -> Report | Fault`.
    pub async fn verify_solvency(&self, subject_id: &str) -> Result<SolvencyReport, Fault> {
        self.verify(subject_id).await.outcome
    }

    /// Run one request and return the outcome together with its correlation id.
    pub async fn verify(&self, subject_id: &str) -> Verification {
        let context = CorrelationContext::new();
        let span = tracing::info_span!(
            "verify_solvency",
            correlation_id = %context.id(),
            subject = subject_id
        );
        self.orchestrate(subject_id, &context).instrument(span).await
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Metrics in the Prometheus text exposition format.
    pub fn metrics_text(&self) -> Result<String, prometheus::Error> {
        self.metrics.export_text()
    }

    async fn orchestrate(&self, subject_id: &str, context: &CorrelationContext) -> Verification {
        let mut state = RequestState::new(context);
        let outcome = self.run_stages(subject_id, &mut state).await;

        let elapsed = context.elapsed();
        match &outcome {
            Ok(report) => {
                self.metrics
                    .record_duration(VERIFY_OPERATION, elapsed, Outcome::Success);
                tracing::info!(
                    correlation_id = %context.id(),
                    subject = %report.subject_id,
                    credit_score = report.credit_score.value(),
                    solvency_status = report.solvency_status.as_str(),
                    cache_hits = state.cache_hits,
                    cache_misses = state.cache_misses,
                    latency_ms = elapsed.as_secs_f64() * 1000.0,
                    "verification completed"
                );
            }
            Err(fault) => {
                self.metrics
                    .record_duration(VERIFY_OPERATION, elapsed, Outcome::from(&fault.kind));
                tracing::warn!(
                    correlation_id = %context.id(),
                    code = fault.code(),
                    reason = %fault.message(),
                    cache_hits = state.cache_hits,
                    cache_misses = state.cache_misses,
                    latency_ms = elapsed.as_secs_f64() * 1000.0,
                    "verification faulted"
                );
            }
        }

        state.finish(outcome)
    }

    async fn run_stages(
        &self,
        subject_id: &str,
        state: &mut RequestState<'_>,
    ) -> Result<SolvencyReport, Fault> {
        let correlation_id = state.context.id();

        state.enter(Stage::Validating);
        let subject = SubjectId::parse(subject_id)
            .map_err(|err| Fault::from_validation(&err, correlation_id))?;

        state.enter(Stage::FetchingIdentity);
        state.enter(Stage::FetchingFinancials);
        state.enter(Stage::FetchingHistory);
        let context = state.context;
        let (identity, financials, history) = tokio::join!(
            self.fetch::<ClientIdentity>(&subject, context),
            self.fetch::<Financials>(&subject, context),
            self.fetch::<CreditHistory>(&subject, context),
        );
        state.count(&identity);
        state.count(&financials);
        state.count(&history);

        let translate = |fault: UpstreamFault| self.translator.translate(&fault, correlation_id);
        let identity = identity.result.map_err(translate)?;
        let financials = financials.result.map_err(translate)?;
        let history = history.result.map_err(translate)?;

        let computation = |err| Fault::from_validation(&err, correlation_id);

        state.enter(Stage::Scoring);
        let credit_score = self.rules.score(&history).map_err(computation)?;

        state.enter(Stage::Deciding);
        let solvency_status = self
            .rules
            .decide(&financials, credit_score)
            .map_err(computation)?;

        state.enter(Stage::Explaining);
        let explanations = self
            .rules
            .explain(credit_score, &financials, &history)
            .map_err(computation)?;

        state.enter(Stage::Assembled);
        Ok(SolvencyReport {
            subject_id: subject,
            client_identity: identity,
            financials,
            credit_history: history,
            credit_score,
            solvency_status,
            explanations,
        })
    }

    /// Cache-aside lookup of one category, deduplicated across concurrent misses.
    async fn fetch<T: CategoryRecord>(
        &self,
        subject: &SubjectId,
        context: &CorrelationContext,
    ) -> Fetched<T> {
        let key = CacheKey::new(T::CATEGORY, subject.clone());

        if let Some(record) = self.cache.get(&key) {
            self.metrics.record_cache_event(CacheEvent::Hit);
            return Fetched {
                result: typed(record, T::CATEGORY.operation()),
                hit: true,
            };
        }
        self.metrics.record_cache_event(CacheEvent::Miss);

        let flight = self
            .inflight
            .run(&key, || async {
                let call = self.upstream.call(T::CATEGORY, subject, context).await;
                let outcome = match &call.result {
                    Ok(_) => Outcome::Success,
                    Err(fault) => Outcome::from(&self.translator.kind_of(fault)),
                };
                self.metrics
                    .record_duration(T::CATEGORY.operation(), call.elapsed, outcome);

                if let Ok(record) = &call.result {
                    let evicted = self.cache.put(key.clone(), record.clone());
                    self.metrics
                        .record_cache_events(CacheEvent::Eviction, evicted as u64);
                }
                call.result
            })
            .await;

        if !flight.leader {
            tracing::debug!(
                correlation_id = %context.id(),
                %key,
                "joined in-flight lookup"
            );
        }

        Fetched {
            result: flight
                .result
                .and_then(|record| typed(record, T::CATEGORY.operation())),
            hit: false,
        }
    }
}

fn typed<T: CategoryRecord>(
    record: SubjectRecord,
    operation: &'static str,
) -> Result<T, UpstreamFault> {
    let category = record.category();
    T::from_record(record).ok_or_else(|| {
        UpstreamFault::decode(
            operation,
            format!("expected {} record, got {category}", T::CATEGORY),
        )
    })
}

/// Composition root for [`SolvencyGateway`].
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use solvency_core::{GatewayConfig, InMemoryDirectory, SolvencyGateway};
///
/// let gateway = SolvencyGateway::builder()
///     .config(GatewayConfig::from_env()?)
///     .directory(Arc::new(InMemoryDirectory::with_fixtures()))
///     .build()?;
/// ```
#[derive(Default)]
pub struct SolvencyGatewayBuilder {
    config: GatewayConfig,
    directory: Option<Arc<dyn SubjectDirectory>>,
    rules: Option<Arc<dyn SolvencyRules>>,
    cache: Option<RecordCache>,
    metrics: Option<MetricsRecorder>,
    registry: Option<Registry>,
    clock: Option<Arc<dyn Clock>>,
}

impl SolvencyGatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn directory(mut self, directory: Arc<dyn SubjectDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn rules(mut self, rules: Arc<dyn SolvencyRules>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Share an existing cache instead of creating one from the config.
    pub fn cache(mut self, cache: RecordCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Registry for a recorder created by the builder. Ignored when a recorder is supplied.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Clock for a cache created by the builder. Ignored when a cache is supplied.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid or the metrics registry
    /// rejects the gateway's collectors.
    pub fn build(self) -> Result<SolvencyGateway, ConfigError> {
        self.config.validate()?;
        let config = self.config;

        let directory = self
            .directory
            .unwrap_or_else(|| default_directory(&config));
        tracing::info!(
            directory = directory.name(),
            cache_ttl_seconds = config.cache_ttl.as_secs(),
            cache_max_entries = config.cache_max_entries,
            upstream_timeout_ms = config.upstream_timeout.as_millis() as u64,
            max_retries = config.retry.max_retries,
            "building solvency gateway"
        );

        let cache = self.cache.unwrap_or_else(|| {
            let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
            TtlLruCache::with_clock(config.cache_ttl, config.cache_max_entries, clock)
        });
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => MetricsRecorder::with_registry(self.registry.unwrap_or_else(Registry::new))
                .map_err(|err| ConfigError::Metrics {
                    reason: err.to_string(),
                })?,
        };
        let upstream = UpstreamClient::new(directory)
            .with_timeout(config.upstream_timeout)
            .with_retry(config.retry.clone());

        Ok(SolvencyGateway {
            cache,
            upstream,
            rules: self.rules.unwrap_or_else(|| Arc::new(StandardRules::new())),
            metrics,
            translator: FaultTranslator::new(),
            inflight: InFlight::new(),
            config,
        })
    }
}

fn default_directory(config: &GatewayConfig) -> Arc<dyn SubjectDirectory> {
    match &config.directory_url {
        Some(url) => Arc::new(
            HttpDirectory::new(url.clone(), Arc::new(ReqwestHttpClient::new()))
                .with_request_timeout(config.upstream_timeout),
        ),
        None => Arc::new(InMemoryDirectory::with_fixtures()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FaultKind, SolvencyStatus};

    fn gateway() -> SolvencyGateway {
        SolvencyGateway::builder()
            .directory(Arc::new(InMemoryDirectory::with_fixtures()))
            .build()
            .expect("default config is valid")
    }

    #[tokio::test]
    async fn successful_request_walks_every_stage() {
        let verification = gateway().verify("client-002").await;

        assert_eq!(
            verification.stages,
            vec![
                Stage::Validating,
                Stage::FetchingIdentity,
                Stage::FetchingFinancials,
                Stage::FetchingHistory,
                Stage::Scoring,
                Stage::Deciding,
                Stage::Explaining,
                Stage::Assembled,
                Stage::Completed,
            ]
        );
        let report = verification.report().expect("report");
        assert_eq!(report.credit_score.value(), 1000);
        assert_eq!(report.solvency_status, SolvencyStatus::Solvent);
        assert_eq!((verification.cache_hits, verification.cache_misses), (0, 3));
    }

    #[tokio::test]
    async fn malformed_subject_stops_at_validation() {
        let verification = gateway().verify("client-01").await;

        assert_eq!(verification.stages, vec![Stage::Validating, Stage::Faulted]);
        assert!(matches!(
            verification.fault().map(|fault| &fault.kind),
            Some(FaultKind::ValidationError { .. })
        ));
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let gateway = gateway();
        gateway.verify("client-001").await;
        let second = gateway.verify("client-001").await;

        assert_eq!((second.cache_hits, second.cache_misses), (3, 0));
        let stats = gateway.cache_stats();
        assert_eq!((stats.hits, stats.misses), (3, 3));
    }

    #[tokio::test]
    async fn metrics_track_requests_and_lookups() {
        let gateway = gateway();
        gateway.verify("client-001").await;
        gateway.verify("client-999").await;

        let snapshot = gateway.metrics_snapshot();
        let verify = snapshot.operation(VERIFY_OPERATION).expect("recorded");
        assert_eq!(verify.call_count, 2);
        assert_eq!(verify.outcome_count(Outcome::Success), 1);
        assert_eq!(verify.outcome_count(Outcome::NotFound), 1);

        let identity = snapshot.operation("GetClientIdentity").expect("recorded");
        assert_eq!(identity.call_count, 2);
        assert_eq!(identity.outcome_count(Outcome::NotFound), 1);
    }

    #[tokio::test]
    async fn builder_registers_metrics_in_supplied_registry() {
        let registry = Registry::new();
        let gateway = SolvencyGateway::builder()
            .registry(registry.clone())
            .build()
            .expect("default config is valid");
        gateway.verify("client-002").await;

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_owned())
            .collect();
        assert!(names.iter().any(|name| name == "solvency_requests_total"));
        assert!(gateway
            .metrics_text()
            .expect("exposition")
            .contains("operation=\"VerifySolvency\""));
    }

    #[test]
    fn builder_reports_registry_conflicts() {
        let registry = Registry::new();
        let _first = SolvencyGateway::builder()
            .registry(registry.clone())
            .build()
            .expect("first gateway registers");

        let second = SolvencyGateway::builder().registry(registry).build();

        assert!(matches!(second, Err(ConfigError::Metrics { .. })));
    }

    #[test]
    fn builder_rejects_zero_capacity() {
        let result = SolvencyGateway::builder()
            .config(GatewayConfig {
                cache_max_entries: 0,
                ..GatewayConfig::default()
            })
            .build();

        assert!(matches!(result, Err(ConfigError::ZeroCapacity)));
    }

    #[test]
    fn stage_classification() {
        assert!(Stage::Completed.is_terminal());
        assert!(Stage::Faulted.is_terminal());
        assert!(!Stage::Assembled.is_terminal());
        assert!(Stage::Scoring.is_computation());
        assert!(!Stage::FetchingHistory.is_computation());
    }
}
