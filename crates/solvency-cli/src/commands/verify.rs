use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;

use solvency_core::{
    CorrelationId, Fault, GatewayConfig, MetricsSnapshot, RetryConfig, SolvencyGateway,
    SolvencyReport, Stage, Verification,
};

use crate::cli::VerifyArgs;
use crate::error::CliError;
use crate::output::{CacheSummary, EnvelopeError};

use super::CommandResult;

#[derive(Debug, Serialize)]
struct VerificationResult {
    subject_id: String,
    round: u32,
    correlation_id: CorrelationId,
    status: Stage,
    latency_ms: f64,
    cache_hits: u32,
    cache_misses: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<SolvencyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fault: Option<Fault>,
}

impl VerificationResult {
    fn new(subject_id: String, round: u32, verification: Verification) -> Self {
        let status = verification
            .stages
            .last()
            .copied()
            .unwrap_or(Stage::Faulted);
        let (report, fault) = match verification.outcome {
            Ok(report) => (Some(report), None),
            Err(fault) => (None, Some(fault)),
        };

        Self {
            subject_id,
            round,
            correlation_id: verification.correlation_id,
            status,
            latency_ms: verification.elapsed.as_secs_f64() * 1000.0,
            cache_hits: verification.cache_hits,
            cache_misses: verification.cache_misses,
            report,
            fault,
        }
    }

    fn envelope_error(&self) -> Option<EnvelopeError> {
        self.fault.as_ref().map(|fault| EnvelopeError {
            code: fault.code().to_owned(),
            message: fault.message(),
            subject_id: self.subject_id.clone(),
            correlation_id: fault.correlation_id.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct VerifyResponseData {
    results: Vec<VerificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<MetricsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus: Option<String>,
}

pub async fn run(args: &VerifyArgs) -> Result<CommandResult, CliError> {
    let config = resolve_config(args, GatewayConfig::from_env()?);
    let gateway = Arc::new(SolvencyGateway::builder().config(config).build()?);

    let mut results = Vec::with_capacity(args.subjects.len() * args.repeat as usize);
    for round in 1..=args.repeat {
        results.extend(verify_round(&gateway, &args.subjects, round).await?);
    }

    let errors = results
        .iter()
        .filter_map(VerificationResult::envelope_error)
        .collect();

    let stats = gateway.cache_stats();
    let cache = CacheSummary {
        hits: stats.hits,
        misses: stats.misses,
        hit_rate: stats.hit_rate(),
        size: stats.size,
    };

    let data = serde_json::to_value(VerifyResponseData {
        results,
        metrics: args.metrics.then(|| gateway.metrics_snapshot()),
        prometheus: prometheus_text(&gateway, args.prometheus)?,
    })?;

    if args.metrics {
        tracing::info!(summary = %gateway.metrics_snapshot().summary(), "metrics");
    }

    Ok(CommandResult::ok(data).with_errors(errors).with_cache(cache))
}

fn prometheus_text(gateway: &SolvencyGateway, enabled: bool) -> Result<Option<String>, CliError> {
    if !enabled {
        return Ok(None);
    }
    gateway
        .metrics_text()
        .map(Some)
        .map_err(|error| CliError::Command(format!("metrics export failed: {error}")))
}

/// Verify every subject concurrently; results keep the argument order.
async fn verify_round(
    gateway: &Arc<SolvencyGateway>,
    subjects: &[String],
    round: u32,
) -> Result<Vec<VerificationResult>, CliError> {
    let mut tasks = JoinSet::new();
    for (index, subject) in subjects.iter().enumerate() {
        let gateway = Arc::clone(gateway);
        let subject = subject.clone();
        tasks.spawn(async move {
            let verification = gateway.verify(&subject).await;
            (index, VerificationResult::new(subject, round, verification))
        });
    }

    let mut completed = Vec::with_capacity(subjects.len());
    while let Some(joined) = tasks.join_next().await {
        let entry = joined
            .map_err(|error| CliError::Command(format!("verification task failed: {error}")))?;
        completed.push(entry);
    }
    completed.sort_by_key(|(index, _)| *index);

    Ok(completed.into_iter().map(|(_, result)| result).collect())
}

fn resolve_config(args: &VerifyArgs, mut config: GatewayConfig) -> GatewayConfig {
    if let Some(url) = &args.directory_url {
        config.directory_url = Some(url.clone());
    }
    if let Some(seconds) = args.cache_ttl_seconds {
        config.cache_ttl = Duration::from_secs(seconds);
    }
    if let Some(entries) = args.cache_max_entries {
        config.cache_max_entries = entries;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.upstream_timeout = Duration::from_millis(timeout_ms);
    }
    if let Some(max_retries) = args.max_retries {
        config.retry = match max_retries {
            0 => RetryConfig::no_retry(),
            n => RetryConfig::exponential(n),
        };
    }
    config
}
