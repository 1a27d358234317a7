//! # Solvency Core
//!
//! Orchestration gateway for loan solvency verification.
//!
//! ## Overview
//!
//! A single operation, `VerifySolvency(subject_id)`, fans out to three read-only directory
//! lookups, scores and decides on the results, and returns a report with three plain-language
//! explanations. Around that core the crate provides:
//!
//! - **Bounded TTL cache** with LRU eviction and lazy expiry
//! - **Upstream client** with per-attempt deadlines and bounded retries
//! - **Fault translator** normalizing collaborator failures to two client-visible kinds
//! - **Metrics recorder** on a Prometheus registry with per-operation latency histograms,
//!   cache counters and a text exposition export
//! - **Correlation ids** on every log event and fault
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Directory implementations (in-memory fixtures, HTTP) |
//! | [`cache`] | TTL + LRU cache |
//! | [`clock`] | Injectable monotonic clock |
//! | [`config`] | Gateway configuration and environment loading |
//! | [`context`] | Correlation id and per-request context |
//! | [`directory`] | Directory trait and raw upstream faults |
//! | [`domain`] | Subject ids, records, scores and reports |
//! | [`error`] | Validation and configuration errors |
//! | [`fault`] | Client-facing faults and the translator |
//! | [`gateway`] | Request state machine and builder |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`metrics`] | Request and cache metrics |
//! | [`retry`] | Retry policy and backoff |
//! | [`rules`] | Scoring, decision and explanation rules |
//! | [`upstream`] | Timed, retried directory calls |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use solvency_core::{InMemoryDirectory, SolvencyGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = SolvencyGateway::builder()
//!         .directory(Arc::new(InMemoryDirectory::with_fixtures()))
//!         .build()?;
//!
//!     let report = gateway.verify_solvency("client-001").await?;
//!     println!("{} -> {}", report.credit_score, report.solvency_status);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ SolvencyGateway │────▶│ TtlLruCache      │
//! │ (state machine) │     │ MetricsRecorder  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ UpstreamClient  │────▶│ SubjectDirectory │
//! │ (deadline/retry)│     │ (memory / http)  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ FaultTranslator │
//! │ SolvencyRules   │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Callers only ever see two fault kinds:
//!
//! ```rust
//! use solvency_core::{Fault, FaultKind};
//!
//! fn describe(fault: &Fault) -> String {
//!     match &fault.kind {
//!         FaultKind::NotFound { subject } => format!("{subject} is unknown"),
//!         FaultKind::ValidationError { reason } => format!("rejected: {reason}"),
//!     }
//! }
//! ```

pub mod adapters;
pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod directory;
pub mod domain;
pub mod error;
pub mod fault;
pub mod gateway;
pub mod http_client;
mod inflight;
pub mod metrics;
pub mod retry;
pub mod rules;
pub mod upstream;

// Directory implementations
pub use adapters::{DirectoryEntry, HttpDirectory, InMemoryDirectory};

// Caching
pub use cache::{CacheStats, TtlLruCache, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use clock::{Clock, ManualClock, SystemClock};

// Configuration
pub use config::GatewayConfig;

// Correlation
pub use context::{CorrelationContext, CorrelationId};

// Directory contract
pub use directory::{
    LookupFuture, LookupRequest, SubjectDirectory, UpstreamFault, UpstreamFaultKind,
    NOT_FOUND_CODE, VALIDATION_CODE,
};

// Domain models
pub use domain::{
    CacheKey, CashFlowBand, CategoryRecord, ClientIdentity, CreditHistory, CreditScore,
    DataCategory, Explanations, Financials, ScoreBand, SolvencyReport, SolvencyStatus, SubjectId,
    SubjectRecord, MAX_CREDIT_SCORE,
};

// Error types
pub use error::{ConfigError, ValidationError};

// Faults
pub use fault::{Fault, FaultKind, FaultTranslator, UPSTREAM_UNAVAILABLE_REASON};

// Gateway
pub use gateway::{
    RecordCache, SolvencyGateway, SolvencyGatewayBuilder, Stage, Verification, VERIFY_OPERATION,
};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

// Metrics
pub use metrics::{
    CacheCounters, CacheEvent, HistogramBucket, MetricsRecorder, MetricsSnapshot,
    OperationSnapshot, Outcome, LATENCY_BUCKETS_SECONDS,
};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Rules
pub use rules::{SolvencyRules, StandardRules, SOLVENT_SCORE_THRESHOLD};

// Upstream client
pub use upstream::{Timed, UpstreamCall, UpstreamClient, DEFAULT_UPSTREAM_TIMEOUT};
