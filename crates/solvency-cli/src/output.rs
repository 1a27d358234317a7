use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::CliError;

/// Machine-readable response written to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub meta: EnvelopeMeta,
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeMeta {
    pub request_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSummary>,
}

impl EnvelopeMeta {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            generated_at: OffsetDateTime::now_utc(),
            latency_ms,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: CacheSummary) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Cache counters for this invocation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheSummary {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
}

/// One failed verification.
#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    pub subject_id: String,
    pub correlation_id: String,
}

pub fn render(envelope: &Envelope, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    println!("{payload}");
    Ok(())
}
