mod fixtures;
mod verify;

use std::time::Instant;

use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::{CacheSummary, Envelope, EnvelopeError, EnvelopeMeta};

pub struct CommandResult {
    pub data: Value,
    pub errors: Vec<EnvelopeError>,
    pub cache: Option<CacheSummary>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
            cache: None,
        }
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_cache(mut self, cache: CacheSummary) -> Self {
        self.cache = Some(cache);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope, CliError> {
    let started = Instant::now();

    let result = match &cli.command {
        Command::Verify(args) => verify::run(args).await?,
        Command::Fixtures => fixtures::run()?,
    };

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let mut meta = EnvelopeMeta::new(latency_ms);
    if let Some(cache) = result.cache {
        meta = meta.with_cache(cache);
    }

    Ok(Envelope {
        meta,
        data: result.data,
        errors: result.errors,
    })
}
