//! Shared doubles for the gateway integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use solvency_core::{
    DataCategory, GatewayConfig, InMemoryDirectory, LookupFuture, LookupRequest, ManualClock,
    RetryConfig, SolvencyGateway, SubjectDirectory, UpstreamFault,
};

const fn slot(category: DataCategory) -> usize {
    match category {
        DataCategory::Identity => 0,
        DataCategory::Financials => 1,
        DataCategory::History => 2,
    }
}

/// Fixture directory that counts lookups per category and can inject latency.
pub struct CountingDirectory {
    inner: InMemoryDirectory,
    calls: [AtomicU32; 3],
    delay: Duration,
}

impl CountingDirectory {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            inner: InMemoryDirectory::with_fixtures(),
            calls: [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)],
            delay,
        }
    }

    pub fn calls(&self, category: DataCategory) -> u32 {
        self.calls[slot(category)].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u32 {
        DataCategory::ALL
            .into_iter()
            .map(|category| self.calls(category))
            .sum()
    }
}

impl SubjectDirectory for CountingDirectory {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn lookup<'a>(&'a self, req: LookupRequest) -> LookupFuture<'a> {
        Box::pin(async move {
            self.calls[slot(req.category)].fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.lookup(req).await
        })
    }
}

/// Fails lookups of one category with a scripted fault sequence, then delegates.
pub struct ScriptedDirectory {
    inner: InMemoryDirectory,
    category: DataCategory,
    faults: Mutex<Vec<UpstreamFault>>,
    calls: AtomicU32,
}

impl ScriptedDirectory {
    /// `faults` are returned in order for `category`; later calls succeed.
    pub fn new(category: DataCategory, faults: Vec<UpstreamFault>) -> Self {
        let mut faults = faults;
        faults.reverse();
        Self {
            inner: InMemoryDirectory::with_fixtures(),
            category,
            faults: Mutex::new(faults),
            calls: AtomicU32::new(0),
        }
    }

    /// Fails every lookup of `category` with `fault`.
    pub fn always(category: DataCategory, fault: UpstreamFault) -> Self {
        Self::new(category, vec![fault; 64])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SubjectDirectory for ScriptedDirectory {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn lookup<'a>(&'a self, req: LookupRequest) -> LookupFuture<'a> {
        Box::pin(async move {
            if req.category == self.category {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let next = self
                    .faults
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop();
                if let Some(fault) = next {
                    return Err(fault);
                }
            }
            self.inner.lookup(req).await
        })
    }
}

/// Never answers lookups of one category.
pub struct StalledDirectory {
    inner: InMemoryDirectory,
    category: DataCategory,
}

impl StalledDirectory {
    pub fn new(category: DataCategory) -> Self {
        Self {
            inner: InMemoryDirectory::with_fixtures(),
            category,
        }
    }
}

impl SubjectDirectory for StalledDirectory {
    fn name(&self) -> &'static str {
        "stalled"
    }

    fn lookup<'a>(&'a self, req: LookupRequest) -> LookupFuture<'a> {
        Box::pin(async move {
            if req.category == self.category {
                std::future::pending::<()>().await;
            }
            self.inner.lookup(req).await
        })
    }
}

/// Config with fast, deterministic upstream behavior.
pub fn fast_config() -> GatewayConfig {
    GatewayConfig {
        upstream_timeout: Duration::from_millis(50),
        retry: RetryConfig::fixed(Duration::from_millis(1), 2),
        ..GatewayConfig::default()
    }
}

pub fn gateway_with(directory: Arc<dyn SubjectDirectory>) -> SolvencyGateway {
    SolvencyGateway::builder()
        .config(fast_config())
        .directory(directory)
        .build()
        .expect("test config is valid")
}

/// Gateway whose cache runs on a manually advanced clock.
pub fn gateway_with_clock(
    config: GatewayConfig,
    directory: Arc<dyn SubjectDirectory>,
) -> (SolvencyGateway, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let gateway = SolvencyGateway::builder()
        .config(config)
        .directory(directory)
        .clock(clock.clone())
        .build()
        .expect("test config is valid");
    (gateway, clock)
}
