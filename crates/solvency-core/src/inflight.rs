//! Per-key deduplication of concurrent upstream lookups.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

use crate::directory::UpstreamFault;
use crate::{CacheKey, SubjectRecord};

type LookupResult = Result<SubjectRecord, UpstreamFault>;

/// Outcome of joining a flight.
#[derive(Debug)]
pub(crate) struct Flight {
    pub result: LookupResult,
    /// `true` for the caller that actually ran the lookup.
    pub leader: bool,
}

/// Single-flight table: at most one lookup per key runs at a time, later callers
/// wait for it and share its result.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    calls: Mutex<HashMap<CacheKey, Arc<OnceCell<LookupResult>>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, Fut>(&self, key: &CacheKey, lookup: F) -> Flight
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LookupResult>,
    {
        let cell = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                calls
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let mut leader = false;
        let ran = &mut leader;
        let result = cell
            .get_or_init(|| async move {
                *ran = true;
                lookup().await
            })
            .await
            .clone();

        {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            if calls
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
            {
                calls.remove(key);
            }
        }

        Flight { result, leader }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
