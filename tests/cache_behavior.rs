//! Behavior-driven tests for the record cache.
//!
//! Covers bounded capacity, LRU eviction order, TTL expiry on a manual
//! clock, counter accuracy under concurrency and cache reuse by the gateway.

mod support;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use solvency_core::{DataCategory, GatewayConfig, ManualClock, TtlLruCache};
use support::{fast_config, gateway_with_clock, CountingDirectory};

fn cache_on(clock: &Arc<ManualClock>, ttl: Duration, capacity: usize) -> TtlLruCache<String, u32> {
    TtlLruCache::with_clock(ttl, capacity, clock.clone())
}

// =============================================================================
// Capacity and eviction
// =============================================================================

#[test]
fn when_capacity_is_exceeded_then_least_recently_used_entry_is_evicted() {
    // Given: A full cache of three entries
    let clock = Arc::new(ManualClock::new());
    let cache = cache_on(&clock, Duration::from_secs(60), 3);
    for (index, key) in ["a", "b", "c"].into_iter().enumerate() {
        cache.put(key.to_string(), index as u32);
    }

    // When: A fourth entry is inserted
    let evicted = cache.put("d".to_string(), 3);

    // Then: The oldest entry is gone and the size stays at capacity
    assert_eq!(evicted, 1);
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get(&"a".to_string()), None);
    assert_eq!(cache.get(&"d".to_string()), Some(3));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn when_entry_is_read_then_it_survives_the_next_eviction() {
    // Given: A full cache where the oldest entry was just read
    let clock = Arc::new(ManualClock::new());
    let cache = cache_on(&clock, Duration::from_secs(60), 2);
    cache.put("a".to_string(), 1);
    cache.put("b".to_string(), 2);
    assert_eq!(cache.get(&"a".to_string()), Some(1));

    // When: A new entry forces an eviction
    cache.put("c".to_string(), 3);

    // Then: The untouched entry is evicted instead
    assert_eq!(cache.get(&"b".to_string()), None);
    assert_eq!(cache.get(&"a".to_string()), Some(1));
    assert_eq!(cache.get(&"c".to_string()), Some(3));
}

#[test]
fn when_key_is_replaced_then_size_is_unchanged_and_value_is_updated() {
    // Given: A cache with one entry
    let clock = Arc::new(ManualClock::new());
    let cache = cache_on(&clock, Duration::from_secs(60), 2);
    cache.put("a".to_string(), 1);

    // When: The same key is written again
    let evicted = cache.put("a".to_string(), 2);

    // Then: No eviction and the newest value wins
    assert_eq!(evicted, 0);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&"a".to_string()), Some(2));
}

// =============================================================================
// TTL expiry
// =============================================================================

#[test]
fn when_ttl_elapses_then_entry_expires_exactly_at_the_boundary() {
    // Given: An entry with a ten-second TTL
    let clock = Arc::new(ManualClock::new());
    let cache = cache_on(&clock, Duration::from_secs(10), 4);
    cache.put("a".to_string(), 1);

    // When: Time advances to just before the TTL
    clock.advance(Duration::from_millis(9_999));

    // Then: The entry is still served
    assert_eq!(cache.get(&"a".to_string()), Some(1));

    // When: Time reaches the TTL
    clock.advance(Duration::from_millis(1));

    // Then: The entry is expired, removed and counted as a miss
    assert_eq!(cache.get(&"a".to_string()), None);
    assert!(cache.is_empty());
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[test]
fn when_entry_is_read_then_its_ttl_is_not_extended() {
    // Given: An entry read halfway through its TTL
    let clock = Arc::new(ManualClock::new());
    let cache = cache_on(&clock, Duration::from_secs(10), 4);
    cache.put("a".to_string(), 1);
    clock.advance(Duration::from_secs(5));
    assert_eq!(cache.get(&"a".to_string()), Some(1));

    // When: The original TTL elapses
    clock.advance(Duration::from_secs(5));

    // Then: The read did not refresh the expiry
    assert_eq!(cache.get(&"a".to_string()), None);
}

#[tokio::test]
async fn when_cached_records_expire_then_gateway_fetches_again() {
    // Given: A gateway with a one-minute TTL on a manual clock and a warm cache
    let directory = Arc::new(CountingDirectory::new());
    let config = GatewayConfig {
        cache_ttl: Duration::from_secs(60),
        ..fast_config()
    };
    let (gateway, clock) = gateway_with_clock(config, directory.clone());
    gateway.verify("client-001").await;

    // When: The TTL passes and the subject is verified again
    clock.advance(Duration::from_secs(60));
    let verification = gateway.verify("client-001").await;

    // Then: All three categories are fetched a second time
    assert!(verification.is_success());
    assert_eq!((verification.cache_hits, verification.cache_misses), (0, 3));
    for category in DataCategory::ALL {
        assert_eq!(directory.calls(category), 2);
    }
}

#[tokio::test]
async fn when_ttl_exceeds_the_clock_range_then_records_are_cached_without_expiry() {
    // Given: A gateway configured from the largest TTL the environment accepts
    let config = GatewayConfig::from_lookup(|name| {
        (name == "SOLVENCY_CACHE_TTL_SECONDS").then(|| u64::MAX.to_string())
    })
    .expect("huge TTL is accepted");
    let directory = Arc::new(CountingDirectory::new());
    let (gateway, clock) = gateway_with_clock(
        GatewayConfig {
            upstream_timeout: fast_config().upstream_timeout,
            ..config
        },
        directory.clone(),
    );

    // When: The subject is verified, a long time passes and it is verified again
    let first = gateway.verify("client-001").await;
    clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
    let second = gateway.verify("client-001").await;

    // Then: Neither request panics and the second is served entirely from cache
    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!((second.cache_hits, second.cache_misses), (3, 0));
    assert_eq!(directory.total_calls(), 3);
}

#[tokio::test]
async fn when_gateway_cache_is_small_then_other_subjects_evict_old_records() {
    // Given: A gateway that can hold one subject's three records
    let directory = Arc::new(CountingDirectory::new());
    let config = GatewayConfig {
        cache_max_entries: 3,
        ..fast_config()
    };
    let (gateway, _clock) = gateway_with_clock(config, directory.clone());
    gateway.verify("client-001").await;

    // When: A second subject is verified
    gateway.verify("client-002").await;

    // Then: The cache stays bounded and the first subject must be refetched
    assert_eq!(gateway.cache_stats().size, 3);
    assert_eq!(gateway.cache_stats().evictions, 3);
    let again = gateway.verify("client-001").await;
    assert_eq!(again.cache_misses, 3);
    assert_eq!(gateway.metrics_snapshot().cache.evictions, 6);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn when_many_threads_read_concurrently_then_hits_plus_misses_equals_reads() {
    // Given: A shared cache holding half of the keys
    let clock = Arc::new(ManualClock::new());
    let cache = cache_on(&clock, Duration::from_secs(60), 64);
    for key in 0..16u32 {
        cache.put(format!("key-{key}"), key);
    }

    // When: Eight threads each perform 500 reads across present and absent keys
    let threads = 8;
    let reads_per_thread = 500;
    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            let cache = cache.clone();
            thread::spawn(move || {
                for read in 0..reads_per_thread {
                    let key = format!("key-{}", (worker * 7 + read) % 32);
                    let _ = cache.get(&key);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("reader thread panicked");
    }

    // Then: Every read was counted exactly once
    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, (threads * reads_per_thread) as u64);
    assert!(stats.hits > 0 && stats.misses > 0);
    assert_eq!(stats.size, 16);
}

#[test]
fn when_writers_race_past_capacity_then_size_never_exceeds_the_bound() {
    // Given: A small shared cache
    let clock = Arc::new(ManualClock::new());
    let cache = cache_on(&clock, Duration::from_secs(60), 10);

    // When: Four threads insert distinct keys concurrently
    let handles: Vec<_> = (0..4u32)
        .map(|worker| {
            let cache = cache.clone();
            thread::spawn(move || {
                for item in 0..100u32 {
                    cache.put(format!("w{worker}-{item}"), item);
                    assert!(cache.len() <= 10);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread panicked");
    }

    // Then: The cache is full and every surplus insert was evicted
    let stats = cache.stats();
    assert_eq!(stats.size, 10);
    assert_eq!(stats.evictions, 390);
}
