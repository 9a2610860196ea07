//! End-to-end properties of the attack patterns, driven through an
//! instrumented in-process transport on a paused clock.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use surge_core::engine::Limiter;
use surge_core::http::{
    Transport, TransportError, TransportErrorKind, TransportRequest, TransportResponse,
};
use surge_core::{run_test, Pattern, SurgeError, TestConfig};
use tokio::time::{sleep, Instant};

/// Records when each call started and how many calls were open at that moment.
struct Recorder {
    latency: Duration,
    fail_with: Option<TransportErrorKind>,
    open: AtomicUsize,
    calls: Mutex<Vec<(Instant, usize)>>,
}

impl Recorder {
    fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            fail_with: None,
            open: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing(kind: TransportErrorKind) -> Arc<Self> {
        Arc::new(Self {
            latency: Duration::from_millis(5),
            fail_with: Some(kind),
            open: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn peak_open(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, open)| *open)
            .max()
            .unwrap_or(0)
    }

    /// Number of calls started at each distinct instant.
    fn starts(&self) -> BTreeMap<Instant, usize> {
        let mut out = BTreeMap::new();
        for (at, _) in self.calls.lock().unwrap().iter() {
            *out.entry(*at).or_insert(0) += 1;
        }
        out
    }
}

#[async_trait]
impl Transport for Recorder {
    async fn send(&self, _request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().unwrap().push((Instant::now(), open));
        sleep(self.latency).await;
        self.open.fetch_sub(1, Ordering::SeqCst);

        match self.fail_with {
            Some(kind) => Err(TransportError::new(kind, "injected failure")),
            None => Ok(TransportResponse {
                status: 200,
                body: b"ok".to_vec(),
                ..Default::default()
            }),
        }
    }
}

fn ramp(start: u32, end: u32, step: u32, ramp_up_time_ms: u64) -> Pattern {
    Pattern::RampUp {
        start_concurrency: start,
        end_concurrency: end,
        step,
        ramp_up_time_ms,
    }
}

async fn assert_complete_index_set(pattern: Pattern, concurrency: u32, total: u64, expected: u64) {
    let transport = Recorder::new(Duration::from_millis(3));
    let config = TestConfig::new("http://localhost:9", concurrency, total).with_pattern(pattern);
    let result = run_test(config, transport.clone(), None)
        .await
        .expect("run should complete");

    let indices: Vec<u64> = result.results.iter().map(|r| r.index).collect();
    assert_eq!(
        indices,
        (0..expected).collect::<Vec<_>>(),
        "{pattern} produced a gapped or duplicated index set"
    );
    assert_eq!(transport.call_count() as u64, expected);
    assert_eq!(result.stats.total_requests, expected);
}

#[tokio::test(start_paused = true)]
async fn every_pattern_covers_each_index_exactly_once() {
    assert_complete_index_set(Pattern::Burst, 10, 103, 103).await;
    assert_complete_index_set(Pattern::Sustained, 10, 103, 103).await;
    assert_complete_index_set(Pattern::Wave, 10, 103, 103).await;
    assert_complete_index_set(Pattern::Spike, 10, 103, 103).await;
    // Plateaus of 2, 4, 6 then a short final one of 3.
    assert_complete_index_set(ramp(2, 8, 2, 300), 8, 15, 15).await;
}

#[tokio::test(start_paused = true)]
async fn ramp_up_finishes_early_when_plateaus_run_out() {
    // Plateaus 2 + 4 + 6 + 8 = 20, well short of the requested total.
    assert_complete_index_set(ramp(2, 8, 2, 300), 8, 1000, 20).await;
}

#[tokio::test(start_paused = true)]
async fn single_lane_sustained_run_is_serial() {
    let transport = Recorder::new(Duration::from_millis(50));
    let config = TestConfig::new("http://localhost:9", 1, 10).with_pattern(Pattern::Sustained);

    let start = Instant::now();
    let result = run_test(config, transport.clone(), None).await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(500));
    assert!(result.stats.wall_time_ms >= 500);
    assert_eq!(transport.peak_open(), 1);
}

#[tokio::test(start_paused = true)]
async fn uniform_failures_collapse_into_one_error_key() {
    let transport = Recorder::failing(TransportErrorKind::ConnectionRefused);
    let config = TestConfig::new("http://localhost:9", 4, 40);
    let result = run_test(config, transport, None).await.unwrap();

    let stats = &result.stats;
    assert_eq!(stats.success_rate, 0.0);
    assert_eq!(stats.failed_requests, 40);
    assert_eq!(stats.error_distribution.len(), 1);
    assert_eq!(stats.error_distribution["ECONNREFUSED"], 40);
    assert!(stats.status_code_distribution.is_empty());
    assert!(result.results.iter().all(|r| r.status_code().is_none()));
}

#[tokio::test(start_paused = true)]
async fn ramp_up_climbs_through_every_plateau() {
    let transport = Recorder::new(Duration::from_millis(10));
    // 10 + 20 + ... + 100 = 550 requests sustain every plateau.
    let config = TestConfig::new("http://localhost:9", 100, 550).with_pattern(ramp(10, 100, 10, 9000));
    let result = run_test(config, transport.clone(), None).await.unwrap();
    assert_eq!(result.results.len(), 550);

    let starts = transport.starts();
    let counts: Vec<usize> = starts.values().copied().collect();
    assert_eq!(counts, (1..=10).map(|n| n * 10).collect::<Vec<_>>());

    let instants: Vec<Instant> = starts.keys().copied().collect();
    for pair in instants.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= Duration::from_millis(1000) && gap < Duration::from_millis(1100),
            "plateaus {gap:?} apart"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn spike_runs_a_reduced_phase_then_full_concurrency() {
    let transport = Recorder::new(Duration::from_millis(10));
    let config = TestConfig::new("http://localhost:9", 50, 100).with_pattern(Pattern::Spike);

    let start = Instant::now();
    run_test(config, transport.clone(), None).await.unwrap();

    let calls = transport.calls.lock().unwrap().clone();
    let (normal, spike): (Vec<_>, Vec<_>) = calls
        .iter()
        .partition(|(at, _)| *at - start < Duration::from_millis(1000));

    assert_eq!(normal.len(), 80);
    assert_eq!(spike.len(), 20);
    assert_eq!(normal.iter().map(|(_, open)| *open).max(), Some(15));
    assert_eq!(spike.iter().map(|(_, open)| *open).max(), Some(20));
}

#[tokio::test(start_paused = true)]
async fn burst_never_exceeds_its_concurrency() {
    let transport = Recorder::new(Duration::from_millis(7));
    let config = TestConfig::new("http://localhost:9", 8, 200);
    run_test(config, transport.clone(), None).await.unwrap();

    assert_eq!(transport.call_count(), 200);
    assert_eq!(transport.peak_open(), 8);
}

#[tokio::test(start_paused = true)]
async fn configuration_errors_send_nothing() {
    let transport = Recorder::new(Duration::from_millis(1));

    let bad_ramp = TestConfig::new("http://localhost:9", 10, 100).with_pattern(ramp(50, 20, 10, 1000));
    let err = run_test(bad_ramp, transport.clone(), None).await.unwrap_err();
    assert!(matches!(err, SurgeError::Config(_)));

    let timed_burst = TestConfig::new("http://localhost:9", 10, 100).with_duration_secs(5);
    let err = run_test(timed_burst, transport.clone(), None).await.unwrap_err();
    assert!(matches!(err, SurgeError::Config(_)));

    let no_target = TestConfig::new("", 10, 100);
    assert!(run_test(no_target, transport.clone(), None).await.is_err());

    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn limiter_serves_waiters_in_arrival_order() {
    let limiter = Arc::new(Limiter::new(1));
    let held = limiter.acquire().await.unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..4 {
        let task_limiter = Arc::clone(&limiter);
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            let permit = task_limiter.acquire().await.unwrap();
            order.lock().unwrap().push(id);
            sleep(Duration::from_millis(1)).await;
            drop(permit);
        }));
        // Let each waiter enqueue before the next one is spawned.
        while limiter.waiting() < id + 1 {
            tokio::task::yield_now().await;
        }
    }
    assert_eq!(limiter.waiting(), 4);

    drop(held);
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);

    let distinct: HashSet<_> = order.lock().unwrap().iter().copied().collect();
    assert_eq!(distinct.len(), 4);
    assert_eq!(limiter.available(), 1);
}
