use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep, Instant};
use uuid::Uuid;

use crate::config::model::{Pattern, RunLength, TestConfig};
use crate::config::validation::ensure_valid;
use crate::engine::aggregator::{run_stats, time_series};
use crate::engine::executor::RequestExecutor;
use crate::engine::limiter::Limiter;
use crate::engine::pattern::{plan_phases, Phase, PhaseKind};
use crate::engine::progress::{snapshot, ProgressObserver};
use crate::error::SurgeError;
use crate::http::transport::{Transport, TransportRequest};
use crate::results::{CompletedRun, RequestResult, TestRunResult};

// ---------------------------------------------------------------------------
// RunState: the mutable run log
// ---------------------------------------------------------------------------

/// The run log while a run is in progress. Owned by exactly one scheduler.
pub(crate) struct RunState {
    started_at: DateTime<Utc>,
    clock: Instant,
    /// Results in completion order.
    log: Vec<RequestResult>,
    /// First index of the next phase.
    next_index: u64,
}

impl RunState {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            clock: Instant::now(),
            log: Vec::new(),
            next_index: 0,
        }
    }

    fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    fn append(&mut self, result: RequestResult) {
        self.log.push(result);
    }

    /// Freeze the log into a [`CompletedRun`] with results in index order.
    fn freeze(mut self) -> CompletedRun {
        let wall_time = self.clock.elapsed();
        self.log.sort_by_key(|r| r.index);
        CompletedRun {
            started_at: self.started_at,
            finished_at: Utc::now(),
            wall_time_ms: wall_time.as_millis() as u64,
            results: self.log,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Drives one run: splits it into phases according to the configured
/// pattern and pushes each phase through a fresh [`Limiter`].
pub struct Scheduler {
    config: TestConfig,
    executor: Arc<RequestExecutor>,
    observer: Option<Box<dyn ProgressObserver>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl Scheduler {
    /// Validate `config` and prepare a run. Nothing is dispatched on error.
    pub fn new(config: TestConfig, transport: Arc<dyn Transport>) -> Result<Self, SurgeError> {
        ensure_valid(&config)?;
        let request = TransportRequest::from_config(&config);
        Ok(Self {
            config,
            executor: Arc::new(RequestExecutor::new(transport, request)),
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Execute every phase and return the frozen run.
    pub async fn run(self) -> Result<CompletedRun, SurgeError> {
        let mut state = RunState::new();

        tracing::info!(
            name = %self.config.name,
            url = %self.config.target,
            pattern = %self.config.pattern,
            concurrency = self.config.concurrency,
            "Starting load test"
        );

        match self.config.length {
            RunLength::Requests { total } => {
                let phases = plan_phases(
                    &self.config.pattern,
                    self.config.concurrency,
                    total,
                    self.config.delay(),
                );
                tracing::debug!(
                    total,
                    phases = phases.len(),
                    "Planned {} phases",
                    self.config.pattern
                );
                if let Pattern::RampUp { .. } = self.config.pattern {
                    let planned: u64 = phases.iter().map(|p| p.size).sum();
                    if planned < total {
                        tracing::warn!(
                            total,
                            planned,
                            "ramp-up reaches its end concurrency before the request total"
                        );
                    }
                }

                for phase in &phases {
                    self.run_phase(phase, &mut state).await?;
                    self.report(phase, &state);
                    if !phase.pause_after.is_zero() {
                        sleep(phase.pause_after).await;
                    }
                }
            }
            RunLength::Duration { seconds } => {
                let budget = Duration::from_secs(seconds);
                let concurrency = self.config.concurrency as usize;
                let delay = self.config.delay();
                let mut ordinal = 0;

                while state.elapsed() < budget {
                    ordinal += 1;
                    let mut phase = Phase::new(
                        PhaseKind::Sustained,
                        concurrency.max(1) as u64,
                        concurrency,
                        delay,
                    );
                    phase.ordinal = ordinal;

                    self.run_phase(&phase, &mut state).await?;
                    self.report(&phase, &state);
                    if state.elapsed() >= budget {
                        break;
                    }
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }

        let run = state.freeze();
        tracing::info!(
            requests = run.results.len(),
            wall_time_ms = run.wall_time_ms,
            "Load test completed"
        );
        Ok(run)
    }

    /// Dispatch one phase and wait for every request in it.
    ///
    /// Permits are acquired in index order, so dispatch follows index order;
    /// completions are appended as they arrive.
    async fn run_phase(&self, phase: &Phase, state: &mut RunState) -> Result<(), SurgeError> {
        let limiter = Limiter::new(phase.concurrency);
        let first = state.next_index;
        let end = first + phase.size;

        tracing::debug!(
            phase = %phase.label(),
            size = phase.size,
            concurrency = limiter.capacity(),
            first_index = first,
            "Dispatching phase"
        );

        let mut in_flight: JoinSet<RequestResult> = JoinSet::new();
        for index in first..end {
            let permit = limiter.acquire().await?;
            let executor = Arc::clone(&self.executor);
            in_flight.spawn(async move {
                let result = executor.make_request(index).await;
                permit.release();
                result
            });

            while let Some(joined) = in_flight.try_join_next() {
                state.append(joined.map_err(task_failed)?);
            }
        }
        state.next_index = end;

        while let Some(joined) = in_flight.join_next().await {
            state.append(joined.map_err(task_failed)?);
        }

        Ok(())
    }

    fn report(&self, phase: &Phase, state: &RunState) {
        let Some(observer) = &self.observer else {
            return;
        };
        let snap = snapshot(
            &state.log,
            phase.label(),
            &self.config.length,
            state.elapsed(),
        );
        observer.on_progress(&snap);
    }
}

fn task_failed(err: JoinError) -> SurgeError {
    tracing::error!("Engine error: request task failed: {err}");
    SurgeError::Engine(format!("request task failed: {err}"))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run a load test to completion and assemble everything a reporter needs.
///
/// Only configuration errors (and engine faults) are returned as `Err`;
/// request failures are part of the returned results.
pub async fn run_test(
    config: TestConfig,
    transport: Arc<dyn Transport>,
    observer: Option<Box<dyn ProgressObserver>>,
) -> Result<TestRunResult, SurgeError> {
    let mut scheduler = Scheduler::new(config.clone(), transport)?;
    scheduler.observer = observer;

    let run = scheduler.run().await?;
    let stats = run_stats(&run);
    let time_series = time_series(&run);

    Ok(TestRunResult {
        run_id: Uuid::new_v4(),
        config,
        started_at: run.started_at,
        finished_at: run.finished_at,
        stats,
        time_series,
        results: run.results,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::progress::ProgressSnapshot;
    use crate::http::transport::{TransportError, TransportResponse};
    use crate::results::Outcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Each call sleeps a little less than the previous one within a cycle of
    /// ten, so completions arrive out of dispatch order.
    struct JitterTransport {
        calls: AtomicU64,
    }

    #[async_trait]
    impl Transport for JitterTransport {
        async fn send(
            &self,
            _request: &TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(10 - n % 10)).await;
            Ok(TransportResponse {
                status: 200,
                ..Default::default()
            })
        }
    }

    fn jitter() -> Arc<dyn Transport> {
        Arc::new(JitterTransport {
            calls: AtomicU64::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_frozen_in_index_order() {
        let config = TestConfig::new("http://localhost", 10, 50);
        let run = Scheduler::new(config, jitter()).unwrap().run().await.unwrap();
        let indices: Vec<u64> = run.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_is_rejected_before_dispatch() {
        let transport = Arc::new(JitterTransport {
            calls: AtomicU64::new(0),
        });
        let config = TestConfig::new("http://localhost", 0, 10);
        let err = Scheduler::new(config, transport.clone()).expect_err("should reject");
        assert!(matches!(err, SurgeError::Config(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_is_called_once_per_phase() {
        let seen: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = TestConfig::new("http://localhost", 4, 10).with_pattern(Pattern::Sustained);

        Scheduler::new(config, jitter())
            .unwrap()
            .with_observer(move |s: &ProgressSnapshot| sink.lock().unwrap().push(s.clone()))
            .run()
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let completed: Vec<u64> = seen.iter().map(|s| s.completed).collect();
        assert_eq!(completed, vec![4, 8, 10]);
        assert_eq!(seen[0].phase, "sustained 1");
        assert_eq!(seen[2].phase, "sustained 3");
        assert!((seen[2].percentage - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_delay_is_only_between_phases() {
        let config = TestConfig::new("http://localhost", 5, 15)
            .with_pattern(Pattern::Sustained)
            .with_delay_ms(1000);
        let start = Instant::now();
        Scheduler::new(config, jitter()).unwrap().run().await.unwrap();
        let elapsed = start.elapsed();
        // Two pauses between three phases, plus at most 10ms per phase.
        assert!(elapsed >= Duration::from_millis(2000));
        assert!(elapsed < Duration::from_millis(2100), "took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn duration_run_keeps_dispatching_until_budget() {
        struct Slow;
        #[async_trait]
        impl Transport for Slow {
            async fn send(
                &self,
                _request: &TransportRequest,
            ) -> Result<TransportResponse, TransportError> {
                sleep(Duration::from_millis(100)).await;
                Ok(TransportResponse {
                    status: 204,
                    ..Default::default()
                })
            }
        }

        let config = TestConfig::new("http://localhost", 2, 1)
            .with_pattern(Pattern::Sustained)
            .with_duration_secs(1);
        let run = Scheduler::new(config, Arc::new(Slow))
            .unwrap()
            .run()
            .await
            .unwrap();

        // 10 phases of 100ms, 2 requests each.
        assert_eq!(run.results.len(), 20);
        let indices: Vec<u64> = run.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..20).collect::<Vec<_>>());
        assert!(run.wall_time() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn run_test_assembles_stats_and_results() {
        let config = TestConfig::new("http://localhost", 3, 9).with_pattern(Pattern::Wave);
        let result = run_test(config.clone(), jitter(), None).await.unwrap();

        assert_eq!(result.config, config);
        assert_eq!(result.results.len(), 9);
        assert_eq!(result.stats.total_requests, 9);
        assert_eq!(result.stats.successful_requests, 9);
        assert_eq!(result.stats.status_code_distribution[&200], 9);
        assert!(result
            .results
            .iter()
            .all(|r| r.outcome == Outcome::Response { status: 200 }));
        assert!(result.finished_at >= result.started_at);
    }
}
