//! Rule Scheduler - periodic engine ticks
//!
//! The first tick fires after `initial_delay`, then every `period`. A tick that
//! is still running when the timer fires again makes the scheduler skip that
//! cycle rather than queue behind it.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{RuleEngine, DEFAULT_EVALUATOR_TIMEOUT};

/// Default period between ticks (5 minutes)
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(300);

/// Default warm-up before the first tick
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(3);

/// Timer configuration for `RuleEngine::start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchedule {
    pub period: Duration,
    pub initial_delay: Duration,
    pub evaluator_timeout: Duration,
}

impl Default for TickSchedule {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            initial_delay: DEFAULT_INITIAL_DELAY,
            evaluator_timeout: DEFAULT_EVALUATOR_TIMEOUT,
        }
    }
}

impl RuleEngine {
    /// Spawn the scheduler loop
    ///
    /// Returns `None` if the scheduler is already running.
    pub fn start(self: &Arc<Self>, schedule: TickSchedule) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return None;
        }

        self.set_evaluator_timeout(schedule.evaluator_timeout);
        info!(
            "Starting rule scheduler: first tick in {:?}, then every {:?}",
            schedule.initial_delay, schedule.period
        );

        let engine = Arc::clone(self);
        Some(tokio::spawn(async move {
            engine.run_loop(schedule).await;
        }))
    }

    async fn run_loop(&self, schedule: TickSchedule) {
        // interval_at panics on a zero period
        let period = schedule.period.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + schedule.initial_delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.try_tick().await {
                        Some(report) => debug!(
                            "Scheduled tick: {} evaluated, {} accepted",
                            report.rules_evaluated(),
                            report.accepted()
                        ),
                        None => debug!("Previous tick still running, skipped"),
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Rule scheduler stopped");
    }

    /// Stop the scheduler
    ///
    /// An in-flight tick finishes before the loop exits.
    pub fn stop(&self) {
        if !self.is_running() {
            return;
        }
        info!("Stopping rule scheduler...");
        self.shutdown.notify_one();
    }

    /// Check if scheduler is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::Result;
    use crate::evaluators::{Evaluator, EvaluatorSet};
    use crate::notify::RecordingSink;
    use crate::types::{Candidate, NewRule, Rule, RuleKind};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::AtomicUsize;
    use tracing_test::traced_test;

    fn idle_engine() -> Arc<RuleEngine> {
        Arc::new(RuleEngine::new(
            EvaluatorSet::new(),
            Arc::new(RecordingSink::new()),
            Arc::new(SystemClock),
        ))
    }

    #[derive(Default)]
    struct Pace {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Pace {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    /// Sleeps `first` on its first call and `rest` afterwards
    struct PacedEvaluator {
        pace: Arc<Pace>,
        first: Duration,
        rest: Duration,
    }

    #[async_trait]
    impl Evaluator for PacedEvaluator {
        async fn evaluate(&self, _rule: &Rule, _now: DateTime<Utc>) -> Result<Vec<Candidate>> {
            let call = self.pace.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.pace.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.pace.max_in_flight.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(if call == 0 { self.first } else { self.rest }).await;
            self.pace.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn paced_engine(first: Duration, rest: Duration) -> (Arc<RuleEngine>, Arc<Pace>) {
        let pace = Arc::new(Pace::default());
        let evaluator = PacedEvaluator {
            pace: Arc::clone(&pace),
            first,
            rest,
        };
        let engine = RuleEngine::new(
            EvaluatorSet::new().with(RuleKind::StockReorder, evaluator),
            Arc::new(RecordingSink::new()),
            Arc::new(SystemClock),
        );
        engine
            .add_rule(NewRule::new("Paced", RuleKind::StockReorder))
            .unwrap();
        (Arc::new(engine), pace)
    }

    fn ten_second_schedule() -> TickSchedule {
        TickSchedule {
            period: Duration::from_secs(10),
            initial_delay: Duration::from_secs(1),
            evaluator_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_schedule_defaults() {
        let schedule = TickSchedule::default();
        assert_eq!(schedule.period, Duration::from_secs(300));
        assert_eq!(schedule.initial_delay, Duration::from_secs(3));
        assert_eq!(schedule.evaluator_timeout, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_after_initial_delay_then_each_period() {
        let engine = idle_engine();
        let handle = engine.start(TickSchedule::default()).unwrap();
        assert!(engine.is_running());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(engine.status().ticks_completed, 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(engine.status().ticks_completed, 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(engine.status().ticks_completed, 2);

        engine.stop();
        handle.await.unwrap();
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected() {
        let engine = idle_engine();
        let handle = engine.start(TickSchedule::default()).unwrap();
        assert!(engine.start(TickSchedule::default()).is_none());

        engine.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_applies_evaluator_timeout() {
        let engine = idle_engine();
        let schedule = TickSchedule {
            evaluator_timeout: Duration::from_secs(2),
            ..TickSchedule::default()
        };
        let handle = engine.start(schedule).unwrap();
        assert_eq!(engine.evaluator_timeout(), Duration::from_secs(2));

        engine.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_skips_the_cycle_it_overruns() {
        // first tick runs t=1..26, over the t=11 and t=21 boundaries
        let (engine, pace) = paced_engine(Duration::from_secs(25), Duration::ZERO);
        let handle = engine.start(ten_second_schedule()).unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(pace.calls(), 1);
        assert_eq!(engine.status().ticks_completed, 0);

        // the late timer tick fires once at t=26, then t=31
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(engine.status().ticks_completed, 2);
        assert_eq!(pace.calls(), 2);

        // an on-time schedule would have ticked at 1, 11, 21 and 31
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.status().ticks_completed, 3);
        assert_eq!(pace.calls(), 3);
        assert_eq!(pace.max_in_flight.load(Ordering::SeqCst), 1);

        engine.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_timer_skips_while_manual_tick_holds_gate() {
        let (engine, pace) = paced_engine(Duration::from_secs(5), Duration::from_secs(5));
        let handle = engine.start(ten_second_schedule()).unwrap();
        let manual = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.tick().await }
        });

        // manual tick runs t=0..5; the t=1 timer tick finds the gate held
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(engine.try_tick().await.is_none());
        assert_eq!(pace.calls(), 1);
        assert_eq!(engine.status().ticks_completed, 0);

        assert_eq!(manual.await.unwrap().rules_evaluated(), 1);
        tokio::time::sleep(Duration::from_secs(4)).await;
        // skipped, not queued behind the manual tick
        assert_eq!(engine.status().ticks_completed, 1);
        assert_eq!(pace.calls(), 1);
        assert!(logs_contain("Previous tick still running, skipped"));

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(engine.status().ticks_completed, 2);
        assert_eq!(pace.calls(), 2);
        assert_eq!(pace.max_in_flight.load(Ordering::SeqCst), 1);

        engine.stop();
        handle.await.unwrap();
    }
}
