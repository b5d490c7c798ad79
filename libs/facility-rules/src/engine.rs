//! Rule Engine - owns rules and alert collections, runs evaluation ticks
//!
//! A tick:
//! 1. Evaluates every enabled rule with the evaluator registered for its kind
//! 2. Drops candidates whose uniqueness key already exists (or repeats in the batch)
//! 3. Appends survivors and emits one notification each (two for auto-reorder)
//! 4. Bumps `trigger_count` / `last_triggered_at` when anything was accepted
//!
//! Ticks are serialised through an async gate so that dedup-and-append never
//! interleaves. Engine state sits behind a synchronous mutex that is never
//! held across an await, so mutations from other tasks stay cheap.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::condition::{format_conditions, parse_conditions};
use crate::error::{Result, RuleError};
use crate::evaluators::{validate_rule, EvaluatorSet};
use crate::logger::RuleLoggerManager;
use crate::notify::{Notification, NotificationSeverity, NotificationSink};
use crate::types::{
    AlertCategory, AutoWorkOrder, AutomationSnapshot, Candidate, Deduplicate, EscalationAlert,
    NewRule, PredictiveAlert, Rule, RuleKind, StockAlert,
};

/// Default per-evaluator time budget
pub const DEFAULT_EVALUATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of evaluating one rule
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub kind: RuleKind,
    /// Candidates appended to a collection
    pub accepted: usize,
    /// Candidates dropped because their key already existed
    pub duplicates: usize,
    /// Short description of each accepted item
    pub accepted_items: Vec<String>,
    pub error: Option<String>,
    pub timed_out: bool,
}

impl RuleOutcome {
    fn empty(rule: &Rule) -> Self {
        Self {
            rule_id: rule.id.clone(),
            kind: rule.kind,
            accepted: 0,
            duplicates: 0,
            accepted_items: Vec::new(),
            error: None,
            timed_out: false,
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some() || self.timed_out
    }
}

/// Result of one full tick
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<RuleOutcome>,
}

impl TickReport {
    pub fn rules_evaluated(&self) -> usize {
        self.outcomes.len()
    }

    pub fn accepted(&self) -> usize {
        self.outcomes.iter().map(|o| o.accepted).sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed()).count()
    }
}

/// Engine status information
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub total_rules: usize,
    pub enabled_rules: usize,
    pub predictive_alerts: usize,
    pub work_orders: usize,
    pub stock_alerts: usize,
    pub escalations: usize,
    pub ticks_completed: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct EngineState {
    rules: Vec<Rule>,
    predictive: Vec<PredictiveAlert>,
    work_orders: Vec<AutoWorkOrder>,
    stock: Vec<StockAlert>,
    escalations: Vec<EscalationAlert>,
    ticks_completed: u64,
    last_tick_at: Option<DateTime<Utc>>,
}

impl EngineState {
    /// Append when the key is new; returns whether it was appended
    fn insert(&mut self, candidate: Candidate) -> bool {
        match candidate {
            Candidate::Predictive(a) => push_unique(&mut self.predictive, a),
            Candidate::WorkOrder(a) => push_unique(&mut self.work_orders, a),
            Candidate::Stock(a) => push_unique(&mut self.stock, a),
            Candidate::Escalation(a) => push_unique(&mut self.escalations, a),
        }
    }

    fn dismiss(&mut self, category: AlertCategory, id: &str) -> bool {
        match category {
            AlertCategory::Predictive => remove_by_id(&mut self.predictive, id),
            AlertCategory::WorkOrder => remove_by_id(&mut self.work_orders, id),
            AlertCategory::Stock => remove_by_id(&mut self.stock, id),
            AlertCategory::Escalation => remove_by_id(&mut self.escalations, id),
        }
    }
}

fn push_unique<T: Deduplicate>(collection: &mut Vec<T>, item: T) -> bool {
    let key = item.key();
    if collection.iter().any(|existing| existing.key() == key) {
        return false;
    }
    collection.push(item);
    true
}

fn remove_by_id<T: Deduplicate>(collection: &mut Vec<T>, id: &str) -> bool {
    let before = collection.len();
    collection.retain(|entry| entry.id() != id);
    collection.len() != before
}

/// Automation rule engine
pub struct RuleEngine {
    state: Mutex<EngineState>,
    evaluators: EvaluatorSet,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    /// Serialises ticks and manual rule runs
    tick_gate: tokio::sync::Mutex<()>,
    evaluator_timeout_ms: AtomicU64,
    rule_logs: Option<RuleLoggerManager>,
    pub(crate) shutdown: Notify,
    pub(crate) running: AtomicBool,
}

impl RuleEngine {
    pub fn new(
        evaluators: EvaluatorSet,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            evaluators,
            sink,
            clock,
            tick_gate: tokio::sync::Mutex::new(()),
            evaluator_timeout_ms: AtomicU64::new(DEFAULT_EVALUATOR_TIMEOUT.as_millis() as u64),
            rule_logs: None,
            shutdown: Notify::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Replace the rule list (e.g. with `seed::default_rules`)
    pub fn with_rules(self, rules: Vec<Rule>) -> Self {
        self.state.lock().rules = rules;
        self
    }

    pub fn with_evaluator_timeout(self, timeout: Duration) -> Self {
        self.set_evaluator_timeout(timeout);
        self
    }

    pub(crate) fn set_evaluator_timeout(&self, timeout: Duration) {
        self.evaluator_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn evaluator_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluator_timeout_ms.load(Ordering::Relaxed))
    }

    /// Write one log line per rule evaluation under `{root}/rules/{rule_id}/`
    pub fn with_rule_logs(mut self, manager: RuleLoggerManager) -> Self {
        self.rule_logs = Some(manager);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Run every enabled rule once
    ///
    /// Waits if another tick or manual run is in flight.
    pub async fn tick(&self) -> TickReport {
        let _gate = self.tick_gate.lock().await;
        self.tick_locked().await
    }

    /// Like `tick`, but returns `None` instead of waiting for a running tick
    pub async fn try_tick(&self) -> Option<TickReport> {
        let _gate = self.tick_gate.try_lock().ok()?;
        Some(self.tick_locked().await)
    }

    async fn tick_locked(&self) -> TickReport {
        let started_at = self.clock.now();
        let rule_ids: Vec<String> = self
            .state
            .lock()
            .rules
            .iter()
            .filter(|r| r.enabled)
            .map(|r| r.id.clone())
            .collect();

        let mut outcomes = Vec::with_capacity(rule_ids.len());
        for id in &rule_ids {
            // Re-read so toggles and removals made during this tick are honoured
            let Some(rule) = self.rule(id).filter(|r| r.enabled) else {
                continue;
            };
            outcomes.push(self.evaluate_rule(&rule, started_at).await);
        }

        {
            let mut state = self.state.lock();
            state.ticks_completed += 1;
            state.last_tick_at = Some(started_at);
        }

        let report = TickReport {
            started_at,
            outcomes,
        };
        debug!(
            "Tick done: {} rules, {} accepted, {} failed",
            report.rules_evaluated(),
            report.accepted(),
            report.failures()
        );
        report
    }

    /// Evaluate one rule by id regardless of its enabled flag
    ///
    /// Same dedup, notification and counter contract as a tick; returns
    /// `None` when the id is unknown.
    pub async fn run_rule(&self, id: &str) -> Option<RuleOutcome> {
        let _gate = self.tick_gate.lock().await;
        let rule = self.rule(id)?;
        let now = self.clock.now();
        Some(self.evaluate_rule(&rule, now).await)
    }

    async fn evaluate_rule(&self, rule: &Rule, now: DateTime<Utc>) -> RuleOutcome {
        let mut outcome = RuleOutcome::empty(rule);

        let Some(evaluator) = self.evaluators.get(rule.kind) else {
            warn!("Rule {}: no evaluator registered for {}", rule.id, rule.kind);
            outcome.error = Some(format!("no evaluator for {}", rule.kind));
            self.log_outcome(&outcome);
            return outcome;
        };

        debug!("Evaluating rule: {} ({})", rule.id, rule.kind);
        let budget = self.evaluator_timeout();
        // Own task so a panicking evaluator surfaces as a JoinError
        let task_rule = rule.clone();
        let mut task = tokio::spawn(async move { evaluator.evaluate(&task_rule, now).await });
        let candidates = match tokio::time::timeout(budget, &mut task).await {
            Ok(Ok(Ok(candidates))) => candidates,
            Ok(Ok(Err(e))) => {
                error!("Rule {} evaluation error: {}", rule.id, e);
                outcome.error = Some(e.to_string());
                self.log_outcome(&outcome);
                return outcome;
            },
            Ok(Err(join_err)) => {
                error!("Rule {} evaluator panicked: {}", rule.id, join_err);
                outcome.error = Some("evaluator panicked".to_string());
                self.log_outcome(&outcome);
                return outcome;
            },
            Err(_) => {
                task.abort();
                let err = RuleError::Timeout(budget.as_millis() as u64);
                warn!("Rule {}: {}, no candidates this cycle", rule.id, err);
                outcome.timed_out = true;
                self.log_outcome(&outcome);
                return outcome;
            },
        };

        let mut accepted = Vec::new();
        {
            let mut state = self.state.lock();
            for candidate in candidates {
                if state.insert(candidate.clone()) {
                    accepted.push(candidate);
                } else {
                    outcome.duplicates += 1;
                }
            }

            if !accepted.is_empty() {
                if let Some(stored) = state.rules.iter_mut().find(|r| r.id == rule.id) {
                    stored.trigger_count += accepted.len() as u64;
                    stored.last_triggered_at = Some(now);
                }
            }
        }

        for candidate in &accepted {
            for notification in notifications_for(candidate, now) {
                self.sink.notify(notification);
            }
        }

        outcome.accepted = accepted.len();
        outcome.accepted_items = accepted.iter().map(describe_candidate).collect();
        if outcome.accepted > 0 {
            info!(
                "Rule {} triggered: {} new, {} duplicate",
                rule.id, outcome.accepted, outcome.duplicates
            );
        }
        self.log_outcome(&outcome);
        outcome
    }

    fn log_outcome(&self, outcome: &RuleOutcome) {
        if let Some(manager) = &self.rule_logs {
            manager.get_logger(&outcome.rule_id).log_outcome(outcome);
        }
    }

    // ========================================================================
    // Rule management
    // ========================================================================

    /// Validate and append a new rule; returns the stored rule
    pub fn add_rule(&self, new_rule: NewRule) -> Result<Rule> {
        let name = new_rule.name.trim();
        if name.is_empty() {
            return Err(RuleError::validation("rule name is required"));
        }
        validate_rule(new_rule.kind, &new_rule.conditions, &new_rule.actions)?;

        let rule = Rule {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: new_rule.description,
            kind: new_rule.kind,
            enabled: new_rule.enabled,
            conditions: new_rule.conditions,
            actions: new_rule.actions,
            last_triggered_at: None,
            trigger_count: 0,
            created_at: self.clock.now(),
        };

        let expression = parse_conditions(&rule.conditions)
            .map(|c| format_conditions(&c))
            .unwrap_or_default();
        self.state.lock().rules.push(rule.clone());
        info!(
            "Rule added: {} ({}, {}) when [{}]",
            rule.id, rule.name, rule.kind, expression
        );
        Ok(rule)
    }

    /// Flip `enabled`; returns the new state, or `None` for an unknown id
    pub fn toggle_rule(&self, id: &str) -> Option<bool> {
        let mut state = self.state.lock();
        let rule = state.rules.iter_mut().find(|r| r.id == id)?;
        rule.enabled = !rule.enabled;
        info!(
            "Rule {} {}",
            id,
            if rule.enabled { "enabled" } else { "disabled" }
        );
        Some(rule.enabled)
    }

    /// Remove a rule. Alerts it produced stay in their collections.
    pub fn remove_rule(&self, id: &str) -> Option<Rule> {
        let removed = {
            let mut state = self.state.lock();
            let index = state.rules.iter().position(|r| r.id == id)?;
            state.rules.remove(index)
        };
        if let Some(manager) = &self.rule_logs {
            manager.remove_logger(id);
        }
        info!("Rule removed: {} ({})", removed.id, removed.name);
        Some(removed)
    }

    /// Remove an alert by id; returns whether anything was removed
    pub fn dismiss_alert(&self, category: AlertCategory, id: &str) -> bool {
        let removed = self.state.lock().dismiss(category, id);
        if removed {
            debug!("Dismissed {:?} alert {}", category, id);
        }
        removed
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn rules(&self) -> Vec<Rule> {
        self.state.lock().rules.clone()
    }

    pub fn rule(&self, id: &str) -> Option<Rule> {
        self.state.lock().rules.iter().find(|r| r.id == id).cloned()
    }

    pub fn predictive_alerts(&self) -> Vec<PredictiveAlert> {
        self.state.lock().predictive.clone()
    }

    pub fn work_orders(&self) -> Vec<AutoWorkOrder> {
        self.state.lock().work_orders.clone()
    }

    pub fn stock_alerts(&self) -> Vec<StockAlert> {
        self.state.lock().stock.clone()
    }

    pub fn escalations(&self) -> Vec<EscalationAlert> {
        self.state.lock().escalations.clone()
    }

    pub fn snapshot(&self) -> AutomationSnapshot {
        let state = self.state.lock();
        AutomationSnapshot {
            rules: state.rules.clone(),
            predictive_alerts: state.predictive.clone(),
            work_orders: state.work_orders.clone(),
            stock_alerts: state.stock.clone(),
            escalations: state.escalations.clone(),
        }
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.state.lock();
        EngineStatus {
            running: self.is_running(),
            total_rules: state.rules.len(),
            enabled_rules: state.rules.iter().filter(|r| r.enabled).count(),
            predictive_alerts: state.predictive.len(),
            work_orders: state.work_orders.len(),
            stock_alerts: state.stock.len(),
            escalations: state.escalations.len(),
            ticks_completed: state.ticks_completed,
            last_tick_at: state.last_tick_at,
        }
    }
}

fn describe_candidate(candidate: &Candidate) -> String {
    match candidate {
        Candidate::Predictive(a) => format!("{}/{}", a.asset_id, a.alert_kind.label()),
        Candidate::WorkOrder(w) => format!("{}/{}", w.asset_id, w.kind.label()),
        Candidate::Stock(s) => s.item_name.clone(),
        Candidate::Escalation(e) => format!("{} L{}", e.task_id, e.escalation_level),
    }
}

/// Notifications emitted for one accepted candidate
fn notifications_for(candidate: &Candidate, now: DateTime<Utc>) -> Vec<Notification> {
    match candidate {
        Candidate::Predictive(a) => vec![Notification::new(
            "Predictive Maintenance Alert",
            format!(
                "{}: {} expected by {} ({:.0}% confidence)",
                a.asset_name,
                a.alert_kind.label(),
                a.predicted_date,
                a.confidence * 100.0
            ),
            a.severity.into(),
            now,
        )],
        Candidate::WorkOrder(w) => vec![Notification::new(
            "Work Order Generated",
            format!("{} scheduled for {}", w.title, w.scheduled_date),
            w.priority.into(),
            now,
        )],
        Candidate::Stock(s) => {
            let mut out = vec![Notification::new(
                "Low Stock Alert",
                format!(
                    "{}: {} in stock (reorder point {})",
                    s.item_name, s.current_stock, s.reorder_point
                ),
                s.urgency.into(),
                now,
            )];
            if s.auto_reorder_enabled {
                out.push(Notification::new(
                    "Reorder Placed",
                    format!(
                        "Ordered {} x {} from {}",
                        s.suggested_quantity, s.item_name, s.supplier
                    ),
                    NotificationSeverity::Success,
                    now,
                ));
            }
            out
        },
        Candidate::Escalation(e) => vec![Notification::new(
            "Task Escalated",
            format!(
                "{} is {} day(s) overdue, escalated to {} (level {})",
                e.task_title, e.days_overdue, e.supervisor, e.escalation_level
            ),
            e.level().into(),
            now,
        )],
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::evaluators::Evaluator;
    use crate::notify::RecordingSink;
    use crate::types::{AlertLevel, WorkOrderKind};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};

    struct FailingEvaluator;

    #[async_trait]
    impl Evaluator for FailingEvaluator {
        async fn evaluate(&self, _rule: &Rule, _now: DateTime<Utc>) -> Result<Vec<Candidate>> {
            Err(RuleError::Store("backend unavailable".to_string()))
        }
    }

    struct SlowEvaluator;

    #[async_trait]
    impl Evaluator for SlowEvaluator {
        async fn evaluate(&self, _rule: &Rule, _now: DateTime<Utc>) -> Result<Vec<Candidate>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![])
        }
    }

    struct PanickingEvaluator;

    #[async_trait]
    impl Evaluator for PanickingEvaluator {
        async fn evaluate(&self, _rule: &Rule, _now: DateTime<Utc>) -> Result<Vec<Candidate>> {
            panic!("bad sensor row");
        }
    }

    /// Returns the same two work orders for the same asset key every time
    struct RepeatingWorkOrders;

    #[async_trait]
    impl Evaluator for RepeatingWorkOrders {
        async fn evaluate(&self, rule: &Rule, _now: DateTime<Utc>) -> Result<Vec<Candidate>> {
            let wo = |day| AutoWorkOrder {
                id: Uuid::new_v4().to_string(),
                title: "Inspection: Boiler 2".to_string(),
                asset_id: "BLR-002".to_string(),
                kind: WorkOrderKind::Inspection,
                priority: AlertLevel::High,
                scheduled_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
                generated_by: "automation".to_string(),
                source_rule_id: rule.id.clone(),
            };
            Ok(vec![Candidate::WorkOrder(wo(12)), Candidate::WorkOrder(wo(20))])
        }
    }

    fn engine(evaluators: EvaluatorSet) -> (RuleEngine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap(),
        ));
        let engine = RuleEngine::new(evaluators, sink.clone(), clock);
        (engine, sink)
    }

    #[test]
    fn test_push_unique_rejects_same_key() {
        let mut coll = Vec::new();
        let stock = |id: &str| StockAlert {
            id: id.to_string(),
            item_name: "Gasket Set".to_string(),
            current_stock: 2,
            minimum_level: 5,
            reorder_point: 8,
            suggested_quantity: 14,
            supplier: "Acme".to_string(),
            urgency: AlertLevel::High,
            auto_reorder_enabled: false,
        };
        assert!(push_unique(&mut coll, stock("a")));
        assert!(!push_unique(&mut coll, stock("b")));
        assert_eq!(coll.len(), 1);
        assert_eq!(coll[0].id, "a");
    }

    #[tokio::test]
    async fn test_batch_duplicates_are_dropped() {
        let (engine, sink) =
            engine(EvaluatorSet::new().with(RuleKind::AutoWorkOrder, RepeatingWorkOrders));
        let rule = engine
            .add_rule(NewRule::new("Boiler inspection", RuleKind::AutoWorkOrder))
            .unwrap();

        let report = engine.tick().await;
        assert_eq!(report.accepted(), 1);
        assert_eq!(report.outcomes[0].duplicates, 1);

        let orders = engine.work_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(
            orders[0].scheduled_date,
            NaiveDate::from_ymd_opt(2026, 3, 12).unwrap()
        );
        assert_eq!(engine.rule(&rule.id).unwrap().trigger_count, 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.notifications()[0].severity, NotificationSeverity::Warning);
    }

    #[tokio::test]
    async fn test_failing_evaluator_is_reported_not_fatal() {
        let (engine, sink) = engine(
            EvaluatorSet::new()
                .with(RuleKind::Escalation, FailingEvaluator)
                .with(RuleKind::AutoWorkOrder, RepeatingWorkOrders),
        );
        engine
            .add_rule(NewRule::new("Escalate", RuleKind::Escalation))
            .unwrap();
        engine
            .add_rule(NewRule::new("Work orders", RuleKind::AutoWorkOrder))
            .unwrap();

        let report = engine.tick().await;
        assert_eq!(report.rules_evaluated(), 2);
        assert_eq!(report.failures(), 1);
        assert!(report.outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("backend unavailable"));
        assert_eq!(engine.work_orders().len(), 1);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_evaluator_is_contained() {
        let (engine, sink) = engine(
            EvaluatorSet::new()
                .with(RuleKind::PredictiveMaintenance, PanickingEvaluator)
                .with(RuleKind::AutoWorkOrder, RepeatingWorkOrders),
        );
        let bad = engine
            .add_rule(NewRule::new("Panics", RuleKind::PredictiveMaintenance))
            .unwrap();
        engine
            .add_rule(NewRule::new("Work orders", RuleKind::AutoWorkOrder))
            .unwrap();

        let report = engine.tick().await;
        assert_eq!(report.rules_evaluated(), 2);
        assert_eq!(report.failures(), 1);
        assert_eq!(
            report.outcomes[0].error.as_deref(),
            Some("evaluator panicked")
        );
        assert_eq!(engine.rule(&bad.id).unwrap().trigger_count, 0);
        assert_eq!(engine.work_orders().len(), 1);
        assert_eq!(sink.len(), 1);

        // the gate was released, so the next tick runs normally
        assert_eq!(engine.tick().await.failures(), 1);
        assert_eq!(engine.status().ticks_completed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluator_timeout_yields_no_candidates() {
        let (engine, _sink) = engine(
            EvaluatorSet::new().with(RuleKind::PredictiveMaintenance, SlowEvaluator),
        );
        let engine = engine.with_evaluator_timeout(Duration::from_secs(5));
        let rule = engine
            .add_rule(NewRule::new("Slow", RuleKind::PredictiveMaintenance))
            .unwrap();

        let report = engine.tick().await;
        assert!(report.outcomes[0].timed_out);
        assert_eq!(report.accepted(), 0);
        assert_eq!(engine.rule(&rule.id).unwrap().trigger_count, 0);
        assert_eq!(engine.status().ticks_completed, 1);
    }

    #[tokio::test]
    async fn test_missing_evaluator_is_an_outcome_error() {
        let (engine, _sink) = engine(EvaluatorSet::new());
        engine
            .add_rule(NewRule::new("Orphan kind", RuleKind::StockReorder))
            .unwrap();
        let report = engine.tick().await;
        assert_eq!(report.failures(), 1);
    }

    #[tokio::test]
    async fn test_run_rule_ignores_enabled_flag() {
        let (engine, _sink) =
            engine(EvaluatorSet::new().with(RuleKind::AutoWorkOrder, RepeatingWorkOrders));
        let rule = engine
            .add_rule(NewRule::new("Manual only", RuleKind::AutoWorkOrder).disabled())
            .unwrap();

        assert_eq!(engine.tick().await.rules_evaluated(), 0);
        let outcome = engine.run_rule(&rule.id).await.unwrap();
        assert_eq!(outcome.accepted, 1);
        assert!(engine.run_rule("missing").await.is_none());
    }

    #[test]
    fn test_stock_auto_reorder_emits_two_notifications() {
        let now = Utc::now();
        let mut alert = StockAlert {
            id: "s1".to_string(),
            item_name: "Fan Belt".to_string(),
            current_stock: 0,
            minimum_level: 2,
            reorder_point: 4,
            suggested_quantity: 8,
            supplier: "BeltCo".to_string(),
            urgency: AlertLevel::Critical,
            auto_reorder_enabled: true,
        };
        let out = notifications_for(&Candidate::Stock(alert.clone()), now);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].severity, NotificationSeverity::Error);
        assert_eq!(out[1].severity, NotificationSeverity::Success);
        assert_eq!(out[1].message, "Ordered 8 x Fan Belt from BeltCo");

        alert.auto_reorder_enabled = false;
        assert_eq!(notifications_for(&Candidate::Stock(alert), now).len(), 1);
    }

    #[test]
    fn test_toggle_and_remove_unknown_ids_are_noops() {
        let (engine, _sink) = engine(EvaluatorSet::new());
        assert_eq!(engine.toggle_rule("nope"), None);
        assert!(engine.remove_rule("nope").is_none());
        assert!(!engine.dismiss_alert(AlertCategory::Stock, "nope"));
    }
}
