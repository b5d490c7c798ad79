//! Per-kind rule evaluators
//!
//! An evaluator turns one rule into zero or more candidates. It never sees or
//! mutates engine state; deduplication, notification and trigger counting are
//! done by the engine afterwards.
//!
//! The standard evaluators read rows from a `DataStore`, add derived day
//! counts, apply an inherent predicate (stock and escalation only) and then
//! the rule's own conditions. Kind-specific settings come from `rule.actions`.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::condition::{all_match, parse_conditions, Condition};
use crate::error::{Result, RuleError};
use crate::store::{
    row_date, row_str, row_string, row_u32, tables, DataStore, Row, RowFilter,
};
use crate::types::{
    AlertLevel, AutoWorkOrder, Candidate, EscalationAlert, PredictiveAlert, PredictiveAlertKind,
    Rule, RuleKind, StockAlert, WorkOrderKind, GENERATED_BY_AUTOMATION,
};

/// Produces candidates for one rule
///
/// Implementations must not panic. Failures are reported as `Err`; the engine
/// logs them and the rule yields nothing that cycle. A panic is caught and
/// reported the same way in test and debug builds, but the release profile
/// sets `panic = "abort"`, where it takes the whole service down.
#[async_trait]
pub trait Evaluator: Send + Sync + 'static {
    async fn evaluate(&self, rule: &Rule, now: DateTime<Utc>) -> Result<Vec<Candidate>>;
}

/// Evaluator registry keyed by rule kind
#[derive(Clone, Default)]
pub struct EvaluatorSet {
    evaluators: HashMap<RuleKind, Arc<dyn Evaluator>>,
}

impl EvaluatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// All four standard evaluators reading from `store`
    pub fn standard(store: Arc<dyn DataStore>) -> Self {
        Self::new()
            .with(
                RuleKind::PredictiveMaintenance,
                PredictiveMaintenanceEvaluator::new(Arc::clone(&store)),
            )
            .with(
                RuleKind::AutoWorkOrder,
                AutoWorkOrderEvaluator::new(Arc::clone(&store)),
            )
            .with(
                RuleKind::StockReorder,
                StockReorderEvaluator::new(Arc::clone(&store)),
            )
            .with(RuleKind::Escalation, EscalationEvaluator::new(store))
    }

    /// Register or replace the evaluator for `kind`
    pub fn with(mut self, kind: RuleKind, evaluator: impl Evaluator) -> Self {
        self.evaluators.insert(kind, Arc::new(evaluator));
        self
    }

    pub fn get(&self, kind: RuleKind) -> Option<Arc<dyn Evaluator>> {
        self.evaluators.get(&kind).cloned()
    }
}

/// Upper bound for `horizon_days` and `lead_days` (ten years)
pub const MAX_DAY_OFFSET: u32 = 3650;

/// Check that a rule's conditions and actions can be evaluated
pub fn validate_rule(
    kind: RuleKind,
    conditions: &Map<String, Value>,
    actions: &Map<String, Value>,
) -> Result<()> {
    parse_conditions(conditions)?;
    match kind {
        RuleKind::PredictiveMaintenance => {
            let settings: PredictiveSettings = parse_settings(actions).map_err(invalid_actions)?;
            check_day_offset("horizon_days", settings.horizon_days)
        },
        RuleKind::AutoWorkOrder => {
            let settings: WorkOrderSettings = parse_settings(actions).map_err(invalid_actions)?;
            check_day_offset("lead_days", settings.lead_days)
        },
        RuleKind::StockReorder => parse_settings::<StockSettings>(actions)
            .map(|_| ())
            .map_err(invalid_actions),
        RuleKind::Escalation => parse_settings::<EscalationSettings>(actions)
            .map(|_| ())
            .map_err(invalid_actions),
    }
}

fn invalid_actions(err: serde_json::Error) -> RuleError {
    RuleError::Validation(format!("invalid actions: {}", err))
}

fn check_day_offset(field: &str, days: u32) -> Result<()> {
    if days > MAX_DAY_OFFSET {
        return Err(RuleError::Validation(format!(
            "invalid actions: {} must be at most {}, got {}",
            field, MAX_DAY_OFFSET, days
        )));
    }
    Ok(())
}

fn parse_settings<T: DeserializeOwned>(actions: &Map<String, Value>) -> serde_json::Result<T> {
    serde_json::from_value(Value::Object(actions.clone()))
}

fn settings_for<T: DeserializeOwned>(rule: &Rule) -> Result<T> {
    parse_settings(&rule.actions)
        .map_err(|e| RuleError::Evaluation(format!("rule {}: invalid actions: {}", rule.id, e)))
}

fn conditions_for(rule: &Rule) -> Result<Vec<Condition>> {
    parse_conditions(&rule.conditions)
        .map_err(|e| RuleError::Evaluation(format!("rule {}: {}", rule.id, e)))
}

async fn load_rows(store: &dyn DataStore, table: &str) -> Result<Vec<Row>> {
    store
        .select(table, &RowFilter::all())
        .await
        .map_err(|e| RuleError::Store(format!("select {}: {}", table, e)))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// `today + days`, or an evaluation error when the date is out of range
fn date_after(rule: &Rule, today: NaiveDate, days: u32) -> Result<NaiveDate> {
    today
        .checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| {
            RuleError::Evaluation(format!(
                "rule {}: {} + {} days is out of range",
                rule.id, today, days
            ))
        })
}

fn insert_int(row: &mut Row, field: &str, value: i64) {
    row.insert(field.to_string(), Value::from(value));
}

// ============================================================================
// Predictive maintenance
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PredictiveSettings {
    alert_kind: PredictiveAlertKind,
    severity: AlertLevel,
    confidence: f64,
    horizon_days: u32,
    recommendations: Vec<String>,
}

impl Default for PredictiveSettings {
    fn default() -> Self {
        Self {
            alert_kind: PredictiveAlertKind::WearPrediction,
            severity: AlertLevel::Medium,
            confidence: 0.75,
            horizon_days: 30,
            recommendations: Vec::new(),
        }
    }
}

fn default_recommendations(kind: PredictiveAlertKind) -> Vec<String> {
    let items: &[&str] = match kind {
        PredictiveAlertKind::WearPrediction => &[
            "Inspect wear components",
            "Schedule preventive maintenance",
        ],
        PredictiveAlertKind::FailureRisk => &[
            "Plan component replacement",
            "Increase monitoring frequency",
        ],
        PredictiveAlertKind::EfficiencyDecline => &[
            "Clean heat exchange surfaces",
            "Review control setpoints",
        ],
        PredictiveAlertKind::OverdueMaintenance => &["Schedule the overdue service"],
    };
    items.iter().map(|s| s.to_string()).collect()
}

/// Asset rows gain `days_since_service` and `days_until_service`
fn enrich_asset(row: &mut Row, today: NaiveDate) {
    if let Some(last) = row_date(row, "last_service_date") {
        insert_int(row, "days_since_service", days_between(last, today));
    }
    if let Some(next) = row_date(row, "next_service_date") {
        insert_int(row, "days_until_service", days_between(today, next));
    }
}

pub struct PredictiveMaintenanceEvaluator {
    store: Arc<dyn DataStore>,
}

impl PredictiveMaintenanceEvaluator {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Evaluator for PredictiveMaintenanceEvaluator {
    async fn evaluate(&self, rule: &Rule, now: DateTime<Utc>) -> Result<Vec<Candidate>> {
        let settings: PredictiveSettings = settings_for(rule)?;
        let conditions = conditions_for(rule)?;
        let today = now.date_naive();
        let predicted_date = date_after(rule, today, settings.horizon_days)?;

        let recommendations = if settings.recommendations.is_empty() {
            default_recommendations(settings.alert_kind)
        } else {
            settings.recommendations.clone()
        };

        let mut candidates = Vec::new();
        for mut row in load_rows(self.store.as_ref(), tables::ASSETS).await? {
            enrich_asset(&mut row, today);
            if !all_match(&conditions, &row) {
                continue;
            }
            let Some(asset_id) = row_string(&row, "id") else {
                debug!("Rule {}: asset row without id skipped", rule.id);
                continue;
            };
            let asset_name = row_str(&row, "name").unwrap_or(&asset_id).to_string();

            candidates.push(Candidate::Predictive(PredictiveAlert {
                id: new_id(),
                asset_id,
                asset_name,
                alert_kind: settings.alert_kind,
                severity: settings.severity,
                predicted_date,
                confidence: settings.confidence.clamp(0.0, 1.0),
                recommendations: recommendations.clone(),
                triggers: conditions.iter().map(|c| c.describe(&row)).collect(),
            }));
        }

        Ok(candidates)
    }
}

// ============================================================================
// Auto work orders
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct WorkOrderSettings {
    work_order_kind: WorkOrderKind,
    priority: AlertLevel,
    lead_days: u32,
}

impl Default for WorkOrderSettings {
    fn default() -> Self {
        Self {
            work_order_kind: WorkOrderKind::Ppm,
            priority: AlertLevel::Medium,
            lead_days: 7,
        }
    }
}

pub struct AutoWorkOrderEvaluator {
    store: Arc<dyn DataStore>,
}

impl AutoWorkOrderEvaluator {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Evaluator for AutoWorkOrderEvaluator {
    async fn evaluate(&self, rule: &Rule, now: DateTime<Utc>) -> Result<Vec<Candidate>> {
        let settings: WorkOrderSettings = settings_for(rule)?;
        let conditions = conditions_for(rule)?;
        let today = now.date_naive();

        let mut candidates = Vec::new();
        for mut row in load_rows(self.store.as_ref(), tables::ASSETS).await? {
            enrich_asset(&mut row, today);
            if !all_match(&conditions, &row) {
                continue;
            }
            let Some(asset_id) = row_string(&row, "id") else {
                debug!("Rule {}: asset row without id skipped", rule.id);
                continue;
            };
            let asset_name = row_str(&row, "name").unwrap_or(&asset_id);
            let scheduled_date = match row_date(&row, "next_service_date") {
                Some(date) => date,
                None => date_after(rule, today, settings.lead_days)?,
            };

            candidates.push(Candidate::WorkOrder(AutoWorkOrder {
                id: new_id(),
                title: format!("{}: {}", settings.work_order_kind.label(), asset_name),
                asset_id,
                kind: settings.work_order_kind,
                priority: settings.priority,
                scheduled_date,
                generated_by: GENERATED_BY_AUTOMATION.to_string(),
                source_rule_id: rule.id.clone(),
            }));
        }

        Ok(candidates)
    }
}

// ============================================================================
// Stock reorder
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StockSettings {
    auto_reorder: bool,
    reorder_multiplier: u32,
}

impl Default for StockSettings {
    fn default() -> Self {
        Self {
            auto_reorder: false,
            reorder_multiplier: 2,
        }
    }
}

fn stock_urgency(current: u32, minimum: u32) -> AlertLevel {
    if current == 0 {
        AlertLevel::Critical
    } else if current < minimum {
        AlertLevel::High
    } else {
        AlertLevel::Medium
    }
}

pub struct StockReorderEvaluator {
    store: Arc<dyn DataStore>,
}

impl StockReorderEvaluator {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Evaluator for StockReorderEvaluator {
    async fn evaluate(&self, rule: &Rule, _now: DateTime<Utc>) -> Result<Vec<Candidate>> {
        let settings: StockSettings = settings_for(rule)?;
        let conditions = conditions_for(rule)?;

        let mut candidates = Vec::new();
        for mut row in load_rows(self.store.as_ref(), tables::STOCK_ITEMS).await? {
            let (Some(current), Some(reorder_point)) = (
                row_u32(&row, "current_stock"),
                row_u32(&row, "reorder_point"),
            ) else {
                continue;
            };
            // shortfall is derived before conditions so rules can threshold on it
            insert_int(
                &mut row,
                "shortfall",
                i64::from(reorder_point) - i64::from(current),
            );
            if current > reorder_point || !all_match(&conditions, &row) {
                continue;
            }
            let Some(item_name) = row_string(&row, "name").or_else(|| row_string(&row, "item_name"))
            else {
                debug!("Rule {}: stock row without name skipped", rule.id);
                continue;
            };

            let minimum_level = row_u32(&row, "minimum_level").unwrap_or(0);
            let target = i64::from(reorder_point) * i64::from(settings.reorder_multiplier);
            let suggested = (target - i64::from(current)).max(1);

            candidates.push(Candidate::Stock(StockAlert {
                id: new_id(),
                item_name,
                current_stock: current,
                minimum_level,
                reorder_point,
                suggested_quantity: u32::try_from(suggested).unwrap_or(u32::MAX),
                supplier: row_str(&row, "supplier").unwrap_or("Unassigned").to_string(),
                urgency: stock_urgency(current, minimum_level),
                auto_reorder_enabled: settings.auto_reorder,
            }));
        }

        Ok(candidates)
    }
}

// ============================================================================
// Escalation
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct EscalationSettings {
    level_two_days: u32,
    level_three_days: u32,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            level_two_days: 3,
            level_three_days: 7,
        }
    }
}

impl EscalationSettings {
    fn level_for(&self, days_overdue: u32) -> u8 {
        if days_overdue >= self.level_three_days {
            3
        } else if days_overdue >= self.level_two_days {
            2
        } else {
            1
        }
    }
}

pub struct EscalationEvaluator {
    store: Arc<dyn DataStore>,
}

impl EscalationEvaluator {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Evaluator for EscalationEvaluator {
    async fn evaluate(&self, rule: &Rule, now: DateTime<Utc>) -> Result<Vec<Candidate>> {
        let settings: EscalationSettings = settings_for(rule)?;
        let conditions = conditions_for(rule)?;
        let today = now.date_naive();

        let mut candidates = Vec::new();
        for mut row in load_rows(self.store.as_ref(), tables::TASKS).await? {
            let completed = row_str(&row, "status")
                .map(|s| s.eq_ignore_ascii_case("completed"))
                .unwrap_or(false);
            let Some(due) = row_date(&row, "due_date") else {
                continue;
            };
            let overdue = days_between(due, today).max(0);
            insert_int(&mut row, "days_overdue", overdue);
            if completed || overdue < 1 || !all_match(&conditions, &row) {
                continue;
            }
            let Some(task_id) = row_string(&row, "id") else {
                debug!("Rule {}: task row without id skipped", rule.id);
                continue;
            };

            let days_overdue = u32::try_from(overdue).unwrap_or(u32::MAX);
            candidates.push(Candidate::Escalation(EscalationAlert {
                id: new_id(),
                task_title: row_str(&row, "title").unwrap_or(&task_id).to_string(),
                task_id,
                assignee: row_str(&row, "assignee").unwrap_or("Unassigned").to_string(),
                supervisor: row_str(&row, "supervisor")
                    .unwrap_or("Unassigned")
                    .to_string(),
                days_overdue,
                escalation_level: settings.level_for(days_overdue),
                last_escalated_at: now,
            }));
        }

        Ok(candidates)
    }
}
