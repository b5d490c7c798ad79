//! Automation type definitions
//!
//! Core types shared by the engine, evaluators and consumers:
//! - Rule / NewRule: automation policies and their creation input
//! - PredictiveAlert, AutoWorkOrder, StockAlert, EscalationAlert: domain events
//! - Candidate: an evaluator proposal, routed to one of the four collections
//! - AutomationSnapshot: read-only copy handed to dashboards

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::RuleError;

// ============================================================================
// Rules
// ============================================================================

/// Kind of automation rule; selects the evaluator used at tick time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    PredictiveMaintenance,
    AutoWorkOrder,
    StockReorder,
    Escalation,
}

impl RuleKind {
    pub const ALL: [RuleKind; 4] = [
        RuleKind::PredictiveMaintenance,
        RuleKind::AutoWorkOrder,
        RuleKind::StockReorder,
        RuleKind::Escalation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::PredictiveMaintenance => "predictive_maintenance",
            RuleKind::AutoWorkOrder => "auto_work_order",
            RuleKind::StockReorder => "stock_reorder",
            RuleKind::Escalation => "escalation",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule - a named, toggleable automation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub kind: RuleKind,

    /// Disabled rules are skipped by `tick()`
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Row predicates, AND-combined (see `condition`)
    #[serde(default)]
    pub conditions: Map<String, Value>,

    /// Per-kind evaluator settings (see `evaluators`)
    #[serde(default)]
    pub actions: Map<String, Value>,

    /// Time of the last tick that accepted at least one candidate
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,

    /// Total accepted candidates over the rule's lifetime
    #[serde(default)]
    pub trigger_count: u64,

    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

/// Input for `RuleEngine::add_rule`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,

    pub kind: RuleKind,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub conditions: Map<String, Value>,

    #[serde(default)]
    pub actions: Map<String, Value>,
}

impl NewRule {
    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            description: None,
            conditions: Map::new(),
            actions: Map::new(),
        }
    }

    pub fn with_condition(mut self, field: impl Into<String>, predicate: Value) -> Self {
        self.conditions.insert(field.into(), predicate);
        self
    }

    pub fn with_action(mut self, key: impl Into<String>, value: Value) -> Self {
        self.actions.insert(key.into(), value);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ============================================================================
// Levels and kinds
// ============================================================================

/// Shared low..critical scale used for severity, priority and urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for AlertLevel {
    fn default() -> Self {
        AlertLevel::Medium
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertLevel::Low => "low",
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictiveAlertKind {
    WearPrediction,
    FailureRisk,
    EfficiencyDecline,
    OverdueMaintenance,
}

impl PredictiveAlertKind {
    pub fn label(&self) -> &'static str {
        match self {
            PredictiveAlertKind::WearPrediction => "wear prediction",
            PredictiveAlertKind::FailureRisk => "failure risk",
            PredictiveAlertKind::EfficiencyDecline => "efficiency decline",
            PredictiveAlertKind::OverdueMaintenance => "overdue maintenance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkOrderKind {
    Ppm,
    Inspection,
    Service,
}

impl WorkOrderKind {
    pub fn label(&self) -> &'static str {
        match self {
            WorkOrderKind::Ppm => "PPM",
            WorkOrderKind::Inspection => "Inspection",
            WorkOrderKind::Service => "Service",
        }
    }
}

// ============================================================================
// Domain events
// ============================================================================

/// Predicted maintenance need for one asset. Unique by (asset_id, alert_kind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictiveAlert {
    pub id: String,
    pub asset_id: String,
    pub asset_name: String,
    pub alert_kind: PredictiveAlertKind,
    pub severity: AlertLevel,
    pub predicted_date: NaiveDate,
    /// In [0, 1]
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub triggers: Vec<String>,
}

/// Work order raised by automation. Unique by (asset_id, kind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoWorkOrder {
    pub id: String,
    pub title: String,
    pub asset_id: String,
    pub kind: WorkOrderKind,
    pub priority: AlertLevel,
    pub scheduled_date: NaiveDate,
    pub generated_by: String,
    pub source_rule_id: String,
}

/// Generator tag carried by every automation work order
pub const GENERATED_BY_AUTOMATION: &str = "automation";

/// Stock item at or below its reorder point. Unique by item_name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlert {
    pub id: String,
    pub item_name: String,
    pub current_stock: u32,
    pub minimum_level: u32,
    pub reorder_point: u32,
    pub suggested_quantity: u32,
    pub supplier: String,
    pub urgency: AlertLevel,
    pub auto_reorder_enabled: bool,
}

/// Overdue task escalated to a supervisor. Unique by task_id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationAlert {
    pub id: String,
    pub task_id: String,
    pub task_title: String,
    pub assignee: String,
    pub supervisor: String,
    pub days_overdue: u32,
    /// 1, 2 or 3
    pub escalation_level: u8,
    pub last_escalated_at: DateTime<Utc>,
}

impl EscalationAlert {
    /// Level mapped onto the shared scale for notifications
    pub fn level(&self) -> AlertLevel {
        match self.escalation_level {
            3.. => AlertLevel::Critical,
            2 => AlertLevel::High,
            _ => AlertLevel::Medium,
        }
    }
}

/// Entry stored in one of the engine collections, deduplicated by `key()`
pub trait Deduplicate {
    type Key: PartialEq;

    fn id(&self) -> &str;
    fn key(&self) -> Self::Key;
}

impl Deduplicate for PredictiveAlert {
    type Key = (String, PredictiveAlertKind);

    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> Self::Key {
        (self.asset_id.clone(), self.alert_kind)
    }
}

impl Deduplicate for AutoWorkOrder {
    type Key = (String, WorkOrderKind);

    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> Self::Key {
        (self.asset_id.clone(), self.kind)
    }
}

impl Deduplicate for StockAlert {
    type Key = String;

    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> Self::Key {
        self.item_name.clone()
    }
}

impl Deduplicate for EscalationAlert {
    type Key = String;

    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> Self::Key {
        self.task_id.clone()
    }
}

/// Evaluator proposal, not yet checked against existing entries
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Predictive(PredictiveAlert),
    WorkOrder(AutoWorkOrder),
    Stock(StockAlert),
    Escalation(EscalationAlert),
}

/// Collection selector for `dismiss_alert`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Predictive,
    WorkOrder,
    Stock,
    Escalation,
}

impl FromStr for AlertCategory {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "predictive" => Ok(AlertCategory::Predictive),
            "workorder" => Ok(AlertCategory::WorkOrder),
            "stock" => Ok(AlertCategory::Stock),
            "escalation" => Ok(AlertCategory::Escalation),
            other => Err(RuleError::validation(format!(
                "unknown alert category '{}'",
                other
            ))),
        }
    }
}

/// Point-in-time copy of engine state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationSnapshot {
    pub rules: Vec<Rule>,
    pub predictive_alerts: Vec<PredictiveAlert>,
    pub work_orders: Vec<AutoWorkOrder>,
    pub stock_alerts: Vec<StockAlert>,
    pub escalations: Vec<EscalationAlert>,
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_rule_kind_serde_names() {
        let json = serde_json::to_string(&RuleKind::StockReorder).unwrap();
        assert_eq!(json, "\"stock_reorder\"");
        let kind: RuleKind = serde_json::from_str("\"auto_work_order\"").unwrap();
        assert_eq!(kind, RuleKind::AutoWorkOrder);
    }

    #[test]
    fn test_alert_category_from_str() {
        assert_eq!(
            "workorder".parse::<AlertCategory>().unwrap(),
            AlertCategory::WorkOrder
        );
        assert!("alarms".parse::<AlertCategory>().is_err());
    }

    #[test]
    fn test_escalation_level_mapping() {
        let mut alert = EscalationAlert {
            id: "e1".to_string(),
            task_id: "T-1".to_string(),
            task_title: "Replace filter".to_string(),
            assignee: "tech".to_string(),
            supervisor: "lead".to_string(),
            days_overdue: 2,
            escalation_level: 1,
            last_escalated_at: Utc::now(),
        };
        assert_eq!(alert.level(), AlertLevel::Medium);
        alert.escalation_level = 3;
        assert_eq!(alert.level(), AlertLevel::Critical);
    }

    #[test]
    fn test_new_rule_defaults_enabled() {
        let rule = NewRule::new("Filter check", RuleKind::AutoWorkOrder);
        assert!(rule.enabled);
        assert!(!rule.disabled().enabled);
    }
}
