//! Built-in rule set loaded at service start

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::types::{Rule, RuleKind};

pub const HVAC_WEAR_RULE_ID: &str = "hvac-wear-prediction";
pub const PPM_WORK_ORDER_RULE_ID: &str = "ppm-work-orders";
pub const LOW_STOCK_RULE_ID: &str = "low-stock-reorder";
pub const OVERDUE_TASK_RULE_ID: &str = "overdue-task-escalation";

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn seed_rule(
    id: &str,
    name: &str,
    description: &str,
    kind: RuleKind,
    conditions: Value,
    actions: Value,
    now: DateTime<Utc>,
) -> Rule {
    Rule {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        kind,
        enabled: true,
        conditions: object(conditions),
        actions: object(actions),
        last_triggered_at: None,
        trigger_count: 0,
        created_at: now,
    }
}

/// One enabled rule per kind
pub fn default_rules(now: DateTime<Utc>) -> Vec<Rule> {
    vec![
        seed_rule(
            HVAC_WEAR_RULE_ID,
            "HVAC wear prediction",
            "Flag HVAC assets with high runtime since their last service",
            RuleKind::PredictiveMaintenance,
            json!({
                "category": "hvac",
                "runtime_hours": { "operator": ">=", "value": 5000 },
            }),
            json!({
                "alert_kind": "wear_prediction",
                "severity": "high",
                "confidence": 0.82,
                "horizon_days": 21,
            }),
            now,
        ),
        seed_rule(
            PPM_WORK_ORDER_RULE_ID,
            "PPM work orders",
            "Raise planned maintenance for assets due within two weeks",
            RuleKind::AutoWorkOrder,
            json!({
                "days_until_service": { "operator": "<=", "value": 14 },
            }),
            json!({
                "work_order_kind": "ppm",
                "priority": "medium",
            }),
            now,
        ),
        seed_rule(
            LOW_STOCK_RULE_ID,
            "Low stock reorder",
            "Alert when spare parts fall to their reorder point",
            RuleKind::StockReorder,
            json!({}),
            json!({
                "auto_reorder": false,
                "reorder_multiplier": 2,
            }),
            now,
        ),
        seed_rule(
            OVERDUE_TASK_RULE_ID,
            "Overdue task escalation",
            "Escalate open tasks past their due date to the supervisor",
            RuleKind::Escalation,
            json!({}),
            json!({
                "level_two_days": 3,
                "level_three_days": 7,
            }),
            now,
        ),
    ]
}
