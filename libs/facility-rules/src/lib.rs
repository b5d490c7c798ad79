//! Facility Rules - automation rule engine for facility management
//!
//! Periodically evaluates automation rules against asset, stock and task data
//! and turns matches into four kinds of output:
//! - Predictive maintenance alerts
//! - Auto-generated work orders
//! - Low-stock alerts (optionally with an automatic reorder)
//! - Overdue task escalations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │  Scheduler  │────▶│  RuleEngine  │────▶│ Evaluators  │
//! │  (5 min)    │     │ (dedup/store)│     │ (per kind)  │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!                            │                    │
//!                            ▼                    ▼
//!                     ┌──────────────┐     ┌─────────────┐
//!                     │ Notification │     │  DataStore  │
//!                     │    Sink      │     │ (rows)      │
//!                     └──────────────┘     └─────────────┘
//! ```
//!
//! Every alert collection holds at most one entry per uniqueness key, so
//! re-running a tick over unchanged data adds nothing.

pub mod clock;
pub mod condition;
mod engine;
mod error;
pub mod evaluators;
pub mod logger;
pub mod notify;
mod scheduler;
pub mod seed;
pub mod store;
pub mod types;

// Re-export public API
pub use clock::{Clock, ManualClock, SystemClock};
pub use condition::{format_conditions, ComparisonOperator, Condition};
pub use engine::{EngineStatus, RuleEngine, RuleOutcome, TickReport, DEFAULT_EVALUATOR_TIMEOUT};
pub use error::{Result, RuleError};
pub use evaluators::{Evaluator, EvaluatorSet};
pub use logger::{RuleLogger, RuleLoggerManager};
pub use notify::{
    ChannelSink, Notification, NotificationSeverity, NotificationSink, RecordingSink, TracingSink,
};
pub use scheduler::{TickSchedule, DEFAULT_INITIAL_DELAY, DEFAULT_PERIOD};
pub use store::{DataStore, MemoryStore, Row, RowFilter};

// Re-export rule and alert types for convenience
pub use types::{
    AlertCategory, AlertLevel, AutoWorkOrder, AutomationSnapshot, Candidate, EscalationAlert,
    NewRule, PredictiveAlert, PredictiveAlertKind, Rule, RuleKind, StockAlert, WorkOrderKind,
};
