//! Engine assembly from configuration

use anyhow::{Context, Result};
use facility_rules::seed::default_rules;
use facility_rules::store::tables;
use facility_rules::{
    Clock, EvaluatorSet, MemoryStore, NotificationSink, RuleEngine, RuleLoggerManager,
    SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AutomationConfig;

/// Load the data store; `--fixture` wins over `data.fixture_path`
pub fn load_store(config: &AutomationConfig, fixture: Option<PathBuf>) -> Result<MemoryStore> {
    let Some(path) = fixture.or_else(|| config.data.fixture_path.clone()) else {
        warn!("No fixture configured, evaluators will see empty tables");
        return Ok(MemoryStore::new());
    };

    let store = MemoryStore::from_fixture(&path)
        .with_context(|| format!("Failed to load fixture {}", path.display()))?;
    info!(
        "Fixture {}: {} assets, {} stock items, {} tasks",
        path.display(),
        store.row_count(tables::ASSETS),
        store.row_count(tables::STOCK_ITEMS),
        store.row_count(tables::TASKS)
    );
    Ok(store)
}

/// Build a seeded engine over `store`
pub fn build_engine(
    config: &AutomationConfig,
    store: MemoryStore,
    sink: Arc<dyn NotificationSink>,
) -> RuleEngine {
    let clock = Arc::new(SystemClock);
    let rules = default_rules(clock.now());
    info!("Seeded {} rules", rules.len());

    let mut engine = RuleEngine::new(EvaluatorSet::standard(Arc::new(store)), sink, clock)
        .with_rules(rules)
        .with_evaluator_timeout(config.tick_schedule().evaluator_timeout);

    if let Some(dir) = &config.logging.rule_log_dir {
        info!("Rule logs: {:?}", dir);
        engine = engine.with_rule_logs(RuleLoggerManager::new(dir.clone()));
    }
    engine
}
