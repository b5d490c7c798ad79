//! Rule execution logger
//!
//! Provides independent log files for each rule, capturing every evaluation:
//! accepted and duplicate counts, the accepted items and the outcome.

use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{Local, Utc};
use tracing::warn;

use crate::engine::RuleOutcome;

/// Logger for individual rule execution
pub struct RuleLogger {
    rule_id: String,
    log_dir: PathBuf,
    current_date: Mutex<String>,
    current_file: Mutex<Option<File>>,
}

impl RuleLogger {
    /// Create a new RuleLogger for a specific rule
    ///
    /// Log files will be created in: `{log_root}/rules/{rule_id}/`
    /// with naming format: `{YYYYMMDD}_{rule_id}.log`
    pub fn new(log_root: &Path, rule_id: &str) -> Self {
        let rule_dir = log_root.join("rules").join(rule_id);
        if let Err(e) = fs::create_dir_all(&rule_dir) {
            warn!("Log dir err {:?}: {}", rule_dir, e);
        }

        Self {
            rule_id: rule_id.to_string(),
            log_dir: rule_dir,
            current_date: Mutex::new(String::new()),
            current_file: Mutex::new(None),
        }
    }

    /// Log one evaluation
    ///
    /// Format: `timestamp [RULE] rule_id kind accepted=N dup=M | items | outcome`
    pub fn log_outcome(&self, outcome: &RuleOutcome) {
        let items = if outcome.accepted_items.is_empty() {
            "-".to_string()
        } else {
            outcome.accepted_items.join(", ")
        };

        let message = format!(
            "{} accepted={} dup={} | {} | {}",
            outcome.kind,
            outcome.accepted,
            outcome.duplicates,
            items,
            format_outcome(outcome)
        );
        self.write_line(&message);
    }

    fn write_line(&self, message: &str) {
        let today = Local::now().format("%Y%m%d").to_string();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");

        let Ok(mut current_date) = self.current_date.lock() else {
            warn!("Date lock fail");
            return;
        };
        let Ok(mut file_guard) = self.current_file.lock() else {
            warn!("File lock fail");
            return;
        };

        if *current_date != today {
            // New day - open new file
            *current_date = today.clone();
            let file_path = self.log_dir.join(format!("{}_{}.log", today, self.rule_id));

            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_path)
            {
                Ok(file) => *file_guard = Some(file),
                Err(e) => {
                    warn!("Log open err {:?}: {}", file_path, e);
                    return;
                },
            }
        }

        if let Some(ref mut file) = *file_guard {
            let line = format!("{} [RULE] {} {}\n", timestamp, self.rule_id, message);
            if let Err(e) = file.write_all(line.as_bytes()) {
                warn!("Log write err: {}", e);
            }
        }
    }
}

fn format_outcome(outcome: &RuleOutcome) -> String {
    if outcome.timed_out {
        return "timeout".to_string();
    }
    match &outcome.error {
        Some(err) => format!("error: {}", err),
        None if outcome.accepted == 0 => "no change".to_string(),
        None => "OK".to_string(),
    }
}

/// Manager for multiple rule loggers
pub struct RuleLoggerManager {
    log_root: PathBuf,
    loggers: Mutex<HashMap<String, Arc<RuleLogger>>>,
}

impl RuleLoggerManager {
    pub fn new(log_root: PathBuf) -> Self {
        Self {
            log_root,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create a logger for a specific rule
    pub fn get_logger(&self, rule_id: &str) -> Arc<RuleLogger> {
        let Ok(mut loggers) = self.loggers.lock() else {
            warn!("Loggers lock fail, temp logger");
            return Arc::new(RuleLogger::new(&self.log_root, rule_id));
        };

        if let Some(logger) = loggers.get(rule_id) {
            return Arc::clone(logger);
        }

        let logger = Arc::new(RuleLogger::new(&self.log_root, rule_id));
        loggers.insert(rule_id.to_string(), Arc::clone(&logger));
        logger
    }

    /// Remove a logger (e.g., when rule is deleted)
    pub fn remove_logger(&self, rule_id: &str) {
        if let Ok(mut loggers) = self.loggers.lock() {
            loggers.remove(rule_id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::types::RuleKind;

    fn outcome(accepted: usize, error: Option<&str>) -> RuleOutcome {
        RuleOutcome {
            rule_id: "rule-stock".to_string(),
            kind: RuleKind::StockReorder,
            accepted,
            duplicates: 1,
            accepted_items: if accepted > 0 {
                vec!["Gasket Set".to_string()]
            } else {
                vec![]
            },
            error: error.map(str::to_string),
            timed_out: false,
        }
    }

    #[test]
    fn test_format_outcome() {
        assert_eq!(format_outcome(&outcome(1, None)), "OK");
        assert_eq!(format_outcome(&outcome(0, None)), "no change");
        assert_eq!(
            format_outcome(&outcome(0, Some("store down"))),
            "error: store down"
        );

        let mut timed_out = outcome(0, None);
        timed_out.timed_out = true;
        assert_eq!(format_outcome(&timed_out), "timeout");
    }

    #[test]
    fn test_log_outcome_writes_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = RuleLoggerManager::new(dir.path().to_path_buf());

        let logger = manager.get_logger("rule-stock");
        logger.log_outcome(&outcome(1, None));

        let today = Local::now().format("%Y%m%d").to_string();
        let path = dir
            .path()
            .join("rules")
            .join("rule-stock")
            .join(format!("{}_rule-stock.log", today));
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("[RULE] rule-stock stock_reorder accepted=1 dup=1 | Gasket Set | OK"));
    }

    #[test]
    fn test_manager_reuses_logger() {
        let dir = tempfile::tempdir().unwrap();
        let manager = RuleLoggerManager::new(dir.path().to_path_buf());

        let a = manager.get_logger("r1");
        let b = manager.get_logger("r1");
        assert!(Arc::ptr_eq(&a, &b));

        manager.remove_logger("r1");
        let c = manager.get_logger("r1");
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
