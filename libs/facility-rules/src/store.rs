//! Data store abstraction
//!
//! Evaluators read facility rows (assets, stock items, tasks) through the
//! `DataStore` trait. The hosted backend is an external collaborator; this
//! crate ships `MemoryStore` for tests, demos and fixture-driven runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// One record as returned by the backend
pub type Row = Map<String, Value>;

/// Table names read by the standard evaluators
pub mod tables {
    pub const ASSETS: &str = "assets";
    pub const STOCK_ITEMS: &str = "stock_items";
    pub const TASKS: &str = "tasks";
}

/// Equality filter applied by the store before rows reach an evaluator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFilter {
    equals: Vec<(String, Value)>,
}

impl RowFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| row.get(field) == Some(expected))
    }
}

/// Read access to the facility backend
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    /// Rows of `table` that pass `filter`; unknown tables yield no rows
    async fn select(&self, table: &str, filter: &RowFilter) -> Result<Vec<Row>>;
}

/// In-memory data store with concurrent access support
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<String, Vec<Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture file: a mapping of table name to a list of rows
    ///
    /// YAML (`.yaml`/`.yml`) and JSON (anything else) are accepted.
    pub fn from_fixture(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed: HashMap<String, Vec<Row>> = if is_yaml {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML fixture {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON fixture {}", path.display()))?
        };

        let store = Self::new();
        for (table, rows) in parsed {
            store.insert_rows(&table, rows);
        }
        Ok(store)
    }

    /// Append rows to a table
    pub fn insert_rows(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Replace the contents of a table
    pub fn replace_table(&self, table: &str, rows: Vec<Row>) {
        self.tables.insert(table.to_string(), rows);
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: &str, filter: &RowFilter) -> Result<Vec<Row>> {
        Ok(self
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }
}

// ============================================================================
// Row accessors
// ============================================================================

pub fn row_str<'a>(row: &'a Row, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}

/// String view of a text or numeric field (ids are often numeric in fixtures)
pub fn row_string(row: &Row, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn row_f64(row: &Row, field: &str) -> Option<f64> {
    match row.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-negative integer field; negatives clamp to 0, fractions truncate
pub fn row_u32(row: &Row, field: &str) -> Option<u32> {
    row_f64(row, field).map(|v| v.clamp(0.0, f64::from(u32::MAX)) as u32)
}

/// Date field in `YYYY-MM-DD` or RFC 3339 form
pub fn row_date(row: &Row, field: &str) -> Option<NaiveDate> {
    let raw = row_str(row, field)?.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_select_with_filter() {
        let store = MemoryStore::new();
        store.insert_rows(
            tables::TASKS,
            vec![
                row(json!({"id": "T-1", "status": "open"})),
                row(json!({"id": "T-2", "status": "completed"})),
            ],
        );

        let all = store.select(tables::TASKS, &RowFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2);

        let open = store
            .select(tables::TASKS, &RowFilter::all().eq("status", "open"))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(row_str(&open[0], "id"), Some("T-1"));
    }

    #[tokio::test]
    async fn test_unknown_table_is_empty() {
        let store = MemoryStore::new();
        let rows = store.select("nope", &RowFilter::all()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_from_yaml_fixture() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "stock_items:\n  - name: Gasket Set\n    current_stock: 2\n    reorder_point: 5\n"
        )
        .unwrap();

        let store = MemoryStore::from_fixture(file.path()).unwrap();
        assert_eq!(store.row_count(tables::STOCK_ITEMS), 1);
    }

    #[test]
    fn test_from_json_fixture() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"assets": [{{"id": "BLR-002"}}, {{"id": "CHL-001"}}]}}"#).unwrap();

        let store = MemoryStore::from_fixture(file.path()).unwrap();
        assert_eq!(store.row_count(tables::ASSETS), 2);
    }

    #[test]
    fn test_row_accessors() {
        let r = row(json!({
            "id": 42,
            "stock": "7",
            "negative": -3,
            "due": "2026-03-01",
            "stamp": "2026-03-01T08:30:00Z"
        }));
        assert_eq!(row_string(&r, "id").as_deref(), Some("42"));
        assert_eq!(row_u32(&r, "stock"), Some(7));
        assert_eq!(row_u32(&r, "negative"), Some(0));
        let expected = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(row_date(&r, "due"), Some(expected));
        assert_eq!(row_date(&r, "stamp"), Some(expected));
        assert_eq!(row_date(&r, "missing"), None);
    }
}
