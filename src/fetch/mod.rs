use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::table::{Column, ColumnType, Table, Value};

pub mod bcb;
pub mod covid;
pub mod ibge;
pub mod transparencia;

/// Whether a dataset came from the live endpoint or the seeded fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Live,
    Synthetic,
}

#[derive(Debug, Clone)]
pub struct FetchedDataset {
    pub table: Table,
    pub origin: DataOrigin,
}

/// All synthetic fallbacks draw from the same fixed seed so re-runs are
/// reproducible.
pub(crate) fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

/// Persists the fetched (or synthetic) table to its fixed CSV filename and
/// wraps it with its origin.
pub(crate) fn finish(
    table: Table,
    origin: DataOrigin,
    csv_name: &str,
) -> Result<FetchedDataset, PipelineError> {
    table.write_csv(Path::new(csv_name))?;
    match origin {
        DataOrigin::Live => info!("Dataset saved to '{}'", csv_name),
        DataOrigin::Synthetic => warn!(
            "Live fetch failed; synthetic fallback dataset saved to '{}'",
            csv_name
        ),
    }
    Ok(FetchedDataset { table, origin })
}

/// Builds a table from an array of loosely-shaped JSON records: columns are
/// the union of top-level keys in first-appearance order; nested values are
/// kept as serialized text. Mixed int/float columns promote to float; any
/// other mixture degrades to text.
pub(crate) fn table_from_records(records: &[JsonValue]) -> Result<Table, PipelineError> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        let obj = record.as_object().ok_or_else(|| {
            PipelineError::payload("expected an array of JSON objects")
        })?;
        for key in obj.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let raw: Vec<Value> = records
            .iter()
            .map(|r| json_cell(r.get(&name).unwrap_or(&JsonValue::Null)))
            .collect();
        columns.push(unify_column(name, raw));
    }
    Table::new(columns)
}

fn json_cell(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn unify_column(name: String, values: Vec<Value>) -> Column {
    let mut has_int = false;
    let mut has_float = false;
    let mut has_text = false;
    let mut has_bool = false;
    for v in &values {
        match v {
            Value::Int(_) => has_int = true,
            Value::Float(_) => has_float = true,
            Value::Text(_) => has_text = true,
            Value::Bool(_) => has_bool = true,
            _ => {}
        }
    }

    if has_text || (has_bool && (has_int || has_float)) {
        let values = values
            .into_iter()
            .map(|v| if v.is_null() { v } else { Value::Text(v.render()) })
            .collect();
        Column::new(name, ColumnType::Text, values)
    } else if has_float {
        let values = values
            .into_iter()
            .map(|v| match v.as_f64() {
                Some(f) => Value::Float(f),
                None => Value::Null,
            })
            .collect();
        Column::new(name, ColumnType::Float, values)
    } else if has_int {
        Column::new(name, ColumnType::Integer, values)
    } else if has_bool {
        Column::new(name, ColumnType::Boolean, values)
    } else {
        Column::new(name, ColumnType::Text, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_with_mixed_numbers_promote_to_float() {
        let records = vec![
            json!({"id": 1, "valor": 2}),
            json!({"id": 2, "valor": 2.5, "extra": "x"}),
        ];
        let table = table_from_records(&records).unwrap();

        assert_eq!(table.column_names(), vec!["id", "valor", "extra"]);
        assert_eq!(table.column("id").unwrap().ty, ColumnType::Integer);
        assert_eq!(table.column("valor").unwrap().ty, ColumnType::Float);
        // missing key in the first record becomes null
        assert_eq!(table.column("extra").unwrap().null_count(), 1);
    }

    #[test]
    fn nested_values_are_kept_as_text() {
        let records = vec![json!({"orgao": {"nome": "ME"}, "id": 1})];
        let table = table_from_records(&records).unwrap();
        assert_eq!(table.column("orgao").unwrap().ty, ColumnType::Text);
    }

    #[test]
    fn non_object_record_is_a_payload_error() {
        let records = vec![json!([1, 2, 3])];
        assert!(table_from_records(&records).is_err());
    }
}
