use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::table::Table;

/// Schema and null-rate summary of a dataset, persisted as the
/// `{name}_info.json` sidecar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetProfile {
    pub num_registros: usize,
    pub num_colunas: usize,
    pub colunas: Vec<String>,
    pub tipos_dados: BTreeMap<String, String>,
    pub valores_nulos: BTreeMap<String, usize>,
    pub percentual_nulos: BTreeMap<String, f64>,
}

impl DatasetProfile {
    pub fn from_table(table: &Table) -> Self {
        let num_registros = table.num_rows();
        let mut tipos_dados = BTreeMap::new();
        let mut valores_nulos = BTreeMap::new();
        let mut percentual_nulos = BTreeMap::new();

        for col in table.columns() {
            let nulls = col.null_count();
            let pct = if num_registros == 0 {
                0.0
            } else {
                100.0 * nulls as f64 / num_registros as f64
            };
            tipos_dados.insert(col.name.clone(), col.ty.as_str().to_string());
            valores_nulos.insert(col.name.clone(), nulls);
            percentual_nulos.insert(col.name.clone(), pct);
        }

        Self {
            num_registros,
            num_colunas: table.num_cols(),
            colunas: table.column_names(),
            tipos_dados,
            valores_nulos,
            percentual_nulos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnType, Value};

    #[test]
    fn profile_counts_every_column_once() {
        let table = Table::new(vec![
            Column::new(
                "a",
                ColumnType::Integer,
                vec![Value::Int(1), Value::Null, Value::Int(3), Value::Null],
            ),
            Column::new(
                "b",
                ColumnType::Text,
                vec![
                    Value::Text("x".into()),
                    Value::Text("y".into()),
                    Value::Null,
                    Value::Text("z".into()),
                ],
            ),
        ])
        .unwrap();

        let profile = DatasetProfile::from_table(&table);
        assert_eq!(profile.num_registros, 4);
        assert_eq!(profile.num_colunas, 2);
        assert_eq!(profile.colunas, vec!["a", "b"]);
        for name in &profile.colunas {
            assert!(profile.tipos_dados.contains_key(name));
            assert!(profile.valores_nulos.contains_key(name));
            assert!(profile.percentual_nulos.contains_key(name));
        }
        assert_eq!(profile.valores_nulos["a"], 2);
        assert!((profile.percentual_nulos["a"] - 50.0).abs() < 1e-12);
        assert!((profile.percentual_nulos["b"] - 25.0).abs() < 1e-12);
        assert_eq!(profile.tipos_dados["a"], "integer");
    }

    #[test]
    fn empty_table_yields_zero_percentages() {
        let table = Table::new(vec![Column::new("a", ColumnType::Integer, vec![])]).unwrap();
        let profile = DatasetProfile::from_table(&table);
        assert_eq!(profile.num_registros, 0);
        assert_eq!(profile.percentual_nulos["a"], 0.0);
    }
}
