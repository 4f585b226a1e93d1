use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use tracing::{info, warn};

use crate::charts;
use crate::error::PipelineError;
use crate::export;
use crate::profile::DatasetProfile;
use crate::stats;
use crate::table::{parse_date_lenient, Column, ColumnType, Table, Value};

/// Result of one characterization stage or sub-artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Completed,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageEntry {
    pub stage: String,
    pub outcome: StageOutcome,
}

/// Per-run record of what each stage produced, replacing blanket
/// catch-and-continue: the run always finishes, failures are listed here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    entries: Vec<StageEntry>,
}

impl RunReport {
    pub fn record(&mut self, stage: impl Into<String>, outcome: StageOutcome) {
        self.entries.push(StageEntry {
            stage: stage.into(),
            outcome,
        });
    }

    pub fn entries(&self) -> &[StageEntry] {
        &self.entries
    }

    pub fn failure_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, StageOutcome::Failed(_)))
            .count()
    }

    pub fn log_summary(&self) {
        for entry in &self.entries {
            match &entry.outcome {
                StageOutcome::Completed => info!("stage {}: completed", entry.stage),
                StageOutcome::Skipped(reason) => info!("stage {}: skipped ({})", entry.stage, reason),
                StageOutcome::Failed(message) => warn!("stage {}: failed ({})", entry.stage, message),
            }
        }
    }
}

/// Maximum distinct values for a categorical column to get a distribution table.
const MAX_CATEGORICAL_DISTINCT: usize = 30;
/// Maximum distinct values for a categorical column to get a bar chart.
const MAX_BARPLOT_DISTINCT: usize = 10;
/// Histogram cap and time-series numeric-column cap.
const MAX_HISTOGRAMS: usize = 5;
const MAX_SERIES_COLUMNS: usize = 3;

fn artifact(dir: &Path, name: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{name}_{suffix}"))
}

/// Runs the full exploratory characterization of `table`, writing every
/// artifact under `output_dir`. Temporal columns are coerced to timestamps in
/// place; derived year/month helpers stay out of the re-exported table.
///
/// Only a failure to write the profile sidecar propagates as an error; every
/// other stage degrades into a `RunReport` entry.
pub fn characterize(
    table: &mut Table,
    name: &str,
    output_dir: &Path,
) -> Result<(DatasetProfile, RunReport), PipelineError> {
    std::fs::create_dir_all(output_dir)?;
    let mut report = RunReport::default();

    info!(
        "Characterizing dataset '{}' ({} rows x {} columns)",
        name,
        table.num_rows(),
        table.num_cols()
    );

    // 1. Profile sidecar
    let profile = DatasetProfile::from_table(table);
    let profile_path = artifact(output_dir, name, "info.json");
    let file = std::fs::File::create(&profile_path)?;
    serde_json::to_writer_pretty(file, &profile)?;
    report.record("info", StageOutcome::Completed);

    // 2. Numeric descriptive statistics
    match write_numeric_summary(table, &artifact(output_dir, name, "estatisticas.csv")) {
        Ok(true) => report.record("estatisticas", StageOutcome::Completed),
        Ok(false) => report.record(
            "estatisticas",
            StageOutcome::Skipped("no numeric columns".to_string()),
        ),
        Err(e) => report.record("estatisticas", StageOutcome::Failed(e.to_string())),
    }

    // 3. Categorical distributions
    for col in table.columns() {
        if col.is_numeric() {
            continue;
        }
        if col.distinct_count() > MAX_CATEGORICAL_DISTINCT {
            report.record(
                format!("distribuicao_{}", col.name),
                StageOutcome::Skipped("too many distinct values".to_string()),
            );
            continue;
        }
        let path = artifact(output_dir, name, &format!("distribuicao_{}.csv", col.name));
        match write_distribution(col, &path) {
            Ok(()) => report.record(format!("distribuicao_{}", col.name), StageOutcome::Completed),
            Err(e) => report.record(
                format!("distribuicao_{}", col.name),
                StageOutcome::Failed(e.to_string()),
            ),
        }
    }

    // 4. Temporal aggregation
    let temporal = temporal_column_names(table);
    for col_name in &temporal {
        match temporal_aggregation(table, col_name, name, output_dir) {
            Ok(()) => report.record(format!("temporal_{col_name}"), StageOutcome::Completed),
            Err(e) => {
                warn!("Temporal analysis of column {} failed: {}", col_name, e);
                report.record(format!("temporal_{col_name}"), StageOutcome::Failed(e.to_string()));
            }
        }
    }
    if temporal.is_empty() {
        report.record(
            "temporal",
            StageOutcome::Skipped("no temporal columns".to_string()),
        );
    }

    // 5. Visualizations, each one best-effort
    draw_charts(table, name, output_dir, &temporal, &mut report);

    // 6. Full re-export for the BI tool
    match export::export_csv(table, &artifact(output_dir, name, "para_bi.csv")) {
        Ok(()) => report.record("para_bi_csv", StageOutcome::Completed),
        Err(e) => report.record("para_bi_csv", StageOutcome::Failed(e.to_string())),
    }
    match export::export_xlsx(table, &artifact(output_dir, name, "para_bi.xlsx")) {
        Ok(()) => report.record("para_bi_xlsx", StageOutcome::Completed),
        Err(e) => {
            warn!("Spreadsheet export failed: {}", e);
            report.record("para_bi_xlsx", StageOutcome::Failed(e.to_string()));
        }
    }

    info!(
        "Characterization of '{}' finished ({} stage entries, {} failures)",
        name,
        report.entries().len(),
        report.failure_count()
    );

    Ok((profile, report))
}

fn write_numeric_summary(table: &Table, path: &Path) -> Result<bool, PipelineError> {
    let numeric: Vec<&Column> = table.columns().iter().filter(|c| c.is_numeric()).collect();
    if numeric.is_empty() {
        return Ok(false);
    }

    let render = |v: f64| {
        if v.is_finite() {
            v.to_string()
        } else {
            String::new()
        }
    };

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["coluna", "count", "mean", "std", "min", "25%", "50%", "75%", "max"])?;
    for col in numeric {
        let values = col.numeric_values();
        match stats::describe(&values) {
            Some(d) => writer.write_record([
                col.name.clone(),
                d.count.to_string(),
                render(d.mean),
                render(d.std),
                render(d.min),
                render(d.q25),
                render(d.median),
                render(d.q75),
                render(d.max),
            ])?,
            None => writer.write_record([
                col.name.clone(),
                "0".to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ])?,
        }
    }
    writer.flush()?;
    Ok(true)
}

fn write_distribution(col: &Column, path: &Path) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([col.name.as_str(), "contagem"])?;
    for (value, count) in col.value_counts() {
        writer.write_record([value, count.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Columns treated as temporal: declared timestamps, or names carrying a
/// date-indicating substring.
fn temporal_column_names(table: &Table) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| {
            let lower = c.name.to_lowercase();
            c.ty == ColumnType::Timestamp || lower.contains("data") || lower.contains("date")
        })
        .map(|c| c.name.clone())
        .collect()
}

/// Coerces `col_name` to timestamps in place, derives transient year/month
/// vectors, and writes the per-year and per-month-of-latest-year counts.
/// The derived vectors stay local so genuine ano/mes columns (as in the
/// Selic series) are never clobbered.
fn temporal_aggregation(
    table: &mut Table,
    col_name: &str,
    name: &str,
    output_dir: &Path,
) -> Result<(), PipelineError> {
    coerce_to_dates(table, col_name)?;

    let col = table
        .column(col_name)
        .ok_or_else(|| PipelineError::Table {
            message: format!("column '{col_name}' disappeared during coercion"),
        })?;

    let anos: Vec<Option<i64>> = col
        .values
        .iter()
        .map(|v| v.as_date().map(|d| d.year() as i64))
        .collect();
    let meses: Vec<Option<i64>> = col
        .values
        .iter()
        .map(|v| v.as_date().map(|d| d.month() as i64))
        .collect();

    write_temporal_counts(&anos, &meses, name, output_dir)
}

fn write_temporal_counts(
    anos: &[Option<i64>],
    meses: &[Option<i64>],
    name: &str,
    output_dir: &Path,
) -> Result<(), PipelineError> {
    let mut by_year: BTreeMap<i64, usize> = BTreeMap::new();
    for y in anos.iter().flatten() {
        *by_year.entry(*y).or_insert(0) += 1;
    }

    let mut writer = csv::Writer::from_path(artifact(output_dir, name, "contagem_por_ano.csv"))?;
    writer.write_record(["ano", "contagem"])?;
    for (ano, contagem) in &by_year {
        writer.write_record([ano.to_string(), contagem.to_string()])?;
    }
    writer.flush()?;

    let last_year = by_year.keys().next_back().copied();
    let mut by_month: BTreeMap<i64, usize> = BTreeMap::new();
    if let Some(last_year) = last_year {
        for (ano, mes) in anos.iter().zip(meses) {
            if let (Some(y), Some(m)) = (ano, mes) {
                if *y == last_year {
                    *by_month.entry(*m).or_insert(0) += 1;
                }
            }
        }
    }

    let mut writer = csv::Writer::from_path(artifact(output_dir, name, "contagem_por_mes.csv"))?;
    writer.write_record(["mes", "contagem"])?;
    for (mes, contagem) in &by_month {
        writer.write_record([mes.to_string(), contagem.to_string()])?;
    }
    writer.flush()?;

    Ok(())
}

/// Rewrites a column as Timestamp; unparsable cells become Null.
fn coerce_to_dates(table: &mut Table, col_name: &str) -> Result<(), PipelineError> {
    let col = table
        .column_mut(col_name)
        .ok_or_else(|| PipelineError::Table {
            message: format!("no column named '{col_name}'"),
        })?;

    for value in col.values.iter_mut() {
        let coerced = match value {
            Value::Date(d) => Value::Date(*d),
            Value::Text(s) => parse_date_lenient(s).map(Value::Date).unwrap_or(Value::Null),
            Value::Int(y) if (1000..=9999).contains(y) => {
                chrono::NaiveDate::from_ymd_opt(*y as i32, 1, 1)
                    .map(Value::Date)
                    .unwrap_or(Value::Null)
            }
            _ => Value::Null,
        };
        *value = coerced;
    }
    col.ty = ColumnType::Timestamp;
    Ok(())
}

fn draw_charts(
    table: &Table,
    name: &str,
    output_dir: &Path,
    temporal: &[String],
    report: &mut RunReport,
) {
    // a. Null-occupancy map
    let path = artifact(output_dir, name, "valores_ausentes.png");
    match charts::null_map(table, &path) {
        Ok(()) => report.record("grafico_valores_ausentes", StageOutcome::Completed),
        Err(e) => report.record("grafico_valores_ausentes", StageOutcome::Failed(e.to_string())),
    }

    // b. Histograms for the first numeric columns
    let numeric = table.numeric_column_names();
    for col_name in numeric.iter().take(MAX_HISTOGRAMS) {
        let values = table
            .column(col_name)
            .map(|c| c.numeric_values())
            .unwrap_or_default();
        let stage = format!("histograma_{col_name}");
        if values.is_empty() {
            report.record(stage, StageOutcome::Skipped("no non-null values".to_string()));
            continue;
        }
        let path = artifact(output_dir, name, &format!("histograma_{col_name}.png"));
        match charts::histogram(&values, &path) {
            Ok(()) => report.record(stage, StageOutcome::Completed),
            Err(e) => report.record(stage, StageOutcome::Failed(e.to_string())),
        }
    }

    // c. Bar charts for low-cardinality categorical columns
    for col in table.columns() {
        if col.is_numeric() || col.distinct_count() > MAX_BARPLOT_DISTINCT {
            continue;
        }
        let stage = format!("barplot_{}", col.name);
        let counts: Vec<(String, usize)> = col.value_counts().into_iter().take(10).collect();
        if counts.is_empty() {
            report.record(stage, StageOutcome::Skipped("no non-null values".to_string()));
            continue;
        }
        let path = artifact(output_dir, name, &format!("barplot_{}.png", col.name));
        match charts::bar_chart(&counts, &path) {
            Ok(()) => report.record(stage, StageOutcome::Completed),
            Err(e) => report.record(stage, StageOutcome::Failed(e.to_string())),
        }
    }

    // d. Correlation matrix over numeric columns
    if numeric.len() >= 2 {
        let series: Vec<Vec<Option<f64>>> = numeric
            .iter()
            .filter_map(|n| table.column(n))
            .map(|c| c.values.iter().map(|v| v.as_f64()).collect())
            .collect();
        let matrix: Vec<Vec<Option<f64>>> = (0..series.len())
            .map(|i| {
                (0..series.len())
                    .map(|j| stats::pearson(&series[i], &series[j]))
                    .collect()
            })
            .collect();
        let path = artifact(output_dir, name, "correlacao.png");
        match charts::correlation_heatmap(&matrix, &path) {
            Ok(()) => report.record("grafico_correlacao", StageOutcome::Completed),
            Err(e) => report.record("grafico_correlacao", StageOutcome::Failed(e.to_string())),
        }
    }

    // e. Monthly-mean time series per (temporal, numeric) pair
    for temporal_name in temporal {
        for numeric_name in numeric.iter().take(MAX_SERIES_COLUMNS) {
            let stage = format!("serie_temporal_{numeric_name}");
            match monthly_means(table, temporal_name, numeric_name) {
                Some(points) if !points.is_empty() => {
                    let path =
                        artifact(output_dir, name, &format!("serie_temporal_{numeric_name}.png"));
                    match charts::time_series(&points, &path) {
                        Ok(()) => report.record(stage, StageOutcome::Completed),
                        Err(e) => report.record(stage, StageOutcome::Failed(e.to_string())),
                    }
                }
                _ => {
                    report.record(stage, StageOutcome::Skipped("no complete pairs".to_string()));
                }
            }
        }
    }
}

/// Mean of a numeric column per (year, month) of a temporal column,
/// sorted by time. The temporal column has already been coerced to dates.
fn monthly_means(table: &Table, temporal_name: &str, numeric_name: &str) -> Option<Vec<(chrono::NaiveDate, f64)>> {
    let dates = table.column(temporal_name)?;
    let values = table.column(numeric_name)?;

    let mut buckets: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for (d, v) in dates.values.iter().zip(&values.values) {
        if let (Some(d), Some(v)) = (d.as_date(), v.as_f64()) {
            let entry = buckets.entry((d.year(), d.month())).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }

    Some(
        buckets
            .into_iter()
            .filter_map(|((y, m), (sum, count))| {
                chrono::NaiveDate::from_ymd_opt(y, m, 1).map(|d| (d, sum / count as f64))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temporal_table() -> Table {
        let dates: Vec<Value> = vec![
            Value::Text("2020-03-01".into()),
            Value::Text("2020-07-15".into()),
            Value::Text("2021-01-10".into()),
            Value::Text("2022-05-20".into()),
            Value::Text("2022-06-20".into()),
            Value::Text("not a date".into()),
        ];
        let valores: Vec<Value> = vec![
            Value::Float(1.0),
            Value::Float(2.0),
            Value::Float(3.0),
            Value::Float(4.0),
            Value::Float(5.0),
            Value::Null,
        ];
        Table::new(vec![
            Column::new("data", ColumnType::Text, dates),
            Column::new("valor", ColumnType::Float, valores),
        ])
        .unwrap()
    }

    #[test]
    fn temporal_counts_partition_parsable_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = temporal_table();

        let (_, report) = characterize(&mut table, "teste", dir.path()).unwrap();

        let by_year = std::fs::read_to_string(dir.path().join("teste_contagem_por_ano.csv")).unwrap();
        let rows: Vec<&str> = by_year.lines().skip(1).collect();
        assert_eq!(rows.len(), 3, "years 2020-2022 should each get a row");
        let total: usize = rows
            .iter()
            .map(|r| r.split(',').nth(1).unwrap().parse::<usize>().unwrap())
            .sum();
        // 5 parsable dates; the unparsable one became null, not a failure
        assert_eq!(total, 5);

        let by_month = std::fs::read_to_string(dir.path().join("teste_contagem_por_mes.csv")).unwrap();
        let months: Vec<&str> = by_month.lines().skip(1).collect();
        assert_eq!(months.len(), 2, "months 5 and 6 of the latest year");

        assert!(report
            .entries()
            .iter()
            .any(|e| e.stage == "temporal_data" && e.outcome == StageOutcome::Completed));
    }

    #[test]
    fn transient_columns_do_not_leak_into_reexport() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = temporal_table();

        characterize(&mut table, "teste", dir.path()).unwrap();

        let reexport = Table::read_csv(&dir.path().join("teste_para_bi.csv")).unwrap();
        assert_eq!(reexport.column_names(), vec!["data", "valor"]);
        assert_eq!(reexport.num_rows(), 6);
        // The date column was coerced in place, so it re-exports as ISO dates.
        assert_eq!(reexport.column("data").unwrap().ty, ColumnType::Timestamp);
    }

    #[test]
    fn categorical_distribution_respects_distinct_threshold() {
        let dir = tempfile::tempdir().unwrap();

        let over: Vec<Value> = (0..31).map(|i| Value::Text(format!("cat{i}"))).collect();
        let under: Vec<Value> = (0..31).map(|i| Value::Text(format!("cat{}", i % 3))).collect();
        let mut table = Table::new(vec![
            Column::new("muitas", ColumnType::Text, over),
            Column::new("poucas", ColumnType::Text, under),
        ])
        .unwrap();

        characterize(&mut table, "cats", dir.path()).unwrap();

        assert!(!dir.path().join("cats_distribuicao_muitas.csv").exists());
        let dist = std::fs::read_to_string(dir.path().join("cats_distribuicao_poucas.csv")).unwrap();
        assert_eq!(dist.lines().count(), 4); // header + 3 categories
    }

    #[test]
    fn profile_matches_table_shape() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = temporal_table();
        let (profile, _) = characterize(&mut table, "teste", dir.path()).unwrap();

        assert_eq!(profile.num_registros, 6);
        assert_eq!(profile.num_colunas, 2);

        let raw = std::fs::read_to_string(dir.path().join("teste_info.json")).unwrap();
        let loaded: crate::profile::DatasetProfile = serde_json::from_str(&raw).unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn rerun_overwrites_identical_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = temporal_table();

        characterize(&mut table, "teste", dir.path()).unwrap();
        let first: Vec<String> = list_files(dir.path());

        let mut table2 = temporal_table();
        characterize(&mut table2, "teste", dir.path()).unwrap();
        let second: Vec<String> = list_files(dir.path());

        assert_eq!(first, second, "re-run must not create new or renamed files");
    }

    fn list_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn numeric_summary_has_one_row_per_numeric_column() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Table::new(vec![
            Column::new("a", ColumnType::Integer, vec![Value::Int(1), Value::Int(5)]),
            Column::new("b", ColumnType::Float, vec![Value::Float(0.5), Value::Null]),
            Column::new(
                "c",
                ColumnType::Text,
                vec![Value::Text("x".into()), Value::Text("y".into())],
            ),
        ])
        .unwrap();

        characterize(&mut table, "num", dir.path()).unwrap();

        let summary = std::fs::read_to_string(dir.path().join("num_estatisticas.csv")).unwrap();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 numeric columns
        assert!(lines[0].starts_with("coluna,count,mean,std,min"));
        assert!(lines[1].starts_with("a,2,3,"));
    }
}
