use std::io::Write;

use chrono::{Duration, NaiveDate};
use flate2::read::GzDecoder;
use futures::StreamExt;
use rand::Rng;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::fetch::{finish, seeded_rng, DataOrigin, FetchedDataset};
use crate::table::{parse_date_lenient, Column, ColumnType, Table, Value};

const COVID_URL: &str = "https://data.brasil.io/dataset/covid19/caso.csv.gz";
const CSV_NAME: &str = "covid19_brasil.csv";

/// Only the trailing window of the series is kept, to bound artifact sizes.
const WINDOW_DAYS: i64 = 180;

/// Downloads the COVID-19 bulk file (gzip CSV), keeping only the most recent
/// 180 days; falls back to a seeded synthetic state-level series.
pub async fn fetch_covid() -> Result<FetchedDataset, PipelineError> {
    let (table, origin) = live_or_synthetic(COVID_URL).await;
    finish(table, origin, CSV_NAME)
}

async fn live_or_synthetic(url: &str) -> (Table, DataOrigin) {
    match fetch_live(url).await {
        Ok(table) => (table, DataOrigin::Live),
        Err(e) => {
            warn!("COVID-19 bulk download failed: {}", e);
            (synthetic_covid(), DataOrigin::Synthetic)
        }
    }
}

async fn fetch_live(url: &str) -> Result<Table, PipelineError> {
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(PipelineError::UpstreamStatus {
            status: response.status().as_u16(),
        });
    }

    // The compressed intermediate lives in a scoped temp dir, removed on drop.
    let temp_dir = tempfile::tempdir()?;
    let archive_path = temp_dir.path().join("covid19_data.csv.gz");
    let mut file = std::fs::File::create(&archive_path)?;

    let mut stream = response.bytes_stream();
    let mut total_bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        total_bytes += chunk.len() as u64;
        file.write_all(&chunk)?;
    }
    file.flush()?;
    drop(file);
    info!("Downloaded {} compressed bytes", total_bytes);

    let archive = std::fs::File::open(&archive_path)?;
    let mut table = Table::from_csv_reader(GzDecoder::new(archive))?;

    restrict_to_recent_window(&mut table);
    Ok(table)
}

/// Drops rows older than `WINDOW_DAYS` before the maximum date, when a
/// `date` column is present and parsable.
fn restrict_to_recent_window(table: &mut Table) {
    let Some(col) = table.column("date") else {
        return;
    };
    // Coerce cell by cell: one malformed date in the bulk file makes the
    // whole column infer as text, but the well-formed rows still count.
    let dates: Vec<Option<NaiveDate>> = col.values.iter().map(cell_date).collect();
    let Some(latest) = dates.iter().flatten().max().copied() else {
        return;
    };
    let cutoff = latest - Duration::days(WINDOW_DAYS);
    let keep: Vec<bool> = dates
        .iter()
        .map(|d| d.map(|d| d >= cutoff).unwrap_or(false))
        .collect();
    table.retain_rows(&keep);
}

fn cell_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::Text(s) => parse_date_lenient(s),
        _ => None,
    }
}

/// Synthetic series: 27 states x daily dates 2023-06-01..2023-12-31, with
/// deaths at 1-5% of cases.
pub fn synthetic_covid() -> Table {
    const ESTADOS: [&str; 27] = [
        "AC", "AL", "AM", "AP", "BA", "CE", "DF", "ES", "GO", "MA", "MG", "MS", "MT", "PA", "PB",
        "PE", "PI", "PR", "RJ", "RN", "RO", "RR", "RS", "SC", "SE", "SP", "TO",
    ];

    let start = NaiveDate::from_ymd_opt(2023, 6, 1).expect("valid start date");
    let end = NaiveDate::from_ymd_opt(2023, 12, 31).expect("valid end date");

    let mut rng = seeded_rng();
    let mut estados = Vec::new();
    let mut datas = Vec::new();
    let mut casos = Vec::new();
    let mut obitos = Vec::new();
    let mut populacoes = Vec::new();

    for estado in ESTADOS {
        let mut date = start;
        while date <= end {
            let cases: i64 = rng.gen_range(100..5000);
            let deaths = (cases as f64 * rng.gen_range(0.01..0.05)) as i64;
            estados.push(Value::Text(estado.to_string()));
            datas.push(Value::Date(date));
            casos.push(Value::Int(cases));
            obitos.push(Value::Int(deaths));
            populacoes.push(Value::Int(rng.gen_range(500_000..20_000_000)));
            date = date + Duration::days(1);
        }
    }

    Table::new(vec![
        Column::new("estado", ColumnType::Text, estados),
        Column::new("data", ColumnType::Timestamp, datas),
        Column::new("casos", ColumnType::Integer, casos),
        Column::new("obitos", ColumnType::Integer, obitos),
        Column::new("populacao", ColumnType::Integer, populacoes),
    ])
    .expect("synthetic columns have equal length")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_window_filter_keeps_trailing_days() {
        let data = "state,date,cases\nSP,2023-01-01,10\nSP,2023-12-31,20\nSP,2023-12-01,30\n";
        let mut table = Table::from_csv_reader(data.as_bytes()).unwrap();
        restrict_to_recent_window(&mut table);
        // 2023-01-01 is more than 180 days before 2023-12-31
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn recent_window_filter_survives_a_malformed_date_cell() {
        // One bad cell makes CSV inference type the column as text.
        let data = "state,date,cases\nSP,2023-01-01,10\nSP,2023-12-31,20\nSP,bogus,30\n";
        let mut table = Table::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(table.column("date").unwrap().ty, ColumnType::Text);

        restrict_to_recent_window(&mut table);
        // The stale and unparsable rows both go; the recent one stays.
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.column("cases").unwrap().values[0], Value::Int(20));
    }

    #[test]
    fn filter_is_a_noop_without_a_date_column() {
        let data = "state,cases\nSP,10\n";
        let mut table = Table::from_csv_reader(data.as_bytes()).unwrap();
        restrict_to_recent_window(&mut table);
        assert_eq!(table.num_rows(), 1);
    }

    #[test]
    fn synthetic_series_has_documented_schema() {
        let table = synthetic_covid();
        assert_eq!(
            table.column_names(),
            vec!["estado", "data", "casos", "obitos", "populacao"]
        );
        // 27 states, 214 days from 2023-06-01 through 2023-12-31
        assert_eq!(table.num_rows(), 27 * 214);
        assert_eq!(table.column("estado").unwrap().distinct_count(), 27);
        assert_eq!(table, synthetic_covid());
    }

    #[test]
    fn synthetic_deaths_stay_below_cases() {
        let table = synthetic_covid();
        let casos = &table.column("casos").unwrap().values;
        let obitos = &table.column("obitos").unwrap().values;
        for (c, o) in casos.iter().zip(obitos) {
            let (Value::Int(c), Value::Int(o)) = (c, o) else {
                panic!("expected integer cells");
            };
            assert!(o <= c);
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_falls_back_to_synthetic() {
        let (table, origin) = live_or_synthetic("http://127.0.0.1:9/caso.csv.gz").await;
        assert_eq!(origin, DataOrigin::Synthetic);
        assert_eq!(table, synthetic_covid());
    }
}
