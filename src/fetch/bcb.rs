use chrono::{Datelike, NaiveDate};
use rand::Rng;
use serde::Deserialize;
use tracing::warn;

use crate::error::PipelineError;
use crate::fetch::{finish, seeded_rng, DataOrigin, FetchedDataset};
use crate::table::{Column, ColumnType, Table, Value};

/// Banco Central SGS series 432: the Selic target rate.
const SELIC_URL: &str = "https://api.bcb.gov.br/dados/serie/bcdata.sgs.432/dados?formato=json";
const CSV_NAME: &str = "taxa_selic_historica.csv";

#[derive(Debug, Deserialize)]
struct SelicEntry {
    data: String,
    valor: String,
}

/// Fetches the historical Selic rate series, falling back to a seeded
/// synthetic series on any transport, status, or payload failure.
pub async fn fetch_selic() -> Result<FetchedDataset, PipelineError> {
    let (table, origin) = live_or_synthetic(SELIC_URL).await;
    finish(table, origin, CSV_NAME)
}

async fn live_or_synthetic(url: &str) -> (Table, DataOrigin) {
    match fetch_live(url).await {
        Ok(table) => (table, DataOrigin::Live),
        Err(e) => {
            warn!("BCB fetch failed: {}", e);
            (synthetic_selic(), DataOrigin::Synthetic)
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
    let entries: Vec<SelicEntry> = response.json().await?;
    table_from_entries(&entries)
}

fn table_from_entries(entries: &[SelicEntry]) -> Result<Table, PipelineError> {
    let mut datas = Vec::with_capacity(entries.len());
    let mut valores = Vec::with_capacity(entries.len());
    let mut anos = Vec::with_capacity(entries.len());
    let mut meses = Vec::with_capacity(entries.len());

    for entry in entries {
        // The series publishes dates as dd/mm/yyyy and values as decimal strings.
        let date = NaiveDate::parse_from_str(&entry.data, "%d/%m/%Y").ok();
        match date {
            Some(d) => {
                datas.push(Value::Date(d));
                anos.push(Value::Int(d.year() as i64));
                meses.push(Value::Int(d.month() as i64));
            }
            None => {
                datas.push(Value::Null);
                anos.push(Value::Null);
                meses.push(Value::Null);
            }
        }
        valores.push(
            entry
                .valor
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::Null),
        );
    }

    Table::new(vec![
        Column::new("data", ColumnType::Timestamp, datas),
        Column::new("valor", ColumnType::Float, valores),
        Column::new("ano", ColumnType::Integer, anos),
        Column::new("mes", ColumnType::Integer, meses),
    ])
}

/// Monthly synthetic rate series 2010-2023: a bounded random walk around
/// plausible Selic levels.
pub fn synthetic_selic() -> Table {
    let mut rng = seeded_rng();
    let mut datas = Vec::new();
    let mut valores = Vec::new();
    let mut anos = Vec::new();
    let mut meses = Vec::new();

    let mut rate: f64 = 10.0;
    for ano in 2010..=2023 {
        for mes in 1..=12u32 {
            rate += rng.gen_range(-0.5..0.5);
            rate = rate.clamp(2.0, 15.0);
            let date = NaiveDate::from_ymd_opt(ano, mes, 1)
                .expect("first of month is always valid");
            datas.push(Value::Date(date));
            valores.push(Value::Float((rate * 100.0).round() / 100.0));
            anos.push(Value::Int(ano as i64));
            meses.push(Value::Int(mes as i64));
        }
    }

    Table::new(vec![
        Column::new("data", ColumnType::Timestamp, datas),
        Column::new("valor", ColumnType::Float, valores),
        Column::new("ano", ColumnType::Integer, anos),
        Column::new("mes", ColumnType::Integer, meses),
    ])
    .expect("synthetic columns have equal length")
}
