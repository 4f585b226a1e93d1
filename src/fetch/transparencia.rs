use chrono::{Duration, NaiveDate};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::PipelineError;
use crate::fetch::{finish, seeded_rng, table_from_records, DataOrigin, FetchedDataset};
use crate::table::{Column, ColumnType, Table, Value};

const SERVIDORES_URL: &str = "http://api.portaldatransparencia.gov.br/api-de-dados/servidores";
const CSV_NAME: &str = "servidores_federais.csv";

/// Registration at the portal is required for a real key; the placeholder
/// keeps the request shape intact and the fallback covers the rejection.
const API_KEY: &str = "sua-chave-aqui";

const PAGE: u32 = 1;
const PAGE_SIZE: u32 = 100;

/// Fetches one page of the federal-servant roster from the Portal da
/// Transparência, falling back to a seeded synthetic roster.
pub async fn fetch_servidores() -> Result<FetchedDataset, PipelineError> {
    let (table, origin) = live_or_synthetic(SERVIDORES_URL).await;
    finish(table, origin, CSV_NAME)
}

async fn live_or_synthetic(url: &str) -> (Table, DataOrigin) {
    match fetch_live(url).await {
        Ok(table) => (table, DataOrigin::Live),
        Err(e) => {
            warn!("Transparência fetch failed: {}", e);
            (synthetic_servidores(), DataOrigin::Synthetic)
        }
    }
}

async fn fetch_live(url: &str) -> Result<Table, PipelineError> {
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .query(&[("pagina", PAGE), ("tamanhoPagina", PAGE_SIZE)])
        .header("accept", "*/*")
        .header("chave-api-dados", API_KEY)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(PipelineError::UpstreamStatus {
            status: response.status().as_u16(),
        });
    }

    let records: Vec<JsonValue> = response.json().await?;
    if records.is_empty() {
        return Err(PipelineError::payload("empty servant roster page"));
    }
    table_from_records(&records)
}

/// Synthetic roster of 1000 servants: five ministries, five roles, salaries
/// drawn from Normal(8000, 3000), weekly hire dates from 2000-01-01.
pub fn synthetic_servidores() -> Table {
    const ORGAOS: [&str; 5] = [
        "Ministério da Educação",
        "Ministério da Saúde",
        "Ministério da Economia",
        "Ministério da Defesa",
        "Outros",
    ];
    const CARGOS: [&str; 5] = [
        "Analista",
        "Técnico",
        "Especialista",
        "Assistente",
        "Coordenador",
    ];
    const N: usize = 1000;

    let mut rng = seeded_rng();
    let salario_dist = Normal::new(8000.0, 3000.0).expect("valid distribution parameters");
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid start date");

    let mut ids = Vec::with_capacity(N);
    let mut nomes = Vec::with_capacity(N);
    let mut orgaos = Vec::with_capacity(N);
    let mut cargos = Vec::with_capacity(N);
    let mut salarios = Vec::with_capacity(N);
    let mut ingressos = Vec::with_capacity(N);

    for i in 0..N {
        ids.push(Value::Int(i as i64 + 1));
        nomes.push(Value::Text(format!("Servidor {}", i + 1)));
        orgaos.push(Value::Text(ORGAOS[rng.gen_range(0..ORGAOS.len())].to_string()));
        cargos.push(Value::Text(CARGOS[rng.gen_range(0..CARGOS.len())].to_string()));
        let salario: f64 = salario_dist.sample(&mut rng);
        salarios.push(Value::Float((salario * 100.0).round() / 100.0));
        ingressos.push(Value::Date(start + Duration::weeks(i as i64)));
    }

    Table::new(vec![
        Column::new("id", ColumnType::Integer, ids),
        Column::new("nome", ColumnType::Text, nomes),
        Column::new("orgao", ColumnType::Text, orgaos),
        Column::new("cargo", ColumnType::Text, cargos),
        Column::new("salario", ColumnType::Float, salarios),
        Column::new("data_ingresso", ColumnType::Timestamp, ingressos),
    ])
    .expect("synthetic columns have equal length")
}
