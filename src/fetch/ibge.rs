use chrono::NaiveDate;
use rand::Rng;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::PipelineError;
use crate::fetch::{finish, seeded_rng, DataOrigin, FetchedDataset};
use crate::table::{Column, ColumnType, Table, Value};

const PROJECAO_URL: &str = "https://servicodados.ibge.gov.br/api/v1/projecoes/populacao";
const PIB_URL: &str =
    "https://servicodados.ibge.gov.br/api/v1/pesquisas/indicadores/47001/resultados";

const PROJECAO_CSV: &str = "dados_populacionais_brasil.csv";
const PIB_CSV: &str = "pib_municipios.csv";

/// Fetches the IBGE national population projection.
pub async fn fetch_demografia() -> Result<FetchedDataset, PipelineError> {
    let (table, origin) = projecao_or_synthetic(PROJECAO_URL).await;
    finish(table, origin, PROJECAO_CSV)
}

/// Fetches municipal GDP figures (IBGE indicator 47001), flattening the
/// nested indicator/locality/series payload into one row per observation.
pub async fn fetch_pib_municipios() -> Result<FetchedDataset, PipelineError> {
    let (table, origin) = pib_or_synthetic(PIB_URL).await;
    finish(table, origin, PIB_CSV)
}

async fn projecao_or_synthetic(url: &str) -> (Table, DataOrigin) {
    match fetch_projecao_live(url).await {
        Ok(table) => (table, DataOrigin::Live),
        Err(e) => {
            warn!("IBGE projection fetch failed: {}", e);
            (synthetic_demografia(), DataOrigin::Synthetic)
        }
    }
}

async fn pib_or_synthetic(url: &str) -> (Table, DataOrigin) {
    match fetch_pib_live(url).await {
        Ok(table) => (table, DataOrigin::Live),
        Err(e) => {
            warn!("IBGE municipal GDP fetch failed: {}", e);
            (synthetic_pib(), DataOrigin::Synthetic)
        }
    }
}

async fn fetch_projecao_live(url: &str) -> Result<Table, PipelineError> {
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(PipelineError::UpstreamStatus {
            status: response.status().as_u16(),
        });
    }
    let payload: JsonValue = response.json().await?;
    projecao_table(&payload)
}

fn projecao_table(payload: &JsonValue) -> Result<Table, PipelineError> {
    let items = payload
        .get("projecao")
        .and_then(|p| p.as_array())
        .ok_or_else(|| PipelineError::payload("missing 'projecao' array"))?;

    let mut datas = Vec::with_capacity(items.len());
    let mut populacoes = Vec::with_capacity(items.len());
    let mut periodos = Vec::with_capacity(items.len());

    for item in items {
        datas.push(match item.get("data").and_then(|v| v.as_str()) {
            Some(s) => crate::table::parse_date_lenient(s)
                .map(Value::Date)
                .unwrap_or_else(|| Value::Text(s.to_string())),
            None => Value::Null,
        });
        populacoes.push(
            item.get("populacao")
                .and_then(|v| v.as_i64())
                .map(Value::Int)
                .unwrap_or(Value::Null),
        );
        periodos.push(
            item.get("periodo")
                .map(|v| match v.as_str() {
                    Some(s) => Value::Text(s.to_string()),
                    None => Value::Text(v.to_string()),
                })
                .unwrap_or(Value::Null),
        );
    }

    // If every date parsed, the column is a proper timestamp; otherwise it
    // stays textual and the characterizer coerces it later by name.
    let all_dates = datas.iter().all(|v| matches!(v, Value::Date(_) | Value::Null));
    let data_ty = if all_dates {
        ColumnType::Timestamp
    } else {
        ColumnType::Text
    };

    Table::new(vec![
        Column::new("data", data_ty, datas),
        Column::new("populacao", ColumnType::Integer, populacoes),
        Column::new("periodo", ColumnType::Text, periodos),
    ])
}

async fn fetch_pib_live(url: &str) -> Result<Table, PipelineError> {
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(PipelineError::UpstreamStatus {
            status: response.status().as_u16(),
        });
    }
    let payload: JsonValue = response.json().await?;
    pib_table(&payload)
}

/// Flattens indicador -> resultados -> localidades -> series -> {ano: valor}
/// into one row per (indicador, localidade, ano), skipping absent values.
fn pib_table(payload: &JsonValue) -> Result<Table, PipelineError> {
    let items = payload
        .as_array()
        .ok_or_else(|| PipelineError::payload("expected a top-level array of indicators"))?;

    let mut indicadores = Vec::new();
    let mut ids = Vec::new();
    let mut nomes = Vec::new();
    let mut anos = Vec::new();
    let mut valores = Vec::new();

    for item in items {
        let indicador = item
            .get("indicador")
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_default();

        let resultados = item
            .get("resultados")
            .and_then(|r| r.as_array())
            .ok_or_else(|| PipelineError::payload("indicator without 'resultados'"))?;

        for resultado in resultados {
            let localidades = resultado
                .get("localidades")
                .and_then(|l| l.as_array())
                .ok_or_else(|| PipelineError::payload("result without 'localidades'"))?;

            for localidade in localidades {
                let id = localidade
                    .get("id")
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .unwrap_or_default();
                let nome = localidade
                    .get("nome")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();

                let series = localidade
                    .get("series")
                    .and_then(|s| s.as_array())
                    .ok_or_else(|| PipelineError::payload("locality without 'series'"))?;

                for serie in series {
                    let points = serie
                        .get("serie")
                        .and_then(|s| s.as_object())
                        .ok_or_else(|| PipelineError::payload("series without 'serie' map"))?;

                    for (ano, valor) in points {
                        if valor.is_null() {
                            continue;
                        }
                        let parsed = match valor {
                            JsonValue::Number(n) => n.as_f64().map(Value::Float),
                            JsonValue::String(s) => s.parse::<f64>().ok().map(Value::Float),
                            _ => None,
                        };
                        indicadores.push(Value::Text(indicador.clone()));
                        ids.push(Value::Text(id.clone()));
                        nomes.push(Value::Text(nome.clone()));
                        anos.push(Value::Text(ano.clone()));
                        valores.push(parsed.unwrap_or(Value::Null));
                    }
                }
            }
        }
    }

    Table::new(vec![
        Column::new("indicador", ColumnType::Text, indicadores),
        Column::new("localidade_id", ColumnType::Text, ids),
        Column::new("localidade_nome", ColumnType::Text, nomes),
        Column::new("ano", ColumnType::Text, anos),
        Column::new("valor", ColumnType::Float, valores),
    ])
}

/// Yearly synthetic projection 2010-2023: population compounding between
/// 0.5% and 1.5% per year from a 200M base.
pub fn synthetic_demografia() -> Table {
    let mut rng = seeded_rng();
    let mut datas = Vec::new();
    let mut populacoes = Vec::new();
    let mut periodos = Vec::new();

    let mut populacao = 200_000_000f64;
    for ano in 2010..=2023 {
        populacao *= 1.0 + rng.gen_range(0.005..0.015);
        datas.push(Value::Date(
            NaiveDate::from_ymd_opt(ano, 7, 1).expect("mid-year date is valid"),
        ));
        populacoes.push(Value::Int(populacao as i64));
        periodos.push(Value::Text(ano.to_string()));
    }

    Table::new(vec![
        Column::new("data", ColumnType::Timestamp, datas),
        Column::new("populacao", ColumnType::Integer, populacoes),
        Column::new("periodo", ColumnType::Text, periodos),
    ])
    .expect("synthetic columns have equal length")
}

/// Synthetic GDP series for ten large municipalities, 2010-2020, with an
/// approximately 3% mean yearly growth random walk.
pub fn synthetic_pib() -> Table {
    const MUNICIPIOS: [(&str, &str); 10] = [
        ("3550308", "São Paulo"),
        ("3304557", "Rio de Janeiro"),
        ("5300108", "Brasília"),
        ("2927408", "Salvador"),
        ("3106200", "Belo Horizonte"),
        ("2304400", "Fortaleza"),
        ("1302603", "Manaus"),
        ("2611606", "Recife"),
        ("5103403", "Cuiabá"),
        ("4106902", "Curitiba"),
    ];

    let mut rng = seeded_rng();
    let mut indicadores = Vec::new();
    let mut ids = Vec::new();
    let mut nomes = Vec::new();
    let mut anos = Vec::new();
    let mut valores = Vec::new();

    for (id, nome) in MUNICIPIOS {
        let mut pib: f64 = rng.gen_range(1_000_000.0..100_000_000.0);
        for ano in 2010..=2020 {
            pib *= 1.0 + rng.gen_range(-0.01..0.07);
            indicadores.push(Value::Text("PIB Municipal".to_string()));
            ids.push(Value::Text(id.to_string()));
            nomes.push(Value::Text(nome.to_string()));
            anos.push(Value::Text(ano.to_string()));
            valores.push(Value::Float((pib * 100.0).round() / 100.0));
        }
    }

    Table::new(vec![
        Column::new("indicador", ColumnType::Text, indicadores),
        Column::new("localidade_id", ColumnType::Text, ids),
        Column::new("localidade_nome", ColumnType::Text, nomes),
        Column::new("ano", ColumnType::Text, anos),
        Column::new("valor", ColumnType::Float, valores),
    ])
    .expect("synthetic columns have equal length")
}
