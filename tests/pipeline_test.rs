use std::sync::Once;

use dadosgov::fetch::{bcb, covid, ibge, transparencia};
use dadosgov::{build_dashboard_model, characterize, StageOutcome, Table};

static INIT: Once = Once::new();

fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

#[test]
fn test_full_characterization_of_synthetic_servant_roster() {
    init_test_logging();

    // Given: the synthetic servant roster and a scratch output directory
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut table = transparencia::synthetic_servidores();
    let rows = table.num_rows();
    let cols = table.num_cols();

    // When: running the full characterization
    let result = characterize(&mut table, "servidores", dir.path());
    assert!(
        result.is_ok(),
        "{}",
        result.err().map(|e| e.to_string()).unwrap_or_default()
    );
    let (profile, report) = result.unwrap();

    // Then: the profile mirrors the dataset shape
    assert_eq!(profile.num_registros, rows);
    assert_eq!(profile.num_colunas, cols);
    for name in &profile.colunas {
        assert!(profile.tipos_dados.contains_key(name));
        assert!(profile.valores_nulos.contains_key(name));
        assert!(profile.percentual_nulos.contains_key(name));
    }

    // And: the core artifact files exist under the output directory
    for artifact in [
        "servidores_info.json",
        "servidores_estatisticas.csv",
        "servidores_distribuicao_orgao.csv",
        "servidores_distribuicao_cargo.csv",
        "servidores_contagem_por_ano.csv",
        "servidores_contagem_por_mes.csv",
        "servidores_para_bi.csv",
        "servidores_para_bi.xlsx",
    ] {
        assert!(
            dir.path().join(artifact).exists(),
            "missing artifact {artifact}"
        );
    }

    // And: the near-unique nome column got no distribution table
    assert!(!dir.path().join("servidores_distribuicao_nome.csv").exists());

    // And: no stage aborted the run
    assert!(
        report
            .entries()
            .iter()
            .any(|e| e.outcome == StageOutcome::Completed),
        "at least one stage should complete"
    );
}

#[test]
fn test_reexport_round_trip_preserves_shape() {
    init_test_logging();

    // Given: a characterized synthetic Selic series
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut table = bcb::synthetic_selic();
    let original_names = table.column_names();
    let original_rows = table.num_rows();

    // When
    characterize(&mut table, "taxa_selic", dir.path()).expect("characterization should succeed");

    // Then: the delimited re-export loads back with the same shape, and the
    // transient helper columns derived during temporal analysis are gone
    let loaded = Table::read_csv(&dir.path().join("taxa_selic_para_bi.csv"))
        .expect("re-export should be readable");
    assert_eq!(loaded.column_names(), original_names);
    assert_eq!(loaded.num_rows(), original_rows);
}

#[test]
fn test_every_synthetic_fallback_matches_its_documented_schema() {
    init_test_logging();

    // Given/Then: each fallback generator produces a non-empty dataset with
    // the schema its live counterpart documents
    let cases: Vec<(Vec<&str>, Table)> = vec![
        (
            vec!["data", "populacao", "periodo"],
            ibge::synthetic_demografia(),
        ),
        (
            vec!["indicador", "localidade_id", "localidade_nome", "ano", "valor"],
            ibge::synthetic_pib(),
        ),
        (
            vec!["id", "nome", "orgao", "cargo", "salario", "data_ingresso"],
            transparencia::synthetic_servidores(),
        ),
        (vec!["data", "valor", "ano", "mes"], bcb::synthetic_selic()),
        (
            vec!["estado", "data", "casos", "obitos", "populacao"],
            covid::synthetic_covid(),
        ),
    ];

    for (expected, table) in cases {
        assert_eq!(table.column_names(), expected);
        assert!(table.num_rows() > 0, "fallback dataset must not be empty");
    }
}

#[test]
fn test_dashboard_model_written_next_to_artifacts() {
    init_test_logging();

    // Given
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut table = ibge::synthetic_pib();
    characterize(&mut table, "pib_municipios", dir.path()).expect("characterization should succeed");

    // When
    let model = build_dashboard_model("pib_municipios", dir.path())
        .expect("dashboard model generation should succeed");

    // Then
    assert_eq!(model.pages.len(), 2);
    let model_path = dir.path().join("modelo_dashboard_pib_municipios.json");
    assert!(model_path.exists());

    let raw = std::fs::read_to_string(model_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        parsed["dashboardTitle"],
        "Caracterização do Dataset - pib_municipios"
    );
    assert_eq!(parsed["pages"][0]["visualizations"][0]["type"], "card");
}

#[test]
fn test_characterization_is_idempotent_at_the_file_level() {
    init_test_logging();

    // Given
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut first = covid::synthetic_covid();
    characterize(&mut first, "covid19", dir.path()).expect("first run should succeed");
    let mut listing_first: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    listing_first.sort();

    // When: re-running against the same directory
    let mut second = covid::synthetic_covid();
    characterize(&mut second, "covid19", dir.path()).expect("second run should succeed");
    let mut listing_second: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    listing_second.sort();

    // Then: identical filename sets, nothing duplicated or renamed
    assert_eq!(listing_first, listing_second);
}
