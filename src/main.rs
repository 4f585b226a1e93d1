use std::io::BufRead;
use std::path::Path;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dadosgov::fetch::{bcb, covid, ibge, transparencia};
use dadosgov::{build_dashboard_model, characterize, DataOrigin, FetchedDataset, PipelineError};

const OUTPUT_DIR: &str = "output";
const DEFAULT_CHOICE: u32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dadosgov=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("Iniciando processo de extração e caracterização de dados governamentais");
    println!();
    println!("** Selecionando dataset para extração **");
    println!("1. Dados demográficos (IBGE)");
    println!("2. PIB Municipal (IBGE)");
    println!("3. Dados de Servidores (Portal da Transparência)");
    println!("4. Taxa Selic (Banco Central)");
    println!("5. Dados de COVID-19");
    println!("Escolha uma opção (1-5): ");

    let choice = read_choice();

    let (dataset_name, fetched) = match run_fetch(choice).await {
        Ok(pair) => pair,
        Err(e) => {
            // Fetchers absorb upstream failures; reaching here means a local
            // filesystem problem. Log it and still terminate normally.
            error!("Extraction failed: {}", e);
            return Ok(());
        }
    };

    if fetched.origin == DataOrigin::Synthetic {
        warn!(
            "Dataset '{}' is a synthetic fallback; the live source was unavailable",
            dataset_name
        );
    }

    println!();
    println!("Caracterizando dataset: {dataset_name}");

    let mut table = fetched.table;
    let output_dir = Path::new(OUTPUT_DIR);
    match characterize(&mut table, dataset_name, output_dir) {
        Ok((profile, report)) => {
            report.log_summary();
            info!(
                "Profile: {} rows, {} columns",
                profile.num_registros, profile.num_colunas
            );
        }
        Err(e) => {
            error!("Characterization failed: {}", e);
            return Ok(());
        }
    }

    println!();
    println!("Criando modelo de dashboard para Power BI");
    if let Err(e) = build_dashboard_model(dataset_name, output_dir) {
        error!("Dashboard model generation failed: {}", e);
        return Ok(());
    }

    println!();
    println!("Processo completo!");
    println!("Arquivos gerados na pasta: {OUTPUT_DIR}");
    println!("Agora você pode importar esses arquivos no Power BI, Tableau ou Google Data Studio");
    println!();
    println!("Para criar o dashboard no Power BI:");
    println!("1. Abra o Power BI Desktop");
    println!("2. Clique em 'Obter Dados' > 'Arquivo' > 'Excel' ou 'CSV'");
    println!(
        "3. Navegue até a pasta {OUTPUT_DIR} e selecione o arquivo {dataset_name}_para_bi.xlsx ou {dataset_name}_para_bi.csv"
    );
    println!("4. Carregue os dados no Power BI");
    println!("5. Crie as visualizações conforme o modelo sugerido");

    Ok(())
}

/// Reads the menu selection; anything unparsable or out of range falls back
/// to the default choice.
fn read_choice() -> u32 {
    let mut line = String::new();
    let parsed = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .ok()
        .and_then(|_| line.trim().parse::<u32>().ok());

    match parsed {
        Some(n) if (1..=5).contains(&n) => n,
        _ => {
            println!("Opção inválida! Usando PIB Municipal como padrão ({DEFAULT_CHOICE}).");
            DEFAULT_CHOICE
        }
    }
}

async fn run_fetch(choice: u32) -> Result<(&'static str, FetchedDataset), PipelineError> {
    match choice {
        1 => Ok(("demografia", ibge::fetch_demografia().await?)),
        3 => Ok(("servidores", transparencia::fetch_servidores().await?)),
        4 => Ok(("taxa_selic", bcb::fetch_selic().await?)),
        5 => Ok(("covid19", covid::fetch_covid().await?)),
        _ => Ok(("pib_municipios", ibge::fetch_pib_municipios().await?)),
    }
}
