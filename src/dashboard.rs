use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PipelineError;

/// Two-page dashboard layout referencing characterization artifacts by name.
/// Purely descriptive; consumed by an external BI tool, never rendered here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardModel {
    #[serde(rename = "dashboardTitle")]
    pub dashboard_title: String,
    pub pages: Vec<DashboardPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardPage {
    pub name: String,
    pub visualizations: Vec<Visualization>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visualization {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: Position,
    pub data: DataReference,
}

/// Layout rectangle in the abstract 24-unit dashboard grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataReference {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure: Option<String>,
    #[serde(rename = "xAxis", skip_serializing_if = "Option::is_none")]
    pub x_axis: Option<String>,
    #[serde(rename = "yAxis", skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<String>,
}

impl DataReference {
    fn plain(source: String) -> Self {
        Self {
            source,
            measure: None,
            x_axis: None,
            y_axis: None,
        }
    }
}

/// Builds the dashboard model for `name` and writes it as
/// `modelo_dashboard_{name}.json` inside `output_dir`. The referenced
/// artifact files are not checked for existence; their names are a pure
/// function of the dataset name.
pub fn build_dashboard_model(name: &str, output_dir: &Path) -> Result<DashboardModel, PipelineError> {
    let model = DashboardModel {
        dashboard_title: format!("Caracterização do Dataset - {name}"),
        pages: vec![
            DashboardPage {
                name: "Visão Geral".to_string(),
                visualizations: vec![
                    Visualization {
                        title: "Número Total de Registros".to_string(),
                        kind: "card".to_string(),
                        position: Position { x: 0, y: 0, width: 8, height: 4 },
                        data: DataReference {
                            source: format!("{name}_para_bi.csv"),
                            measure: Some("COUNT()".to_string()),
                            x_axis: None,
                            y_axis: None,
                        },
                    },
                    Visualization {
                        title: "Completude dos Dados".to_string(),
                        kind: "heatmap".to_string(),
                        position: Position { x: 8, y: 0, width: 16, height: 12 },
                        data: DataReference::plain(format!("{name}_valores_ausentes.png")),
                    },
                    Visualization {
                        title: "Distribuição Temporal".to_string(),
                        kind: "column_chart".to_string(),
                        position: Position { x: 0, y: 12, width: 24, height: 12 },
                        data: DataReference {
                            source: format!("{name}_contagem_por_ano.csv"),
                            measure: None,
                            x_axis: Some("ano".to_string()),
                            y_axis: Some("contagem".to_string()),
                        },
                    },
                ],
            },
            DashboardPage {
                name: "Análise Detalhada".to_string(),
                visualizations: vec![
                    Visualization {
                        title: "Estatísticas Principais".to_string(),
                        kind: "table".to_string(),
                        position: Position { x: 0, y: 0, width: 24, height: 8 },
                        data: DataReference::plain(format!("{name}_estatisticas.csv")),
                    },
                    Visualization {
                        title: "Distribuições".to_string(),
                        kind: "image".to_string(),
                        position: Position { x: 0, y: 8, width: 12, height: 12 },
                        data: DataReference::plain(format!("{name}_histograma_valor.png")),
                    },
                    Visualization {
                        title: "Correlações".to_string(),
                        kind: "image".to_string(),
                        position: Position { x: 12, y: 8, width: 12, height: 12 },
                        data: DataReference::plain(format!("{name}_correlacao.png")),
                    },
                ],
            },
        ],
    };

    let path = output_dir.join(format!("modelo_dashboard_{name}.json"));
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, &model)?;

    info!("Dashboard model for '{}' written to {}", name, path.display());
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_references_expected_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let model = build_dashboard_model("pib_municipios", dir.path()).unwrap();

        assert_eq!(model.pages.len(), 2);
        let sources: Vec<&str> = model
            .pages
            .iter()
            .flat_map(|p| p.visualizations.iter())
            .map(|v| v.data.source.as_str())
            .collect();
        assert!(sources.contains(&"pib_municipios_para_bi.csv"));
        assert!(sources.contains(&"pib_municipios_valores_ausentes.png"));
        assert!(sources.contains(&"pib_municipios_contagem_por_ano.csv"));
        assert!(sources.contains(&"pib_municipios_correlacao.png"));
    }

    #[test]
    fn model_serializes_with_original_key_spelling() {
        let dir = tempfile::tempdir().unwrap();
        build_dashboard_model("teste", dir.path()).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("modelo_dashboard_teste.json")).unwrap();
        assert!(raw.contains("\"dashboardTitle\""));
        assert!(raw.contains("\"type\""));
        assert!(raw.contains("\"xAxis\""));

        let loaded: DashboardModel = serde_json::from_str(&raw).unwrap();
        assert_eq!(loaded.pages[0].visualizations[0].kind, "card");
    }
}
