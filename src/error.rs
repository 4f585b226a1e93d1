use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected payload shape: {message}")]
    PayloadShape { message: String },

    #[error("Upstream returned status {status}")]
    UpstreamStatus { status: u16 },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Chart rendering failed: {message}")]
    Chart { message: String },

    #[error("Table error: {message}")]
    Table { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io {
            message: err.to_string(),
        }
    }
}

impl PipelineError {
    pub fn payload(message: impl Into<String>) -> Self {
        PipelineError::PayloadShape {
            message: message.into(),
        }
    }

    pub fn chart(err: impl std::fmt::Display) -> Self {
        PipelineError::Chart {
            message: err.to_string(),
        }
    }
}
