use thiserror::Error;

#[derive(Error, Debug)]
pub enum CitrigError {
    #[error("API request failed with status {status} at {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read version file {name}: {source}")]
    VersionFile {
        name: String,
        source: std::io::Error,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Downstream {subject} finished with status '{status}'")]
    PipelineFailed {
        subject: &'static str,
        status: String,
    },

    #[error("Downstream {subject} still not finished after {minutes} minutes, giving up")]
    WaitTimeout {
        subject: &'static str,
        minutes: u64,
    },
}

pub type Result<T> = std::result::Result<T, CitrigError>;
