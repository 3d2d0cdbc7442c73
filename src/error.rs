use thiserror::Error;

/// Failures while turning a chart file into a [`Chart`](crate::game::chart::Chart).
///
/// Both variants are fatal to session start: no partial session is ever built
/// from a chart that failed to load.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Chart format error: {0}")]
    Format(String),

    #[error("Audio file not found in level metadata: {title}")]
    MissingAudio { title: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Usage(String),

    #[error("Input capture error: {0}")]
    Capture(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
