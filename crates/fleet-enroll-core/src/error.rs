use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Directory service unavailable or a file we must write is off limits.
    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unresolved device: {0}")]
    Unresolved(String),

    #[error("Unreachable device: {0}")]
    Unreachable(String),

    #[error("Management channel unhealthy: {0}")]
    ChannelUnhealthy(String),

    #[error("Directory rejected request: {0}")]
    Directory(String),

    #[error("Run interrupted ({summary}): {source}")]
    Interrupted {
        summary: String,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Inventory format error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Fatal errors stop the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Environment(_) | Error::Interrupted { .. })
    }

    /// Errors an interactive caller should answer by asking again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::InvalidInput(_))
    }

    pub(crate) fn interrupted(summary: impl Into<String>, source: Error) -> Self {
        Error::Interrupted {
            summary: summary.into(),
            source: Box::new(source),
        }
    }
}
