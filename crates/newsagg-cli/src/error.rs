use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] newsagg_core::InvalidQueryError),

    #[error(transparent)]
    Config(#[from] newsagg_core::ConfigError),

    #[error("strict mode failed: failed_providers={failed_providers}, invalid_queries={invalid_queries}")]
    StrictModeViolation {
        failed_providers: usize,
        invalid_queries: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidQuery(_) => 2,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) => 4,
            Self::Config(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
