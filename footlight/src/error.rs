use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("{message}")]
    Input { message: String },

    #[error("toolchain error: {message}")]
    Toolchain { message: String },

    #[error("{tool} timed out after {timeout_ms}ms: {command}")]
    ToolTimedOut {
        tool: String,
        command: String,
        timeout_ms: u64,
    },

    #[error("failed to spawn {tool}: {source}")]
    SpawnFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait on {tool}: {source}")]
    WaitFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no analysis available: {message}")]
    Query { message: String },
}

impl AnalyzeError {
    pub fn input(message: impl Into<String>) -> Self {
        AnalyzeError::Input {
            message: message.into(),
        }
    }

    pub fn toolchain(message: impl Into<String>) -> Self {
        AnalyzeError::Toolchain {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        AnalyzeError::Query {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalyzeError::Io {
            path: path.into(),
            source,
        }
    }

    /// Timeouts are surfaced as a toolchain failure variant: the pipeline
    /// treats a hung tool the same as a broken one.
    pub fn is_toolchain_failure(&self) -> bool {
        matches!(
            self,
            AnalyzeError::Toolchain { .. }
                | AnalyzeError::ToolTimedOut { .. }
                | AnalyzeError::SpawnFailed { .. }
                | AnalyzeError::WaitFailed { .. }
        )
    }
}
