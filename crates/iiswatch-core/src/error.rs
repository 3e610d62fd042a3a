//! Shared error type for the native-API / external-command data sources
//! (spec §7).

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to spawn external command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("external command exited with status {0}")]
    NonZeroExit(std::process::ExitStatus),
    #[error("failed to parse external command output: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("native query failed: {0}")]
    Native(String),
}
