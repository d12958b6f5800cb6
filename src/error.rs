use thiserror::Error;

/// Typed error surface for the harness library. The CLI binary collapses
/// these into `anyhow::Result` at the outermost boundary.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to bind server to {addr}: {source}")]
    PortBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("rpc call failed with status: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("queue worker terminated unexpectedly")]
    WorkerTerminated,
}

pub type Result<T> = std::result::Result<T, HarnessError>;
