use thiserror::Error;

// Unified error type for hylinal

#[derive(Error, Debug)]
pub enum HlError {
    #[error("shape error: {0}")]
    Shape(String),
    #[error("domain error: {0}")]
    Domain(String),
    #[error("matrix is not positive definite (pivot of column {column} is not positive)")]
    NotPositiveDefinite { column: usize },
    #[error("shared memory segment `{name}`: {source}")]
    SharedMemory {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process topology error: {0}")]
    Topology(String),
}

pub type Result<T> = std::result::Result<T, HlError>;
