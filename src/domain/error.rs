use thiserror::Error;

/// Failures in loading, encoding and batching data, and in
/// validating the configuration that shapes it.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("source and target files differ in length: {source_lines} vs {target_lines} lines")]
    LineCountMismatch { source_lines: usize, target_lines: usize },
    #[error("dataset is empty: {0}")]
    EmptyDataset(String),
    #[error("invalid vocabulary: {0}")]
    InvalidVocabulary(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
