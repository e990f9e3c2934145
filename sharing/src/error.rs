use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardingError {
    #[error("invalid sharing parameters: {0}")]
    InvalidParameters(String),

    #[error("insufficient shards: have {have}, need {need}")]
    InsufficientShards { have: usize, need: usize },

    #[error("shards disagree on threshold, share count or payload length")]
    ThresholdMismatch,
}
