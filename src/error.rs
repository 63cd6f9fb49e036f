/// Errors surfaced before a benchmark run starts. Queue operations themselves never fail.
#[derive(Eq, PartialEq, Debug, thiserror::Error)]
pub enum YMQueueError {
    #[error("unknown queue kind `{0}` (expected `two-lock` or `lock-free`)")]
    UnknownQueueKind(String),
    #[error("invalid benchmark configuration: {0}")]
    InvalidArgs(&'static str),
}
