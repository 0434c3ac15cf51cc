//! Errors on submitting tasks. All of them are fatal: a rejected task is never retried.
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("invalid thread pool!")]
    InvalidPool,
    #[error("thread pool lock failure!")]
    LockFailure,
    #[error("queue full!")]
    QueueFull,
    #[error("thread pool is shutting down!")]
    ShuttingDown,
    #[error("thread failure!")]
    WorkerFailure,
    #[error("invalid thread task option: {0}")]
    UnknownTaskKind(u8),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
