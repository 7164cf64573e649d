use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("dispatchers must be greater than 0")]
    DispatchersZero,
    #[error("tick period must be > 0 (got {0}ms)")]
    InvalidTickPeriod(u64),
    #[error("run duration must be > 0 (got {0}ms)")]
    InvalidRunDuration(u64),
    #[error("{name} must be between 0 and 1 (got {value})")]
    InvalidFailureRate { name: &'static str, value: f64 },
    #[error("mirror poll interval must be > 0 (got {0}ms)")]
    InvalidPollInterval(u64),
    #[error("custom call {0} has an empty transcript")]
    EmptyCustomCall(usize),
    #[error("{0}")]
    ConfigIo(String),
    #[error("{0}")]
    ConfigParse(String),
    #[error("unsupported config format '{0}'")]
    UnsupportedConfigFormat(String),
    #[error("{0}")]
    Cli(String),
    #[error("remote queue error: {0}")]
    Remote(#[from] RemoteError),
}

pub type Result<T> = std::result::Result<T, Error>;
