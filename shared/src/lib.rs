// shared/src/lib.rs

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Milliseconds, as they appear in configuration and on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TtlMs(pub u64);

impl TtlMs {
    pub fn as_duration(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0)
    }
}

impl From<TtlMs> for std::time::Duration {
    fn from(ttl: TtlMs) -> Self {
        ttl.as_duration()
    }
}

pub mod config;
