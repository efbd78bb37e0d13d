//! Crate-wide error type.
//!
//! Every `Mapping` method returns [`Result<T>`]. Leaf mappings and user
//! callbacks may fail with any error type of their own; by the time that
//! error crosses into `Lru`/`Buffer` machinery it is erased into an
//! [`anyhow::Error`] so the composed stack (which may nest several
//! differently-typed leaves) has a single, uniform error type to propagate.

use thiserror::Error;

/// The crate-wide error type returned by every `Mapping` operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The key is absent. Standard for `get`/`delete` on a missing key.
    #[error("key not found")]
    NotFound,

    /// `evict()` was called on a mapping with no keys.
    #[error("mapping is empty")]
    Empty,

    /// A leaf mapping's own I/O failed (disk full, quota, network error).
    #[error("backing store error: {0}")]
    Backing(#[source] anyhow::Error),

    /// A user-supplied callback (`on_evict`, `fast_to_slow_callbacks`, ...)
    /// raised. Treated identically to [`Error::Backing`] by every rollback
    /// path in `lru`/`buffer`.
    #[error("callback error: {0}")]
    Callback(#[source] anyhow::Error),
}

impl Error {
    /// Wraps an arbitrary leaf-mapping error as [`Error::Backing`].
    pub fn backing<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Backing(anyhow::Error::new(err))
    }

    /// Wraps an arbitrary callback error as [`Error::Callback`].
    pub fn callback<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Callback(anyhow::Error::new(err))
    }

    /// True for the two error kinds that exception-safe eviction treats the
    /// same way: a `Backing` or `Callback` failure, as opposed to the plain
    /// control-flow signals `NotFound`/`Empty`.
    pub fn is_callback_or_backing(&self) -> bool {
        matches!(self, Error::Backing(_) | Error::Callback(_))
    }
}

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
