//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LooperError {
    /// Crossfade duration outside `[0, MAX_CROSSFADE_MS)`.
    #[error("crossfade duration {0} ms outside [0, 2000) ms")]
    CrossfadeOutOfRange(f64),

    /// Internal buffer duration outside `(0, MAX_INTERNAL_BUFFER_SECONDS]`.
    #[error("internal buffer duration {0} s outside (0, 3600] s")]
    InternalBufferOutOfRange(f64),

    /// Sample rate is not a positive, finite number.
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    /// No sample storage attached.
    #[error("no sample buffer attached")]
    StorageDetached,

    /// The host freed or invalidated the storage.
    #[error("sample buffer '{0}' is invalid")]
    StorageInvalid(String),

    /// Another thread holds the storage lock.
    #[error("sample buffer '{0}' is locked by another thread")]
    StorageBusy(String),

    /// Storage has no frames to record into.
    #[error("sample buffer '{0}' has no frames")]
    EmptyStorage(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, LooperError>;
