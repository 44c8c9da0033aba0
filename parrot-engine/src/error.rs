//! Error type for configuration and registration mistakes.
//!
//! Runtime races (an id that already died, a sound that was evicted) are not
//! errors: those calls return `None`/`false` or do nothing. Only programming or
//! configuration mistakes surface here, and they surface at construction time.

use thiserror::Error;

/// Result alias used across the engine crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The non-repeating selector only accepts a drop-off factor in `[0, 1]`.
    #[error("drop-off factor must be in the 0-1 range, got {0}")]
    InvalidDropOff(f32),

    /// A settings field holds a value the engines cannot work with.
    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    /// A sound type references a category that was never registered.
    #[error("unknown sound category id {0}")]
    UnknownCategory(u32),

    /// A sound type must carry at least one voice.
    #[error("sound type `{0}` declares zero voices")]
    NoVoices(String),
}

impl Error {
    pub(crate) fn setting(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidSetting { name, reason: reason.into() }
    }
}
