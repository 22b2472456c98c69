//! Error types for rowbench
//!
//! One taxonomy for the whole harness: validation problems, wrapped driver
//! failures (annotated with engine + phase, never reinterpreted), the
//! swallowable "object already absent" cleanup class, and fatal
//! orchestration failures. The boundary embedding this crate maps these
//! kinds to transport responses, so kind, message and original cause are
//! all exposed.

use thiserror::Error;

use crate::engine::{Engine, Phase};

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Rowbench error types
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied input is unusable: unknown catalog key, a fan-out
    /// fraction that does not reduce to 1/k, a request shape an adapter
    /// cannot execute, a diagnostic mode on the wrong engine.
    #[error("validation error: {0}")]
    Validation(String),

    /// Underlying engine-client failure, wrapped with engine and phase
    /// context. The driver's own message is preserved verbatim.
    #[error("{engine} driver error during {phase}: {source}")]
    Driver {
        /// Engine whose driver failed
        engine: Engine,
        /// Orchestration phase the failure occurred in
        phase: Phase,
        /// The untouched driver error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A cleanup drop hit an object that is already absent. The seeder
    /// swallows this class; it never escapes a run.
    #[error("cleanup skipped, object already absent: {0}")]
    CleanupSkippable(String),

    /// Any other cleanup failure, or a failure persisting the recorded
    /// result artifact.
    #[error("fatal orchestration error: {0}")]
    Fatal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classification for boundary mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unusable caller input
    Validation,
    /// Wrapped engine-client failure
    Driver,
    /// Swallowable "already absent" cleanup failure
    CleanupSkippable,
    /// Fatal orchestration or persistence failure
    Fatal,
    /// IO failure
    Io,
}

impl Error {
    /// Wrap a driver failure with engine and phase context.
    pub fn driver(
        engine: Engine,
        phase: Phase,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Driver {
            engine,
            phase,
            source: source.into(),
        }
    }

    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Driver { .. } => ErrorKind::Driver,
            Self::CleanupSkippable(_) => ErrorKind::CleanupSkippable,
            Self::Fatal(_) => ErrorKind::Fatal,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// The original cause, when this error wraps one.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(self)
    }
}
