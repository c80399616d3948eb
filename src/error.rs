//! Error types for the tensor core.

use crate::einops::ast::Position;

/// Errors that can occur while parsing, validating, resolving, planning
/// or executing operations against the tensor core.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    /// Invalid einops pattern syntax.
    #[error("pattern parse error at {span}: {message}")]
    PatternParse { message: String, span: Position },

    /// Pattern is syntactically valid but semantically malformed.
    #[error("pattern validation error: {message}")]
    PatternValidation { message: String },

    /// A shape could not be reconciled with a pattern, another tensor,
    /// or an operation's own requirements.
    #[error("shape error: {message}")]
    Shape { message: String },

    /// `repeat` axis sizing is missing or invalid.
    #[error("axis error: {message}")]
    Axis { message: String },

    /// An operation is unsupported for the given dtype, or a typed view
    /// was requested with an incompatible dtype.
    #[error("dtype error: {message}")]
    Dtype { message: String },

    /// A handle belongs to the wrong device, or an output handle's
    /// device/length does not match the declared operation metadata.
    #[error("device error: {message}")]
    Device { message: String },

    /// Buffer I/O failure: length mismatch on write, or allocation failure.
    #[error("io error: {message}")]
    Io { message: String },
}

impl CoreError {
    pub fn pattern_parse(message: impl Into<String>, span: Position) -> Self {
        Self::PatternParse {
            message: message.into(),
            span,
        }
    }

    pub fn pattern_validation(message: impl Into<String>) -> Self {
        Self::PatternValidation {
            message: message.into(),
        }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape {
            message: message.into(),
        }
    }

    pub fn axis(message: impl Into<String>) -> Self {
        Self::Axis {
            message: message.into(),
        }
    }

    pub fn dtype(message: impl Into<String>) -> Self {
        Self::Dtype {
            message: message.into(),
        }
    }

    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

/// Result type used throughout the tensor core.
pub type CoreResult<T> = Result<T, CoreError>;
