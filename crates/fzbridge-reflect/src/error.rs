//! Failure taxonomy for name-based binding.
//!
//! Reflective entry points fold every [`BindError`] into an error cell via
//! [`BindError::to_sheet_value`]; pre-bound registrations surface it as-is.

use fzbridge_common::{Handle, SheetValue, ValueKind, XlError, XlErrorKind};
use thiserror::Error;

use crate::types::{NativeType, TypeMapping};

/// A converter could not produce the requested value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("no converter for {0}")]
    NoConverter(TypeMapping),
    #[error("cannot convert {found} to {target}")]
    Unsupported { found: String, target: NativeType },
    #[error("value of kind {0} cannot be produced from this native value")]
    NotExternalizable(ValueKind),
    #[error("object handle {0} is no longer live")]
    StaleHandle(Handle),
    #[error("{0}")]
    Invalid(String),
}

impl ConversionError {
    pub(crate) fn unsupported(found: impl ToString, target: &NativeType) -> Self {
        ConversionError::Unsupported {
            found: found.to_string(),
            target: target.clone(),
        }
    }
}

/// Raised by (or on behalf of) the target code itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TargetError {
    #[error("{0}")]
    Raised(String),
    #[error("argument {index}: expected {expected}, found {found}")]
    Argument {
        index: usize,
        expected: &'static str,
        found: String,
    },
    #[error("receiver is not a {expected}")]
    Receiver { expected: &'static str },
    #[error("instance member called without a receiver")]
    MissingReceiver,
    #[error("target panicked: {0}")]
    Panicked(String),
}

impl TargetError {
    pub fn raised(message: impl Into<String>) -> Self {
        TargetError::Raised(message.into())
    }
}

#[derive(Debug, Error)]
pub enum BindError {
    /// No candidate accepted the arguments. When candidates existed but all
    /// of them failed at call time, the last failure is kept as the source.
    #[error("no overload of {class}.{member} accepts {arity} argument(s)")]
    NoMatchingOverload {
        class: String,
        member: String,
        arity: usize,
        #[source]
        last_failure: Option<Box<BindError>>,
    },
    #[error("conversion failed")]
    Conversion(#[from] ConversionError),
    #[error("{member} failed")]
    TargetInvocation {
        member: String,
        #[source]
        source: TargetError,
    },
    #[error("{member} is not accessible")]
    Access { member: String },
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },
}

impl BindError {
    pub(crate) fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        BindError::NotFound {
            what,
            name: name.into(),
        }
    }

    /// Error code used when this failure is reported inside a cell.
    pub fn error_kind(&self) -> XlErrorKind {
        match self {
            BindError::NotFound { .. } => XlErrorKind::Name,
            BindError::Access { .. } => XlErrorKind::Ref,
            BindError::NoMatchingOverload { .. }
            | BindError::Conversion(_)
            | BindError::TargetInvocation { .. } => XlErrorKind::Value,
        }
    }

    /// The error cell for this failure; the message carries the whole cause
    /// chain.
    pub fn to_sheet_value(&self) -> SheetValue {
        let mut message = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = std::error::Error::source(err);
        }
        SheetValue::Error(XlError::new(self.error_kind()).with_message(message))
    }
}
