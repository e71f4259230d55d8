//! Error types for the Ferrule handler adapter.
//!
//! Two layers of errors exist:
//!
//! - [`SignatureError`]: produced once, at registration, when a handler does
//!   not have one of the accepted shapes. It is `Clone` so that a registration
//!   failure can be reported identically on every later invocation.
//! - [`Error`]: everything an invocation can fail with. Handler and
//!   middleware errors are carried through untouched; everything else wraps
//!   its cause with the type names involved.

use thiserror::Error;

/// A boxed, thread-safe error used to carry user and codec failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Registration-time signature validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No handler was supplied.
    #[error("handler is nil")]
    NilHandler,

    /// The supplied value is not a callable handler.
    #[error("handler kind '{kind}' is not a function")]
    InvalidHandlerKind {
        /// Type name of the rejected value.
        kind: &'static str,
    },

    /// The handler's parameter list is not one of the accepted shapes.
    #[error("invalid handler parameters: {reason}")]
    InvalidParameterShape {
        /// Which rule was broken, naming the arity or offending type.
        reason: String,
    },

    /// The handler's return list is not one of the accepted shapes.
    #[error("invalid handler returns: {reason}")]
    InvalidReturnShape {
        /// Which rule was broken, naming the arity or offending type.
        reason: String,
    },
}

impl SignatureError {
    pub fn parameters(reason: impl Into<String>) -> Self {
        Self::InvalidParameterShape {
            reason: reason.into(),
        }
    }

    pub fn returns(reason: impl Into<String>) -> Self {
        Self::InvalidReturnShape {
            reason: reason.into(),
        }
    }
}

/// Errors that can abort an invocation.
#[derive(Debug, Error)]
pub enum Error {
    /// The handler was rejected at registration; every invocation reports it.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// A value reaching the handler does not match its declared input type.
    #[error("type mismatch: handler expects '{expected}', got '{actual}'")]
    TypeMismatch {
        /// Declared type name.
        expected: &'static str,
        /// Type name of the value that arrived.
        actual: &'static str,
    },

    /// A decoding stage expected raw payload bytes but received something else.
    #[error("expected raw payload bytes but got '{actual}'")]
    UnexpectedInputKind {
        /// Type name of the value that arrived.
        actual: &'static str,
    },

    /// Payload bytes could not be decoded into the target type.
    #[error("could not decode payload into '{target}': {source}")]
    DecodeFailure {
        /// Target type name.
        target: &'static str,
        /// Underlying codec error.
        #[source]
        source: BoxError,
    },

    /// One record of a batch payload could not be decoded.
    #[error("could not decode record '{record}' into '{target}': {source}")]
    RecordDecodeFailure {
        /// Identifier of the failing record.
        record: String,
        /// Target type name.
        target: &'static str,
        /// Underlying codec error.
        #[source]
        source: BoxError,
    },

    /// The invocation result could not be serialized.
    #[error("could not encode result of type '{type_name}': {source}")]
    EncodeFailure {
        /// Type name of the result.
        type_name: &'static str,
        /// Underlying codec error.
        #[source]
        source: BoxError,
    },

    /// Error returned by the user handler.
    #[error(transparent)]
    Handler(BoxError),

    /// Error raised by user middleware.
    #[error(transparent)]
    Middleware(BoxError),
}

impl Error {
    /// Wraps an error returned by a handler.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// Wraps an error raised by a middleware.
    pub fn middleware(err: impl Into<BoxError>) -> Self {
        Self::Middleware(err.into())
    }

    pub fn decode(target: &'static str, source: impl Into<BoxError>) -> Self {
        Self::DecodeFailure {
            target,
            source: source.into(),
        }
    }

    pub fn encode(type_name: &'static str, source: impl Into<BoxError>) -> Self {
        Self::EncodeFailure {
            type_name,
            source: source.into(),
        }
    }

    /// Returns the user error carried by a `Handler` or `Middleware` failure,
    /// if it is of type `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Handler(e) | Self::Middleware(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns `true` if this error came from handler registration.
    pub fn is_signature(&self) -> bool {
        matches!(self, Self::Signature(_))
    }
}

/// Result type for invocation operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_handler_error_is_transparent() {
        let err = Error::handler(Boom);
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.downcast_ref::<Boom>(), Some(&Boom));
    }

    #[test]
    fn test_downcast_ignores_framework_errors() {
        let err = Error::TypeMismatch {
            expected: "i32",
            actual: "alloc::string::String",
        };
        assert!(err.downcast_ref::<Boom>().is_none());
        assert_eq!(
            err.to_string(),
            "type mismatch: handler expects 'i32', got 'alloc::string::String'"
        );
    }

    #[test]
    fn test_signature_error_names_cause() {
        let err: Error =
            SignatureError::returns("handler may not return more than two values").into();
        assert!(err.is_signature());
        assert_eq!(
            err.to_string(),
            "invalid handler returns: handler may not return more than two values"
        );
    }

    #[test]
    fn test_decode_failure_keeps_source() {
        let cause = serde_json::from_str::<u8>("nope").unwrap_err();
        let err = Error::decode("u8", cause);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("could not decode payload into 'u8'"));
    }
}
