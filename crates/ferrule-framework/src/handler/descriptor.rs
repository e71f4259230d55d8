//! Handler signatures and their validation.
//!
//! Every handler reaches the framework as a [`DynHandler`]: a declared
//! [`Signature`] plus a type-erased call. Typed closures get one from their
//! [`Handler`](super::Handler) impl; hosts that load handlers at runtime can
//! build one by hand. Either way [`introspect`] is the single gate that
//! checks the shape and produces a [`HandlerDescriptor`].
//!
//! Accepted shapes:
//!
//! | parameters          | returns                 |
//! |---------------------|-------------------------|
//! | `()`                | `()`                    |
//! | `(Context)`         | `(error)`               |
//! | `(In)`              | `(Out, error)`          |
//! | `(Context, In)`     |                         |

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::context::Context;
use ferrule_core::{BoxError, InputType, Result, SignatureError, TypeInfo, Value};

/// Type-erased handler call.
///
/// Receives the context and, if the signature declares one, an input value
/// already checked against the declared input type. Returns one [`Value`]
/// per declared return slot; an error slot holds either [`Value::Nil`] or a
/// value made with [`Value::from_error`].
pub type ErasedCall =
    Arc<dyn Fn(Context, Option<Value>) -> BoxFuture<'static, Result<Vec<Value>>> + Send + Sync>;

/// One declared parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    /// The invocation [`Context`].
    Context,
    /// The decoded input.
    Input(InputType),
}

impl Param {
    pub fn input<T>() -> Self
    where
        T: DeserializeOwned + Default + Send + 'static,
    {
        Self::Input(InputType::of::<T>())
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Context => std::any::type_name::<Context>(),
            Self::Input(input) => input.name(),
        }
    }
}

/// One declared return slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Return {
    /// A result value.
    Value(TypeInfo),
    /// An error-capable slot.
    Error(TypeInfo),
}

impl Return {
    pub fn value<T: 'static>() -> Self {
        Self::Value(TypeInfo::of::<T>())
    }

    pub fn error<E: 'static>() -> Self {
        Self::Error(TypeInfo::of::<E>())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Value(info) | Self::Error(info) => info.name(),
        }
    }
}

/// The declared parameter and return lists of a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub returns: Vec<Return>,
}

impl Signature {
    pub fn new(params: Vec<Param>, returns: Vec<Return>) -> Self {
        Self { params, returns }
    }

    fn validate_params(&self) -> Result<(), SignatureError> {
        match self.params.as_slice() {
            [] | [_] => Ok(()),
            [Param::Context, Param::Input(_)] => Ok(()),
            [Param::Context, Param::Context] => Err(SignatureError::parameters(
                "handler takes two arguments, but the second is Context rather than an input",
            )),
            [first, _] => Err(SignatureError::parameters(format!(
                "handler takes two arguments, but the first is not Context. got {}",
                first.type_name()
            ))),
            params => Err(SignatureError::parameters(format!(
                "handlers may not take more than two arguments, but handler takes {}",
                params.len()
            ))),
        }
    }

    fn validate_returns(&self) -> Result<(), SignatureError> {
        match self.returns.as_slice() {
            [] => Ok(()),
            [only] if only.is_error() => Ok(()),
            [only] => Err(SignatureError::returns(format!(
                "handler returns a single value, but {} is not an error",
                only.type_name()
            ))),
            [_, second] if second.is_error() => Ok(()),
            [_, second] => Err(SignatureError::returns(format!(
                "handler returns two values, but the second ({}) is not an error",
                second.type_name()
            ))),
            returns => Err(SignatureError::returns(format!(
                "handler may not return more than two values, but handler returns {}",
                returns.len()
            ))),
        }
    }
}

/// A handler candidate: a declared signature and a type-erased call.
#[derive(Clone)]
pub struct DynHandler {
    signature: Signature,
    call: ErasedCall,
}

impl DynHandler {
    pub fn new<F>(signature: Signature, call: F) -> Self
    where
        F: Fn(Context, Option<Value>) -> BoxFuture<'static, Result<Vec<Value>>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            signature,
            call: Arc::new(call),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Validates the signature and builds the descriptor.
    pub fn describe(self) -> Result<HandlerDescriptor, SignatureError> {
        self.signature.validate_params()?;
        self.signature.validate_returns()?;

        let takes_context = matches!(self.signature.params.first(), Some(Param::Context));
        let input = self.signature.params.iter().find_map(|param| match param {
            Param::Input(input) => Some(*input),
            Param::Context => None,
        });

        debug!(
            takes_context,
            input = input.map(|i| i.name()),
            returns = self.signature.returns.len(),
            "Handler signature accepted"
        );

        Ok(HandlerDescriptor {
            takes_context,
            input,
            returns: self.signature.returns,
            call: self.call,
        })
    }
}

impl fmt::Debug for DynHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynHandler")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A validated handler, immutable once built.
#[derive(Clone)]
pub struct HandlerDescriptor {
    takes_context: bool,
    input: Option<InputType>,
    returns: Vec<Return>,
    pub(crate) call: ErasedCall,
}

impl HandlerDescriptor {
    pub fn takes_context(&self) -> bool {
        self.takes_context
    }

    pub fn input_type(&self) -> Option<&InputType> {
        self.input.as_ref()
    }

    pub fn return_count(&self) -> usize {
        self.returns.len()
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("takes_context", &self.takes_context)
            .field("input", &self.input)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// Validates an arbitrary candidate value as a handler.
///
/// `None` is a nil handler; any value that is not a [`DynHandler`] is not
/// callable.
pub fn introspect<T: Any>(candidate: Option<T>) -> Result<HandlerDescriptor, SignatureError> {
    let Some(candidate) = candidate else {
        return Err(SignatureError::NilHandler);
    };
    let boxed: Box<dyn Any> = Box::new(candidate);
    match boxed.downcast::<DynHandler>() {
        Ok(handler) => handler.describe(),
        Err(_) => Err(SignatureError::InvalidHandlerKind {
            kind: std::any::type_name::<T>(),
        }),
    }
}

/// Error slot helper for hand-written [`DynHandler`] calls.
pub fn error_slot<E: Into<BoxError>>(result: Result<(), E>) -> Value {
    match result {
        Ok(()) => Value::Nil,
        Err(e) => Value::from_error(e),
    }
}
