//! Typed handler registration.
//!
//! Plain async functions and closures become handlers through blanket
//! [`Handler`] impls, one per accepted parameter shape:
//!
//! ```rust,ignore
//! use ferrule_framework::Context;
//!
//! // No parameters, no results.
//! async fn ping() {}
//!
//! // Context only, error result.
//! async fn touch(ctx: Context) -> Result<(), BoxError> { Ok(()) }
//!
//! // Context and decoded input, value and error results.
//! async fn greet(ctx: Context, req: Request) -> Result<Response, BoxError> {
//!     Ok(Response { message: format!("hi, {}", req.name) })
//! }
//! ```
//!
//! Each impl produces a [`DynHandler`] whose [`Signature`] goes through the
//! same validation as a handler assembled by hand.

use std::any::TypeId;
use std::future::Future;
use std::marker::PhantomData;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::descriptor::{DynHandler, Param, Return, Signature};
use crate::context::Context;
use ferrule_core::{BoxError, Error, Result, Value};

// ============================================================================
// HandlerOutput - Handler return shapes
// ============================================================================

/// Types a handler future may resolve to.
///
/// | output            | declared returns     |
/// |-------------------|----------------------|
/// | `()`              | none                 |
/// | `Result<(), E>`   | `(error)`            |
/// | `Result<T, E>`    | `(T, error)`         |
pub trait HandlerOutput: Send + 'static {
    /// The return slots this output occupies.
    fn returns() -> Vec<Return>;

    /// Spreads the output over its return slots.
    fn into_values(self) -> Vec<Value>;
}

impl HandlerOutput for () {
    fn returns() -> Vec<Return> {
        Vec::new()
    }

    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

impl<T, E> HandlerOutput for Result<T, E>
where
    T: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn returns() -> Vec<Return> {
        if is_unit::<T>() {
            vec![Return::error::<E>()]
        } else {
            vec![Return::value::<T>(), Return::error::<E>()]
        }
    }

    fn into_values(self) -> Vec<Value> {
        let unit = is_unit::<T>();
        match self {
            Ok(_) if unit => vec![Value::Nil],
            Err(e) if unit => vec![Value::from_error(e)],
            Ok(v) => vec![Value::new(v), Value::Nil],
            Err(e) => vec![Value::Nil, Value::from_error(e)],
        }
    }
}

fn is_unit<T: 'static>() -> bool {
    TypeId::of::<T>() == TypeId::of::<()>()
}

// ============================================================================
// Handler Trait
// ============================================================================

/// Marker for a decoded input parameter in a [`Handler`] shape.
pub struct Input<T>(PhantomData<fn() -> T>);

/// Anything that can be registered as a handler.
///
/// `M` only distinguishes the blanket impls; callers never name it.
pub trait Handler<M>: Send + Sync + Sized + 'static {
    /// Erases the handler into its signature and a uniform call.
    fn into_dyn(self) -> DynHandler;
}

impl Handler<DynHandler> for DynHandler {
    fn into_dyn(self) -> DynHandler {
        self
    }
}

fn finish<Fut>(fut: Fut) -> BoxFuture<'static, Result<Vec<Value>>>
where
    Fut: Future + Send + 'static,
    Fut::Output: HandlerOutput,
{
    async move { Ok(fut.await.into_values()) }.boxed()
}

fn take_input<In: 'static>(input: Option<Value>) -> Result<In> {
    input.unwrap_or_default().take::<In>().map_err(|value| Error::TypeMismatch {
        expected: std::any::type_name::<In>(),
        actual: value.type_name(),
    })
}

impl<F, Fut> Handler<()> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: HandlerOutput,
{
    fn into_dyn(self) -> DynHandler {
        let signature =
            Signature::new(Vec::new(), <Fut::Output as HandlerOutput>::returns());
        DynHandler::new(signature, move |_ctx, _input| finish(self()))
    }
}

impl<F, Fut> Handler<(Context,)> for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: HandlerOutput,
{
    fn into_dyn(self) -> DynHandler {
        let signature =
            Signature::new(vec![Param::Context], <Fut::Output as HandlerOutput>::returns());
        DynHandler::new(signature, move |ctx, _input| finish(self(ctx)))
    }
}

impl<F, Fut, In> Handler<(Input<In>,)> for F
where
    F: Fn(In) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: HandlerOutput,
    In: DeserializeOwned + Default + Send + 'static,
{
    fn into_dyn(self) -> DynHandler {
        let signature =
            Signature::new(vec![Param::input::<In>()], <Fut::Output as HandlerOutput>::returns());
        DynHandler::new(signature, move |_ctx, input| match take_input::<In>(input) {
            Ok(input) => finish(self(input)),
            Err(e) => future::ready(Err(e)).boxed(),
        })
    }
}

impl<F, Fut, In> Handler<(Context, Input<In>)> for F
where
    F: Fn(Context, In) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: HandlerOutput,
    In: DeserializeOwned + Default + Send + 'static,
{
    fn into_dyn(self) -> DynHandler {
        let signature = Signature::new(
            vec![Param::Context, Param::input::<In>()],
            <Fut::Output as HandlerOutput>::returns(),
        );
        DynHandler::new(signature, move |ctx, input| match take_input::<In>(input) {
            Ok(input) => finish(self(ctx, input)),
            Err(e) => future::ready(Err(e)).boxed(),
        })
    }
}
