//! Continuations, middleware and chain composition.
//!
//! A middleware receives "the rest of the chain" as a [`Next`] and returns a
//! replacement [`Next`]. [`Chain::build`] folds an ordered middleware list
//! around a terminal continuation so that the first middleware registered is
//! the outermost:
//!
//! ```text
//! middleware[0](middleware[1](... middleware[n-1](terminal)))
//! ```
//!
//! Both halves speak tower: [`Next`] is a
//! `Service<(Context, Value), Response = Value, Error = Error>` and
//! [`Middleware`] is a `Layer<Next>`, so existing tower layers can be adapted
//! with [`Middleware::from_layer`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tower::{Layer, Service, ServiceExt};

use crate::context::Context;
use ferrule_core::{Error, Result, SignatureError, Value};

type NextFn = dyn Fn(Context, Value) -> BoxFuture<'static, Result<Value>> + Send + Sync;
type WrapFn = dyn Fn(Next) -> Next + Send + Sync;

// ============================================================================
// Next - the rest of the chain
// ============================================================================

/// A continuation: everything downstream of the current middleware.
#[derive(Clone)]
pub struct Next(Arc<NextFn>);

impl Next {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Context, Value) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Runs the rest of the chain.
    pub fn run(&self, ctx: Context, value: Value) -> BoxFuture<'static, Result<Value>> {
        (self.0)(ctx, value)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Next").finish_non_exhaustive()
    }
}

impl Service<(Context, Value)> for Next {
    type Response = Value;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Value>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, (ctx, value): (Context, Value)) -> Self::Future {
        self.run(ctx, value)
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// A chain decorator: takes the rest of the chain, returns its replacement.
///
/// Middleware hold only closures. Per-invocation state belongs in the
/// [`Context`].
#[derive(Clone)]
pub struct Middleware {
    name: &'static str,
    wrap: Arc<WrapFn>,
}

impl Middleware {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Next) -> Next + Send + Sync + 'static,
    {
        Self {
            name: "middleware",
            wrap: Arc::new(f),
        }
    }

    /// Builds a middleware from a function that receives the context, the
    /// current value and the continuation.
    ///
    /// ```rust,ignore
    /// let logging = Middleware::from_fn(|ctx, value, next: Next| async move {
    ///     tracing::info!("before");
    ///     let out = next.run(ctx, value).await;
    ///     tracing::info!("after");
    ///     out
    /// });
    /// ```
    ///
    /// Returning without calling `next` short-circuits the chain.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, Value, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |next| {
            let f = Arc::clone(&f);
            Next::new(move |ctx, value| (*f)(ctx, value, next.clone()).boxed())
        })
    }

    /// Adapts a tower [`Layer`] whose service speaks the chain's request,
    /// response and error types.
    pub fn from_layer<L>(layer: L) -> Self
    where
        L: Layer<Next> + Send + Sync + 'static,
        L::Service: Service<(Context, Value), Response = Value, Error = Error>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<(Context, Value)>>::Future: Send + 'static,
    {
        Self::new(move |next| {
            let service = layer.layer(next);
            Next::new(move |ctx, value| service.clone().oneshot((ctx, value)).boxed())
        })
    }

    /// Labels the middleware in logs and `Debug` output.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Layer<Next> for Middleware {
    type Service = Next;

    fn layer(&self, inner: Next) -> Next {
        (self.wrap)(inner)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

// ============================================================================
// Chain
// ============================================================================

/// A composed, immutable middleware chain ending at one terminal.
#[derive(Clone, Debug)]
pub struct Chain {
    entry: Next,
    depth: usize,
}

impl Chain {
    /// Wraps `terminal` in `middleware`, first element outermost.
    pub fn build(terminal: Next, middleware: &[Middleware]) -> Self {
        let entry = middleware
            .iter()
            .rev()
            .fold(terminal, |next, layer| layer.layer(next));
        Self {
            entry,
            depth: middleware.len(),
        }
    }

    /// A chain that reports the same registration error on every call.
    pub fn failing(err: SignatureError) -> Self {
        Self {
            entry: Next::new(move |_ctx, _value| {
                future::ready(Err(Error::Signature(err.clone()))).boxed()
            }),
            depth: 0,
        }
    }

    pub fn call(&self, ctx: Context, value: Value) -> BoxFuture<'static, Result<Value>> {
        self.entry.run(ctx, value)
    }

    /// Number of middleware wrapped around the terminal.
    pub fn len(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }
}
