//! # Ferrule Framework
//!
//! Adapts strongly-typed async handlers to the uniform host calling
//! convention `(Context, Bytes) -> Result<Bytes>`.
//!
//! This layer provides:
//! - Handler registration and signature validation
//! - The typed-to-untyped adapter at the end of every chain
//! - Middleware composition over tower `Service`/`Layer`
//! - Built-in middleware for payload decoding, batch records and warmup pings
//! - The invocation entry point a host drives
//!
//! ```rust,ignore
//! use ferrule_framework::{Context, Function, middleware};
//!
//! async fn greet(ctx: Context, req: Request) -> Result<Response, BoxError> {
//!     Ok(Response { message: format!("hello, {}", req.name) })
//! }
//!
//! let function = Function::new(greet).with(middleware::warmup());
//! let handler = function.handler();
//! let bytes = handler.invoke(Context::new(), payload).await?;
//! ```

pub mod chain;
pub mod context;
pub mod function;
pub mod handler;
pub mod middleware;

pub use chain::{Chain, Middleware, Next};
pub use context::Context;
pub use function::{Function, InvocationHandler};
pub use handler::{
    DynHandler, Handler, HandlerDescriptor, HandlerOutput, Param, Return, Signature, introspect,
};

pub use tokio_util::sync::CancellationToken;
pub use tower::{Layer, Service};
