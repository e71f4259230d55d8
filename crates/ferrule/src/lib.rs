//! # Ferrule
//!
//! Strongly-typed async handlers behind a `(context, bytes) -> bytes` host
//! callback, wrapped by composable middleware.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────┐  (Context, Bytes)  ┌────────────────────────────────────────────────┐
//! │ Host │───────────────────▶│ pre-decode → unmarshal → middleware → handler  │
//! └──────┘◀───────────────────└────────────────────────────────────────────────┘
//!              Bytes / Error
//! ```
//!
//! - **Core**: the value model, codecs and error types
//! - **Framework**: handler registration, the middleware chain and the
//!   invocation entry point
//! - **Runtime**: configuration, logging and bootstrapping
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrule::prelude::*;
//!
//! #[derive(Deserialize)]
//! struct Request { name: String }
//!
//! #[derive(Serialize)]
//! struct Response { message: String }
//!
//! async fn greet(ctx: Context, req: Request) -> Result<Response, BoxError> {
//!     Ok(Response { message: format!("hello, {}", req.name) })
//! }
//!
//! let runtime = FerruleRuntime::new()?;
//! let handler = runtime.prepare(Function::new(greet).with(middleware::warmup()));
//! let response = handler.invoke(Context::new(), payload).await?;
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use ferrule_core as core;
pub use ferrule_framework as framework;
pub use ferrule_runtime as runtime;

/// Commonly used types for writing and hosting handlers.
///
/// ```rust,ignore
/// use ferrule::prelude::*;
/// ```
pub mod prelude {
    // Entry points
    pub use ferrule_framework::{Function, InvocationHandler};
    pub use ferrule_runtime::FerruleRuntime;

    // Handler side
    pub use ferrule_core::{BoxError, Bytes, Error, Result, Value};
    pub use ferrule_framework::{Context, DynHandler, Handler};

    // Middleware
    pub use ferrule_framework::middleware;
    pub use ferrule_framework::{Middleware, Next};
}
