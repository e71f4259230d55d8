//! Keep-warm short-circuit.
//!
//! Schedulers that keep functions warm send
//! `{"Event": {"source": "serverless-plugin-warmup"}}`. Such invocations end
//! here with the result `"warmup"`; the handler never runs.

use serde::Deserialize;
use tracing::debug;

use crate::chain::{Middleware, Next};
use crate::context::Context;
use ferrule_core::Value;

/// Name the warmup middleware reports through [`Middleware::name`].
pub const NAME: &str = "warmup";

const WARMUP_SOURCE: &str = "serverless-plugin-warmup";

#[derive(Debug, Default, Deserialize)]
struct WarmupEvent {
    #[serde(rename = "Event", default)]
    event: WarmupSource,
}

#[derive(Debug, Default, Deserialize)]
struct WarmupSource {
    #[serde(alias = "Source", default)]
    source: String,
}

fn is_warmup(ctx: &Context) -> bool {
    ctx.extract::<WarmupEvent>()
        .is_ok_and(|event| event.event.source == WARMUP_SOURCE)
}

/// Returns `"warmup"` for keep-warm payloads and continues otherwise.
///
/// Payloads that do not decode as a warmup event are not an error.
pub fn warmup() -> Middleware {
    Middleware::from_fn(|ctx: Context, value: Value, next: Next| async move {
        if is_warmup(&ctx) {
            debug!("Warmup event detected, skipping handler");
            return Ok(Value::new("warmup"));
        }
        next.run(ctx, value).await
    })
    .named(NAME)
}
