//! Automatic payload decoding.

use tracing::{debug, trace};

use crate::chain::{Middleware, Next};
use crate::context::Context;
use ferrule_core::{Error, Unmarshaler, Value};

/// Decodes raw payload bytes into the handler's declared input type.
///
/// - No declared input: the value passes through untouched.
/// - Declared input and a non-bytes value: [`Error::UnexpectedInputKind`].
/// - Undecodable bytes: [`Error::DecodeFailure`] naming the input type.
pub fn unmarshal(unmarshaler: Unmarshaler) -> Middleware {
    Middleware::from_fn(move |ctx: Context, value: Value, next: Next| {
        let unmarshaler = unmarshaler.clone();
        async move {
            let Some(input) = ctx.input_type().copied() else {
                trace!("Handler takes no input, skipping decode");
                return next.run(ctx, value).await;
            };
            let Some(payload) = value.as_bytes() else {
                return Err(Error::UnexpectedInputKind {
                    actual: value.type_name(),
                });
            };
            let decoded = input.decode(&unmarshaler, payload)?;
            debug!(input = input.name(), bytes = payload.len(), "Payload decoded");
            next.run(ctx, decoded).await
        }
    })
    .named("unmarshal")
}

/// [`unmarshal`] with the JSON codec.
pub fn json_unmarshal() -> Middleware {
    unmarshal(Unmarshaler::json())
}
