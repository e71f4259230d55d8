//! Batch record decoding for queue-triggered handlers.
//!
//! A queue trigger delivers an envelope whose records each carry an encoded
//! message body:
//!
//! ```json
//! {"Records": [{"messageId": "19dd0b57", "body": "{\"name\":\"myuser\"}"}]}
//! ```
//!
//! A handler declaring `Vec<T>` as its input receives the decoded bodies
//! instead of the envelope. Automatic unmarshaling has to be disabled for such
//! a handler, since `Vec<T>` cannot be decoded from the envelope directly.

use std::any::type_name;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::chain::{Middleware, Next};
use crate::context::Context;
use ferrule_core::{Error, Result, Unmarshaler, Value};

#[derive(Debug, Deserialize)]
struct BatchEnvelope {
    #[serde(rename = "Records")]
    records: Vec<BatchRecord>,
}

#[derive(Debug, Deserialize)]
struct BatchRecord {
    #[serde(rename = "messageId", default)]
    message_id: String,
    #[serde(default)]
    body: String,
}

fn decode_records<T>(unmarshaler: &Unmarshaler, payload: &[u8]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let envelope = unmarshaler
        .unmarshal(payload)
        .and_then(|doc| serde_json::from_value::<BatchEnvelope>(doc).map_err(Into::into))
        .map_err(|e| Error::decode(type_name::<BatchEnvelope>(), e))?;

    envelope
        .records
        .into_iter()
        .map(|record| {
            unmarshaler
                .unmarshal(record.body.as_bytes())
                .and_then(|doc| serde_json::from_value::<T>(doc).map_err(Into::into))
                .map_err(|source| Error::RecordDecodeFailure {
                    record: record.message_id,
                    target: type_name::<T>(),
                    source,
                })
        })
        .collect()
}

/// Decodes every record body of a batch envelope into `T` and hands the
/// handler a `Vec<T>`.
///
/// Fails with [`Error::TypeMismatch`] if the handler's input is not `Vec<T>`.
pub fn sqs_records<T>(unmarshaler: Unmarshaler) -> Middleware
where
    T: DeserializeOwned + Send + 'static,
{
    Middleware::from_fn(move |ctx: Context, value: Value, next: Next| {
        let unmarshaler = unmarshaler.clone();
        async move {
            let Some(input) = ctx.input_type().copied() else {
                return next.run(ctx, value).await;
            };
            if !input.is::<Vec<T>>() {
                return Err(Error::TypeMismatch {
                    expected: input.name(),
                    actual: type_name::<Vec<T>>(),
                });
            }
            let Some(payload) = value.as_bytes() else {
                return Err(Error::UnexpectedInputKind {
                    actual: value.type_name(),
                });
            };
            let records = decode_records::<T>(&unmarshaler, payload)?;
            debug!(records = records.len(), "Batch records decoded");
            next.run(ctx, Value::opaque(records)).await
        }
    })
    .named("sqs_records")
}

/// [`sqs_records`] with JSON record bodies.
pub fn json_sqs_records<T>() -> Middleware
where
    T: DeserializeOwned + Send + 'static,
{
    sqs_records::<T>(Unmarshaler::json())
}
