//! The uniform `(Context, Value) -> Result<Value>` surface over a handler.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tracing::trace;

use super::descriptor::HandlerDescriptor;
use crate::chain::Next;
use crate::context::Context;
use ferrule_core::{BoxError, Error, Result, Value};

impl HandlerDescriptor {
    /// Calls the handler with the chain's current value.
    ///
    /// If the handler declares an input, `Nil` becomes the input type's zero
    /// value and any other value must be exactly of the declared type.
    pub fn invoke(&self, ctx: Context, value: Value) -> BoxFuture<'static, Result<Value>> {
        let input = match self.prepare_input(value) {
            Ok(input) => input,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        let returns = self.return_count();
        let call = (self.call)(ctx, input);
        async move { unpack(returns, call.await?) }.boxed()
    }

    fn prepare_input(&self, value: Value) -> Result<Option<Value>> {
        let Some(input) = self.input_type() else {
            return Ok(None);
        };
        if value.is_nil() {
            trace!(input = input.name(), "Substituting zero value for nil input");
            return Ok(Some(input.zero()));
        }
        if input.accepts(&value) {
            Ok(Some(value))
        } else {
            Err(Error::TypeMismatch {
                expected: input.name(),
                actual: value.type_name(),
            })
        }
    }

    /// Wraps the descriptor as the innermost continuation of a chain.
    pub fn into_terminal(self: Arc<Self>) -> Next {
        Next::new(move |ctx, value| self.invoke(ctx, value))
    }
}

/// Collapses the handler's return slots into one result.
fn unpack(returns: usize, mut values: Vec<Value>) -> Result<Value> {
    if values.len() != returns {
        return Err(Error::handler(format!(
            "handler declares {returns} return values but produced {}",
            values.len()
        )));
    }
    match returns {
        0 => Ok(Value::Nil),
        1 => {
            check_error_slot(values.pop().unwrap_or_default())?;
            Ok(Value::Nil)
        }
        _ => {
            let err = values.pop().unwrap_or_default();
            let value = values.pop().unwrap_or_default();
            check_error_slot(err)?;
            Ok(value)
        }
    }
}

fn check_error_slot(slot: Value) -> Result<()> {
    if slot.is_nil() {
        return Ok(());
    }
    match slot.take::<BoxError>() {
        Ok(err) => Err(Error::Handler(err)),
        Err(other) => Err(Error::TypeMismatch {
            expected: "error",
            actual: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{DynHandler, Handler, Param, Return, Signature, error_slot};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Request {
        message: String,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("handler failed")]
    struct Failed;

    fn describe<M>(handler: impl Handler<M>) -> Arc<HandlerDescriptor> {
        Arc::new(handler.into_dyn().describe().unwrap())
    }

    #[tokio::test]
    async fn test_zero_returns_yield_nil() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let descriptor = describe(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let out = descriptor.invoke(Context::new(), Value::Nil).await.unwrap();
        assert!(out.is_nil());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nil_input_becomes_default() {
        let descriptor =
            describe(|req: Request| async move { Ok::<_, BoxError>(req.message.is_empty()) });
        let out = descriptor.invoke(Context::new(), Value::Nil).await.unwrap();
        assert!(out.take::<bool>().unwrap());
    }

    #[tokio::test]
    async fn test_nil_into_optional_input_is_none() {
        let descriptor =
            describe(|req: Option<Request>| async move { Ok::<_, BoxError>(req.is_none()) });
        let out = descriptor.invoke(Context::new(), Value::Nil).await.unwrap();
        assert!(out.take::<bool>().unwrap());
    }

    #[tokio::test]
    async fn test_mismatched_input_names_both_types() {
        let descriptor = describe(|_ctx: Context, n: i64| async move { Ok::<_, BoxError>(n) });
        let err = descriptor
            .invoke(Context::new(), Value::new(1.5_f64))
            .await
            .unwrap_err();
        match err {
            Error::TypeMismatch { expected, actual } => {
                assert_eq!(expected, "i64");
                assert_eq!(actual, "f64");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_handler_without_input_ignores_value() {
        let descriptor = describe(|ctx: Context| async move {
            assert!(ctx.request_id().is_none());
            Ok::<(), BoxError>(())
        });
        let out = descriptor
            .invoke(Context::new(), Value::bytes(&b"ignored"[..]))
            .await
            .unwrap();
        assert!(out.is_nil());
    }

    #[tokio::test]
    async fn test_handler_error_passes_through() {
        let descriptor = describe(|_ctx: Context| async { Err::<(), _>(Failed) });
        let err = descriptor.invoke(Context::new(), Value::Nil).await.unwrap_err();
        assert!(err.downcast_ref::<Failed>().is_some());
        assert_eq!(err.to_string(), "handler failed");
    }

    #[tokio::test]
    async fn test_value_discarded_when_error_set() {
        let descriptor = describe(|n: u8| async move {
            if n == 0 {
                Err(Failed)
            } else {
                Ok(n)
            }
        });
        let err = descriptor.invoke(Context::new(), Value::Nil).await.unwrap_err();
        assert!(matches!(err, Error::Handler(_)));

        let out = descriptor
            .invoke(Context::new(), Value::opaque(4_u8))
            .await
            .unwrap();
        assert_eq!(out.take::<u8>().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_dynamic_handler_error_slot() {
        let handler = DynHandler::new(
            Signature::new(vec![Param::Context], vec![Return::error::<BoxError>()]),
            |_ctx, _input| future::ready(Ok(vec![error_slot(Err::<(), _>(Failed))])).boxed(),
        );
        let descriptor = Arc::new(handler.describe().unwrap());
        let err = descriptor.invoke(Context::new(), Value::Nil).await.unwrap_err();
        assert!(err.downcast_ref::<Failed>().is_some());
    }

    #[tokio::test]
    async fn test_non_error_in_error_slot() {
        let handler = DynHandler::new(
            Signature::new(Vec::new(), vec![Return::error::<BoxError>()]),
            |_ctx, _input| future::ready(Ok(vec![Value::new(7_u32)])).boxed(),
        );
        let descriptor = Arc::new(handler.describe().unwrap());
        let err = descriptor.invoke(Context::new(), Value::Nil).await.unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: "error",
                actual: "u32"
            }
        ));
    }
}
