//! Function registration and the host-facing entry point.
//!
//! A [`Function`] owns one validated handler, its middleware list and its
//! codecs. Every change to the middleware list rebuilds the chain; a host
//! takes an [`InvocationHandler`] snapshot of the current chain and drives
//! that with `(Context, Bytes)` pairs.
//!
//! ```rust,ignore
//! let function = Function::new(greet)
//!     .with(logging)
//!     .with(auth);
//!
//! let handler = function.handler();
//! let response: Bytes = handler.invoke(ctx, payload).await?;
//! ```
//!
//! Chain layout, outermost first:
//!
//! ```text
//! pre-decode middleware → unmarshal (unless disabled) → middleware → handler
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;
use tracing::{Instrument, debug, debug_span, error};

use crate::chain::{Chain, Middleware};
use crate::context::Context;
use crate::handler::{Handler, HandlerDescriptor, introspect};
use crate::middleware::unmarshal;
use ferrule_core::{Bytes, Error, InputType, Marshaler, Result, SignatureError, Unmarshaler, Value};

/// A registered handler together with its middleware and codecs.
pub struct Function {
    descriptor: Result<Arc<HandlerDescriptor>, SignatureError>,
    pre_decode: Vec<Middleware>,
    middleware: Vec<Middleware>,
    auto_unmarshal: bool,
    unmarshaler: Unmarshaler,
    marshaler: Marshaler,
    chain: Chain,
}

impl Function {
    /// Registers a typed handler.
    pub fn new<M, H: Handler<M>>(handler: H) -> Self {
        Self::from_descriptor(handler.into_dyn().describe())
    }

    /// Registers an arbitrary value as a handler.
    ///
    /// The value must be a [`DynHandler`](crate::handler::DynHandler); `None`
    /// and anything else produce a function whose every invocation fails with
    /// the registration error.
    pub fn from_candidate<T: Any>(candidate: Option<T>) -> Self {
        Self::from_descriptor(introspect(candidate))
    }

    fn from_descriptor(descriptor: Result<HandlerDescriptor, SignatureError>) -> Self {
        if let Err(err) = &descriptor {
            error!(error = %err, "Handler rejected, every invocation will fail");
        }
        let descriptor = descriptor.map(Arc::new);
        let unmarshaler = Unmarshaler::default();
        let chain = compose(&descriptor, &[], Some(&unmarshaler), &[]);
        Self {
            descriptor,
            pre_decode: Vec::new(),
            middleware: Vec::new(),
            auto_unmarshal: true,
            unmarshaler,
            marshaler: Marshaler::default(),
            chain,
        }
    }

    /// Appends a middleware, innermost so far.
    pub fn with(mut self, middleware: Middleware) -> Self {
        self.use_middleware([middleware]);
        self
    }

    /// Appends middleware in order and rebuilds the chain.
    pub fn use_middleware(&mut self, middleware: impl IntoIterator<Item = Middleware>) {
        self.middleware.extend(middleware);
        self.rebuild();
    }

    /// Adds a middleware that runs before the payload is decoded.
    ///
    /// Pre-decode middleware see the raw payload bytes even when automatic
    /// unmarshaling is enabled.
    pub fn before_decode(mut self, middleware: Middleware) -> Self {
        self.pre_decode.push(middleware);
        self.rebuild();
        self
    }

    /// Whether a pre-decode middleware named `name` is installed.
    pub fn has_before_decode(&self, name: &str) -> bool {
        self.pre_decode.iter().any(|m| m.name() == name)
    }

    /// Enables or disables automatic payload decoding.
    pub fn auto_unmarshal(mut self, enabled: bool) -> Self {
        self.set_auto_unmarshal(enabled);
        self
    }

    /// Stops decoding payloads automatically; raw bytes reach the first
    /// middleware or the handler.
    pub fn disable_auto_unmarshal(&mut self) {
        self.set_auto_unmarshal(false);
    }

    fn set_auto_unmarshal(&mut self, enabled: bool) {
        self.auto_unmarshal = enabled;
        self.rebuild();
    }

    /// Replaces the codec used by automatic decoding.
    pub fn unmarshaler(mut self, unmarshaler: Unmarshaler) -> Self {
        self.unmarshaler = unmarshaler;
        self.rebuild();
        self
    }

    /// Replaces the codec used to encode results.
    pub fn marshaler(mut self, marshaler: Marshaler) -> Self {
        self.marshaler = marshaler;
        self
    }

    pub fn descriptor(&self) -> Option<&HandlerDescriptor> {
        self.descriptor.as_deref().ok()
    }

    /// The registration error, if the handler was rejected.
    pub fn signature_error(&self) -> Option<&SignatureError> {
        self.descriptor.as_ref().err()
    }

    pub fn is_auto_unmarshal(&self) -> bool {
        self.auto_unmarshal
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    fn rebuild(&mut self) {
        let unmarshaler = self.auto_unmarshal.then_some(&self.unmarshaler);
        self.chain = compose(&self.descriptor, &self.pre_decode, unmarshaler, &self.middleware);
    }

    /// Snapshots the current chain for a host to invoke.
    ///
    /// Later changes to this function do not affect the snapshot.
    pub fn handler(&self) -> InvocationHandler {
        InvocationHandler {
            chain: self.chain.clone(),
            input_type: self.descriptor().and_then(|d| d.input_type().copied()),
            marshaler: self.marshaler.clone(),
        }
    }

    /// Invokes the current chain once.
    pub async fn invoke(&self, ctx: Context, payload: Bytes) -> Result<Bytes> {
        self.handler().invoke(ctx, payload).await
    }
}

fn compose(
    descriptor: &Result<Arc<HandlerDescriptor>, SignatureError>,
    pre_decode: &[Middleware],
    unmarshaler: Option<&Unmarshaler>,
    middleware: &[Middleware],
) -> Chain {
    let descriptor = match descriptor {
        Ok(descriptor) => Arc::clone(descriptor),
        Err(err) => return Chain::failing(err.clone()),
    };
    let layers: Vec<Middleware> = pre_decode
        .iter()
        .cloned()
        .chain(unmarshaler.cloned().map(unmarshal))
        .chain(middleware.iter().cloned())
        .collect();
    debug!(
        layers = layers.len(),
        auto_unmarshal = unmarshaler.is_some(),
        "Building middleware chain"
    );
    Chain::build(descriptor.into_terminal(), &layers)
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("descriptor", &self.descriptor)
            .field("pre_decode", &self.pre_decode)
            .field("middleware", &self.middleware)
            .field("auto_unmarshal", &self.auto_unmarshal)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// InvocationHandler
// ============================================================================

/// The `(Context, Bytes) -> Result<Bytes>` callback handed to a host.
#[derive(Clone, Debug)]
pub struct InvocationHandler {
    chain: Chain,
    input_type: Option<InputType>,
    marshaler: Marshaler,
}

impl InvocationHandler {
    /// Runs the chain once over `payload` and encodes the result.
    pub async fn invoke(&self, ctx: Context, payload: Bytes) -> Result<Bytes> {
        let span = debug_span!(
            "invocation",
            request_id = ctx.request_id(),
            payload_len = payload.len()
        );
        async move {
            let ctx = ctx.enrich(payload.clone(), self.input_type);
            let result = self
                .chain
                .call(ctx, Value::Bytes(payload))
                .await
                .inspect_err(|err| debug!(error = %err, "Invocation failed"))?;
            self.encode(result)
        }
        .instrument(span)
        .await
    }

    fn encode(&self, result: Value) -> Result<Bytes> {
        let doc = result.to_json()?;
        self.marshaler
            .marshal(&doc)
            .map_err(|e| Error::encode(result.type_name(), e))
    }
}

impl Service<(Context, Bytes)> for InvocationHandler {
    type Response = Bytes;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Bytes>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, (ctx, payload): (Context, Bytes)) -> Self::Future {
        let handler = self.clone();
        async move { handler.invoke(ctx, payload).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Next;
    use crate::handler::{DynHandler, Param, Return, Signature};
    use crate::middleware::{json_sqs_records, warmup};
    use ferrule_core::BoxError;
    use futures::future;
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Request {
        message: String,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Response {
        reply: String,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("stop right there")]
    struct Stop;

    fn payload(bytes: &'static [u8]) -> Bytes {
        Bytes::from_static(bytes)
    }

    fn replace_with(value: fn() -> Value) -> Middleware {
        Middleware::from_fn(move |ctx, _value, next: Next| next.run(ctx, value()))
    }

    #[tokio::test]
    async fn test_hello_world() {
        let seen = Arc::new(Mutex::new(String::new()));
        let recorder = seen.clone();
        let function = Function::new(move |_ctx: Context, req: Request| {
            *recorder.lock().unwrap() = req.message.clone();
            async move {
                Ok::<_, BoxError>(Response {
                    reply: format!("{}!", req.message),
                })
            }
        });

        let out = function
            .invoke(Context::new(), payload(br#"{"message":"hello world"}"#))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), "hello world");
        let expected = serde_json::to_vec(&Response {
            reply: "hello world!".into(),
        })
        .unwrap();
        assert_eq!(&out[..], &expected[..]);
        let decoded: Response = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            decoded,
            Response {
                reply: "hello world!".into()
            }
        );
    }

    #[tokio::test]
    async fn test_disabled_decoding_hands_over_raw_bytes() {
        let seen = Arc::new(Mutex::new(None));
        let recorder = seen.clone();
        let mut function = Function::new(move |raw: Bytes| {
            *recorder.lock().unwrap() = Some(raw);
            async { Ok::<(), BoxError>(()) }
        });
        function.disable_auto_unmarshal();

        let out = function
            .invoke(Context::new(), payload(b"\"1\""))
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some(&b"\"1\""[..]));
        assert_eq!(&out[..], b"null");
    }

    #[tokio::test]
    async fn test_short_circuit_returns_exact_error() {
        let reached = Arc::new(AtomicUsize::new(0));
        let counting = |reached: Arc<AtomicUsize>| {
            Middleware::from_fn(move |ctx, value, next: Next| {
                reached.fetch_add(1, Ordering::SeqCst);
                next.run(ctx, value)
            })
        };
        let handler_reached = reached.clone();
        let function = Function::new(move || {
            handler_reached.fetch_add(1, Ordering::SeqCst);
            async {}
        })
        .with(Middleware::from_fn(|_ctx, _value, _next| async {
            Err(Error::middleware(Stop))
        }))
        .with(counting(reached.clone()))
        .with(counting(reached.clone()));

        let err = function
            .invoke(Context::new(), payload(b"{}"))
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<Stop>().is_some());
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_type_mismatch_names_both_types() {
        let function = Function::new(|_ctx: Context, _req: Request| async {})
            .with(replace_with(|| Value::new(42_u64)));

        let err = function
            .invoke(Context::new(), payload(br#"{"message":"x"}"#))
            .await
            .unwrap_err();

        match err {
            Error::TypeMismatch { expected, actual } => {
                assert!(expected.ends_with("Request"));
                assert_eq!(actual, "u64");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_nil_policy() {
        let function = Function::new(|req: Request| async move {
            Ok::<_, BoxError>(req.message.is_empty())
        })
        .with(replace_with(|| Value::Nil));
        let out = function
            .invoke(Context::new(), payload(br#"{"message":"x"}"#))
            .await
            .unwrap();
        assert_eq!(&out[..], b"true");

        let function = Function::new(|req: Option<Request>| async move {
            Ok::<_, BoxError>(req.is_none())
        })
        .with(replace_with(|| Value::Nil));
        let out = function
            .invoke(Context::new(), payload(br#"{"message":"x"}"#))
            .await
            .unwrap();
        assert_eq!(&out[..], b"true");
    }

    #[tokio::test]
    async fn test_zero_returns_encode_to_null() {
        let function = Function::new(|| async {});
        let out = function.invoke(Context::new(), payload(b"{}")).await.unwrap();
        assert_eq!(&out[..], b"null");
    }

    #[tokio::test]
    async fn test_bytes_result_is_encoded() {
        let function =
            Function::new(|| async { Ok::<_, BoxError>(Bytes::from_static(b"hello")) });
        let out = function.invoke(Context::new(), payload(b"{}")).await.unwrap();

        assert_eq!(&out[..], b"[104,101,108,108,111]");
        let decoded: Bytes = serde_json::from_slice(&out).unwrap();
        assert_eq!(decoded, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_custom_unmarshaler_feeds_handler() {
        let seen = Arc::new(Mutex::new(String::new()));
        let recorder = seen.clone();
        let plain_text = Unmarshaler::new(|bytes| {
            Ok(serde_json::Value::String(String::from_utf8(bytes.to_vec())?))
        });
        let function = Function::new(move |name: String| {
            *recorder.lock().unwrap() = name.clone();
            async move { Ok::<_, BoxError>(format!("hi {name}")) }
        })
        .unmarshaler(plain_text);

        let out = function
            .invoke(Context::new(), payload(b"ferrule"))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), "ferrule");
        assert_eq!(&out[..], br#""hi ferrule""#);
    }

    #[tokio::test]
    async fn test_custom_marshaler_encodes_every_result() {
        let enveloped = || {
            Marshaler::new(|doc| {
                serde_json::to_vec(&serde_json::json!({ "data": doc }))
                    .map(Bytes::from)
                    .map_err(Into::into)
            })
        };

        let number = Function::new(|| async { Ok::<_, BoxError>(7_u32) }).marshaler(enveloped());
        let out = number.invoke(Context::new(), payload(b"{}")).await.unwrap();
        assert_eq!(&out[..], br#"{"data":7}"#);

        let raw = Function::new(|| async { Ok::<_, BoxError>(Bytes::from_static(b"raw")) })
            .marshaler(enveloped());
        let out = raw.invoke(Context::new(), payload(b"{}")).await.unwrap();
        assert_eq!(&out[..], br#"{"data":[114,97,119]}"#);
    }

    #[tokio::test]
    async fn test_marshaler_failure_is_encode_failure() {
        let function = Function::new(|| async { Ok::<_, BoxError>(1_u8) })
            .marshaler(Marshaler::new(|_| Err("no encoder".into())));
        let err = function
            .invoke(Context::new(), payload(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EncodeFailure { .. }));
    }

    #[tokio::test]
    async fn test_unencodable_result() {
        struct Unencodable;

        impl Serialize for Unencodable {
            fn serialize<S>(&self, _: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                Err(serde::ser::Error::custom("cannot encode"))
            }
        }

        let function = Function::new(|| async { Ok::<_, BoxError>(Unencodable) });
        let err = function
            .invoke(Context::new(), payload(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EncodeFailure { .. }));
    }

    #[tokio::test]
    async fn test_rejected_handler_fails_every_invocation() {
        let function = Function::from_candidate(Some("hello world!"));
        assert!(function.descriptor().is_none());
        assert!(matches!(
            function.signature_error(),
            Some(SignatureError::InvalidHandlerKind { .. })
        ));

        for _ in 0..2 {
            let err = function
                .invoke(Context::new(), payload(b"{}"))
                .await
                .unwrap_err();
            assert!(err.is_signature());
            assert_eq!(err.to_string(), "handler kind '&str' is not a function");
        }
    }

    #[tokio::test]
    async fn test_rejected_dynamic_handler() {
        let handler = DynHandler::new(
            Signature::new(
                vec![Param::Context],
                vec![Return::value::<u8>(), Return::value::<u8>()],
            ),
            |_ctx, _input| future::ready(Ok(Vec::new())).boxed(),
        );
        let function = Function::from_candidate(Some(handler)).with(warmup());
        let err = function
            .invoke(Context::new(), payload(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Signature(SignatureError::InvalidReturnShape { .. })
        ));
    }

    #[tokio::test]
    async fn test_snapshot_unaffected_by_later_middleware() {
        let mut function = Function::new(|| async { Ok::<_, BoxError>("handled") });
        let snapshot = function.handler();
        function.use_middleware([warmup()]);

        let ping = payload(br#"{"Event":{"source":"serverless-plugin-warmup"}}"#);
        let old = snapshot.invoke(Context::new(), ping.clone()).await.unwrap();
        let new = function.invoke(Context::new(), ping).await.unwrap();

        assert_eq!(&old[..], br#""handled""#);
        assert_eq!(&new[..], br#""warmup""#);
        assert_eq!(function.chain().len(), 2);
    }

    #[tokio::test]
    async fn test_pre_decode_middleware_sees_raw_payload() {
        let function = Function::new(|req: Request| async move {
            Ok::<_, BoxError>(req.message)
        })
        .before_decode(warmup());

        let out = function
            .invoke(
                Context::new(),
                payload(br#"{"Event":{"source":"serverless-plugin-warmup"}}"#),
            )
            .await
            .unwrap();
        assert_eq!(&out[..], br#""warmup""#);

        let out = function
            .invoke(Context::new(), payload(br#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(&out[..], br#""hi""#);
    }

    #[tokio::test]
    async fn test_batch_handler() {
        #[derive(Debug, Default, Deserialize)]
        struct User {
            name: String,
        }

        let function = Function::new(|users: Vec<User>| async move {
            Ok::<_, BoxError>(users.into_iter().map(|u| u.name).collect::<Vec<_>>())
        })
        .auto_unmarshal(false)
        .with(json_sqs_records::<User>());

        let out = function
            .invoke(
                Context::new(),
                payload(
                    br#"{"Records":[
                        {"messageId":"1","body":"{\"name\":\"ada\"}"},
                        {"messageId":"2","body":"{\"name\":\"grace\"}"}
                    ]}"#,
                ),
            )
            .await
            .unwrap();
        assert_eq!(&out[..], br#"["ada","grace"]"#);
    }

    #[tokio::test]
    async fn test_context_reaches_handler() {
        let function = Function::new(|ctx: Context| async move {
            match ctx.request_id() {
                Some("req-7") => Ok(()),
                _ => Err(Stop),
            }
        });
        function
            .invoke(Context::new().with_request_id("req-7"), payload(b"{}"))
            .await
            .unwrap();
    }

    #[test]
    fn test_invocation_handler_is_a_service() {
        let function = Function::new(|n: u32| async move { Ok::<_, BoxError>(n * 2) });
        let out = tokio_test::block_on(
            function
                .handler()
                .oneshot((Context::new(), payload(b"21"))),
        )
        .unwrap();
        assert_eq!(&out[..], b"42");
    }
}
