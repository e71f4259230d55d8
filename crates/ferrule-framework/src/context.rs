//! Invocation context for the Ferrule framework.
//!
//! A [`Context`] is an immutable handle. Every "modification" returns a child
//! that shares everything with its parent except the one thing that changed,
//! so a context handed to a middleware can never be altered behind its back.
//!
//! A context carries:
//!
//! - **Scope**: the host's cancellation token, optional deadline and
//!   optional request id. Ferrule never starts timers or cancels anything
//!   itself; handlers that care check [`Context::is_cancelled`] or
//!   [`Context::deadline`].
//! - **Values**: request-scoped data keyed by type, added with
//!   [`Context::with_value`].
//! - **Invocation metadata**: the raw payload and the handler's resolved
//!   input type, attached once by the entry point before the chain runs.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use ferrule_core::{Error, InputType, Result};

#[derive(Debug, Clone, Default)]
struct Scope {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    request_id: Option<Arc<str>>,
}

/// One link of the persistent value list.
struct Entry {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Entry>>,
}

#[derive(Debug, Clone)]
struct Invocation {
    payload: Bytes,
    input_type: Option<InputType>,
}

/// The context handed to middleware and handlers for one invocation.
#[derive(Clone, Default)]
pub struct Context {
    scope: Arc<Scope>,
    values: Option<Arc<Entry>>,
}

impl Context {
    /// Creates an empty context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a child context observing the given cancellation token.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        self.with_scope(|scope| scope.cancellation = token)
    }

    /// Returns a child context with the given deadline.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.with_scope(|scope| scope.deadline = Some(deadline))
    }

    /// Returns a child context tagged with the host's request id.
    pub fn with_request_id(&self, id: impl Into<Arc<str>>) -> Self {
        let id = id.into();
        self.with_scope(|scope| scope.request_id = Some(id))
    }

    fn with_scope(&self, f: impl FnOnce(&mut Scope)) -> Self {
        let mut scope = Scope::clone(&self.scope);
        f(&mut scope);
        Self {
            scope: Arc::new(scope),
            values: self.values.clone(),
        }
    }

    /// Returns a child context holding `value`.
    ///
    /// Values are keyed by type. A child value shadows a parent value of the
    /// same type; the parent context still sees its own.
    pub fn with_value<T: Send + Sync + 'static>(&self, value: T) -> Self {
        Self {
            scope: self.scope.clone(),
            values: Some(Arc::new(Entry {
                key: TypeId::of::<T>(),
                value: Arc::new(value),
                parent: self.values.clone(),
            })),
        }
    }

    /// Looks up the nearest value of type `T`.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        let key = TypeId::of::<T>();
        let mut cursor = self.values.as_deref();
        while let Some(entry) = cursor {
            if entry.key == key {
                return entry.value.downcast_ref::<T>();
            }
            cursor = entry.parent.as_deref();
        }
        None
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.scope.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.scope.cancellation.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.scope.deadline
    }

    pub fn request_id(&self) -> Option<&str> {
        self.scope.request_id.as_deref()
    }

    // ─── Invocation metadata ──────────────────────────────────────────────────

    /// Attaches the raw payload and resolved input type for one invocation.
    pub(crate) fn enrich(&self, payload: Bytes, input_type: Option<InputType>) -> Self {
        self.with_value(Invocation {
            payload,
            input_type,
        })
    }

    /// The raw payload of the current invocation.
    pub fn payload(&self) -> Option<&Bytes> {
        self.value::<Invocation>().map(|inv| &inv.payload)
    }

    /// The handler's declared input type, absent if the handler takes no input.
    pub fn input_type(&self) -> Option<&InputType> {
        self.value::<Invocation>()
            .and_then(|inv| inv.input_type.as_ref())
    }

    /// Decodes the raw invocation payload as JSON into an arbitrary type.
    ///
    /// Useful when one function is triggered by several event shapes and a
    /// middleware needs to recognise one of them before the payload is
    /// decoded into the handler's own input type.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T> {
        let target = std::any::type_name::<T>();
        let payload = self
            .payload()
            .ok_or_else(|| Error::decode(target, "no invocation payload in context"))?;
        serde_json::from_slice(payload).map_err(|e| Error::decode(target, e))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id())
            .field("deadline", &self.scope.deadline)
            .field("cancelled", &self.is_cancelled())
            .field("payload_len", &self.payload().map(Bytes::len))
            .field("input_type", &self.input_type())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq)]
    struct Depth(usize);

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ping {
        ping: bool,
    }

    #[test]
    fn test_child_values_do_not_leak_into_parent() {
        let parent = Context::new().with_value(Depth(1));
        let child = parent.with_value(Depth(2));

        assert_eq!(parent.value::<Depth>(), Some(&Depth(1)));
        assert_eq!(child.value::<Depth>(), Some(&Depth(2)));
        assert!(Context::new().value::<Depth>().is_none());
    }

    #[test]
    fn test_values_of_different_types_coexist() {
        let ctx = Context::new().with_value(Depth(3)).with_value("label");
        assert_eq!(ctx.value::<Depth>(), Some(&Depth(3)));
        assert_eq!(ctx.value::<&'static str>(), Some(&"label"));
    }

    #[test]
    fn test_scope_is_inherited() {
        let token = CancellationToken::new();
        let ctx = Context::new()
            .with_cancellation(token.clone())
            .with_request_id("req-1")
            .with_value(Depth(0));

        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.request_id(), Some("req-1"));
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_enrich_exposes_payload_and_input_type() {
        let ctx = Context::new().enrich(
            Bytes::from_static(br#"{"ping":true}"#),
            Some(InputType::of::<String>()),
        );
        assert_eq!(ctx.payload().map(|p| p.len()), Some(13));
        assert!(ctx.input_type().is_some_and(|t| t.is::<String>()));
        assert_eq!(ctx.extract::<Ping>().unwrap(), Ping { ping: true });
    }

    #[test]
    fn test_input_type_absent_for_untyped_handlers() {
        let ctx = Context::new().enrich(Bytes::from_static(b"{}"), None);
        assert!(ctx.payload().is_some());
        assert!(ctx.input_type().is_none());
    }

    #[test]
    fn test_extract_without_payload_fails() {
        let err = Context::new().extract::<Ping>().unwrap_err();
        assert!(matches!(err, Error::DecodeFailure { .. }));
    }
}
