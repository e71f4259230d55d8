//! The dynamic value that flows through a middleware chain.
//!
//! Middleware see neither the handler's input type nor its output type at
//! compile time, so everything travelling between them is a [`Value`]:
//!
//! - [`Value::Nil`]: no value.
//! - [`Value::Bytes`]: raw payload bytes, the initial value of every chain.
//! - [`Value::Dynamic`]: any other `Send + 'static` value, type-erased.
//!
//! Extraction is exact: a value only comes back out as the type it was put in
//! as. There is no coercion between numeric types or byte containers.

use std::any::{Any, TypeId};
use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use serde::ser::Error as _;

use crate::error::{BoxError, Error, Result};

type JsonProjection = fn(&(dyn Any + Send)) -> serde_json::Result<serde_json::Value>;

/// Identity of a Rust type, as seen by the adapter.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    name: &'static str,
    id: TypeId,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A type-erased value together with its type identity.
pub struct Dynamic {
    inner: Box<dyn Any + Send>,
    info: TypeInfo,
    json: Option<JsonProjection>,
}

impl Dynamic {
    pub fn type_info(&self) -> TypeInfo {
        self.info
    }

    /// Returns `true` if the value can be projected to JSON for encoding.
    pub fn is_serializable(&self) -> bool {
        self.json.is_some()
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dynamic")
            .field("type", &self.info.name)
            .finish_non_exhaustive()
    }
}

fn project<T: Serialize + 'static>(
    value: &(dyn Any + Send),
) -> serde_json::Result<serde_json::Value> {
    match value.downcast_ref::<T>() {
        Some(v) => serde_json::to_value(v),
        None => Err(serde_json::Error::custom(format!(
            "value is not a '{}'",
            std::any::type_name::<T>()
        ))),
    }
}

/// The value passed between middleware.
#[derive(Debug, Default)]
pub enum Value {
    /// No value.
    #[default]
    Nil,
    /// Raw payload bytes.
    Bytes(Bytes),
    /// Any other value.
    Dynamic(Dynamic),
}

impl Value {
    /// Wraps a serializable value. Results produced this way can be encoded.
    pub fn new<T: Serialize + Send + 'static>(value: T) -> Self {
        Self::Dynamic(Dynamic {
            inner: Box::new(value),
            info: TypeInfo::of::<T>(),
            json: Some(project::<T>),
        })
    }

    /// Wraps a value that has no serialized form.
    ///
    /// Opaque values can be handed to a handler but cannot be returned to the
    /// host.
    pub fn opaque<T: Send + 'static>(value: T) -> Self {
        Self::Dynamic(Dynamic {
            inner: Box::new(value),
            info: TypeInfo::of::<T>(),
            json: None,
        })
    }

    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Wraps an error so it can occupy a handler's error return slot.
    pub fn from_error(err: impl Into<BoxError>) -> Self {
        Self::opaque::<BoxError>(err.into())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The type carried by this value, or `None` for [`Value::Nil`].
    pub fn type_info(&self) -> Option<TypeInfo> {
        match self {
            Self::Nil => None,
            Self::Bytes(_) => Some(TypeInfo::of::<Bytes>()),
            Self::Dynamic(d) => Some(d.info),
        }
    }

    /// Human-readable type name, `"nil"` for [`Value::Nil`].
    pub fn type_name(&self) -> &'static str {
        self.type_info().map_or("nil", |info| info.name())
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_info().is_some_and(|info| info.is::<T>())
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Nil => None,
            Self::Bytes(b) => (b as &dyn Any).downcast_ref::<T>(),
            Self::Dynamic(d) => d.inner.downcast_ref::<T>(),
        }
    }

    /// Moves the inner value out as `T`, handing the value back unchanged if
    /// it is of another type.
    pub fn take<T: 'static>(self) -> std::result::Result<T, Self> {
        match self {
            Self::Bytes(b) => {
                let mut slot = Some(b);
                if let Some(v) = (&mut slot as &mut dyn Any)
                    .downcast_mut::<Option<T>>()
                    .and_then(Option::take)
                {
                    return Ok(v);
                }
                Err(slot.map_or(Self::Nil, Self::Bytes))
            }
            Self::Dynamic(d) => {
                let Dynamic { inner, info, json } = d;
                inner
                    .downcast::<T>()
                    .map(|v| *v)
                    .map_err(|inner| Self::Dynamic(Dynamic { inner, info, json }))
            }
            other => Err(other),
        }
    }

    /// Projects this value to JSON for result encoding.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            Self::Nil => Ok(serde_json::Value::Null),
            Self::Bytes(b) => {
                serde_json::to_value(b).map_err(|e| Error::encode("bytes::Bytes", e))
            }
            Self::Dynamic(d) => match d.json {
                Some(project) => project(&*d.inner).map_err(|e| Error::encode(d.info.name(), e)),
                None => Err(Error::encode(
                    d.info.name(),
                    "value has no serialized form",
                )),
            },
        }
    }
}

impl From<Bytes> for Value {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}
