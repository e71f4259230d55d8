//! The resolved input type of a handler.

use std::fmt;

use serde::de::DeserializeOwned;

use crate::codec::Unmarshaler;
use crate::error::{Error, Result};
use crate::value::{TypeInfo, Value};

/// A handler's declared input type, with the operations the framework needs
/// to produce values of it without knowing it statically.
///
/// - `zero` yields the value handed to the handler when the chain delivers
///   [`Value::Nil`]: `T::default()`, which is `None` for `Option<T>` inputs.
/// - `decode` converts an unmarshaled document into a `T`.
#[derive(Clone, Copy)]
pub struct InputType {
    info: TypeInfo,
    zero: fn() -> Value,
    decode: fn(serde_json::Value) -> serde_json::Result<Value>,
}

fn zero_of<T: Default + Send + 'static>() -> Value {
    Value::opaque(T::default())
}

fn decode_as<T: DeserializeOwned + Send + 'static>(
    doc: serde_json::Value,
) -> serde_json::Result<Value> {
    serde_json::from_value::<T>(doc).map(Value::opaque)
}

impl InputType {
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + Default + Send + 'static,
    {
        Self {
            info: TypeInfo::of::<T>(),
            zero: zero_of::<T>,
            decode: decode_as::<T>,
        }
    }

    pub fn info(&self) -> TypeInfo {
        self.info
    }

    pub fn name(&self) -> &'static str {
        self.info.name()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.info.is::<T>()
    }

    /// The value substituted for [`Value::Nil`].
    pub fn zero(&self) -> Value {
        (self.zero)()
    }

    /// Returns `true` if `value` can be handed to the handler as-is.
    pub fn accepts(&self, value: &Value) -> bool {
        value.type_info() == Some(self.info)
    }

    /// Converts an already unmarshaled document into this type.
    pub fn decode_document(&self, doc: serde_json::Value) -> Result<Value> {
        (self.decode)(doc).map_err(|e| Error::decode(self.name(), e))
    }

    /// Unmarshals `payload` and converts it into this type.
    pub fn decode(&self, unmarshaler: &Unmarshaler, payload: &[u8]) -> Result<Value> {
        let doc = unmarshaler
            .unmarshal(payload)
            .map_err(|e| Error::decode(self.name(), e))?;
        self.decode_document(doc)
    }
}

impl PartialEq for InputType {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
    }
}

impl fmt::Debug for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InputType").field(&self.info.name()).finish()
    }
}
