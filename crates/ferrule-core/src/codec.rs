//! Pluggable payload codecs.
//!
//! Decoding happens in two steps so that the codec itself never needs to know
//! the handler's concrete input type:
//!
//! ```text
//! payload bytes ──Unmarshaler──▶ serde_json::Value ──InputType::decode──▶ T
//! result Value  ──Value::to_json──▶ serde_json::Value ──Marshaler──▶ bytes
//! ```
//!
//! Any format with a serde implementation can plug in by converting to and
//! from `serde_json::Value`. JSON is the default in both directions.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::BoxError;

type UnmarshalFn = dyn Fn(&[u8]) -> Result<serde_json::Value, BoxError> + Send + Sync;
type MarshalFn = dyn Fn(&serde_json::Value) -> Result<Bytes, BoxError> + Send + Sync;

/// Turns raw payload bytes into a format-neutral document.
#[derive(Clone)]
pub struct Unmarshaler(Arc<UnmarshalFn>);

impl Unmarshaler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[u8]) -> Result<serde_json::Value, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// JSON unmarshaler backed by `serde_json`.
    pub fn json() -> Self {
        Self::new(|bytes| serde_json::from_slice(bytes).map_err(Into::into))
    }

    pub fn unmarshal(&self, bytes: &[u8]) -> Result<serde_json::Value, BoxError> {
        (self.0)(bytes)
    }
}

impl Default for Unmarshaler {
    fn default() -> Self {
        Self::json()
    }
}

impl fmt::Debug for Unmarshaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unmarshaler").finish_non_exhaustive()
    }
}

/// Turns a format-neutral document into response bytes.
#[derive(Clone)]
pub struct Marshaler(Arc<MarshalFn>);

impl Marshaler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Result<Bytes, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// JSON marshaler backed by `serde_json`.
    pub fn json() -> Self {
        Self::new(|value| {
            serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(Into::into)
        })
    }

    pub fn marshal(&self, value: &serde_json::Value) -> Result<Bytes, BoxError> {
        (self.0)(value)
    }
}

impl Default for Marshaler {
    fn default() -> Self {
        Self::json()
    }
}

impl fmt::Debug for Marshaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Marshaler").finish_non_exhaustive()
    }
}
