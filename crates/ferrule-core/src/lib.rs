//! # Ferrule Core
//!
//! Foundation types shared by every Ferrule crate:
//!
//! - **Values** ([`Value`], [`Dynamic`], [`TypeInfo`]) – the tagged union that
//!   travels through a middleware chain between the host and the handler
//! - **Input types** ([`InputType`]) – a handler's declared input, with the
//!   zero-value and decoding operations the framework needs
//! - **Codecs** ([`Unmarshaler`], [`Marshaler`]) – pluggable payload decoding
//!   and result encoding, JSON by default
//! - **Errors** ([`Error`], [`SignatureError`]) – the invocation and
//!   registration failure taxonomy

pub mod codec;
pub mod error;
pub mod input;
pub mod value;

pub use codec::{Marshaler, Unmarshaler};
pub use error::{BoxError, Error, Result, SignatureError};
pub use input::InputType;
pub use value::{Dynamic, TypeInfo, Value};

pub use bytes::Bytes;
