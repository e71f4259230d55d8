//! Built-in middleware.
//!
//! - [`unmarshal`] – decodes raw payload bytes into the handler's input type;
//!   prepended automatically unless a function disables it
//! - [`sqs_records`] – decodes batch envelopes into `Vec<T>` inputs
//! - [`warmup`] – answers keep-warm pings without running the handler

pub mod sqs;
pub mod unmarshal;
pub mod warmup;

pub use sqs::{json_sqs_records, sqs_records};
pub use unmarshal::{json_unmarshal, unmarshal};
pub use warmup::warmup;
