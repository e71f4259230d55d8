//! Handler registration and adaptation.
//!
//! This module turns a user function into something the middleware chain can
//! call. It provides:
//!
//! - **Registration** ([`traits`]) – the [`Handler`] trait, implemented for
//!   async functions of every accepted shape, and [`HandlerOutput`] for their
//!   return types
//! - **Validation** ([`descriptor`]) – [`Signature`] checking and the
//!   [`introspect`] gate for handlers supplied as arbitrary values
//! - **Adaptation** ([`adapter`]) – [`HandlerDescriptor::invoke`], which
//!   rebuilds typed arguments from the chain's dynamic value and folds the
//!   typed results back into one
//!
//! # Architecture
//!
//! ```text
//! async fn / closure ──Handler::into_dyn──▶ DynHandler ──describe──▶ HandlerDescriptor
//!                                                                        │
//!                           Chain terminal ◀──into_terminal──────────────┘
//! ```

pub mod adapter;
pub mod descriptor;
pub mod traits;

pub use descriptor::{
    DynHandler, ErasedCall, HandlerDescriptor, Param, Return, Signature, error_slot, introspect,
};
pub use traits::{Handler, HandlerOutput, Input};
