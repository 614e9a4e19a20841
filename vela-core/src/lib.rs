//! Vela Core
//!
//! Schema-driven runtime for typed cloud resource bindings: a declarative
//! service descriptor is loaded into an immutable schema, and the runtime
//! synthesizes resource identity, lazy attribute loading, actions,
//! references, and paginated collections on top of a narrow adapter over the
//! low-level service client.

pub mod action;
pub mod adapter;
mod codec;
pub mod collection;
pub mod error;
pub mod resource;
pub mod schema;
pub mod service;
