//! # engine_core
//!
//! Foundation types shared by every other engine crate:
//!
//! - [`HashString`] — a string identifier with a cached 32-bit hash,
//!   usable in `const` contexts.
//! - [`TypeId32`] — the stable type id derived from a type's registered
//!   name, used to key component events and reflection entries.
//! - [`ServiceRegistry`] / [`ServiceHandle`] — per-interface singleton
//!   slots for cross-subsystem lookup.

pub mod ident;
pub mod service;

pub use ident::{HashString, TypeId32, fnv1a_32};
pub use service::{ServiceHandle, ServiceRegistry};
