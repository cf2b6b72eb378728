//! Optional JSON Schema validation at the queue boundary.
//!
//! Validate payloads against JSON Schema 2020-12 before they are published
//! and after they are received. Catch contract violations before they
//! become bugs.
//!
//! This crate is optional — use it when you want schema-enforced payload
//! contracts on top of the typed (de)serialization the core already does.

pub mod config;
pub mod error;
pub mod registry;
pub mod validator;

pub use config::RegistryConfig;
pub use error::{Result, SchemaError};
pub use registry::SchemaRegistry;
