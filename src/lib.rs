//! kvcache - A persistent TTL cache for embedded scripts
//!
//! Scripts see a module with `get` and `set`. Values are encoded to JSON and
//! kept in a pluggable byte store (memory, SQLite, PostgreSQL or a JSON
//! file) with a sliding time-to-live per key.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod module;
pub mod store;
pub mod tasks;
pub mod value;

pub use api::AppState;
pub use config::{Backend, Config};
pub use error::{CacheError, StoreError};
pub use module::KvCache;
pub use store::Store;
pub use value::ScriptValue;
