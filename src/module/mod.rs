//! Script Module
//!
//! Exposes the cache to embedded scripts as a module named `kvcache` with two
//! builtins:
//!
//! - `get(key)` returns the stored value, or `None` when the key is missing
//!   or expired. Reading a key resets its TTL.
//! - `set(key, value)` stores `value` under `key` and resets its TTL.

mod args;

use std::sync::Arc;

use tracing::debug;

use crate::error::{CacheError, Result};
use crate::store::Store;
use crate::value::{self, ScriptValue};

use args::{expect_string, unpack_args};

/// Name the module is registered under in the script host.
pub const MODULE_NAME: &str = "kvcache";

const MEMBERS: [&str; 2] = ["get", "set"];

// == KvCache ==
/// Script binding over a [`Store`].
///
/// Values are encoded on every `set` and decoded on every `get`; nothing is
/// cached between calls.
#[derive(Clone)]
pub struct KvCache {
    store: Arc<dyn Store>,
}

impl KvCache {
    // == Constructor ==
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Returns the builtin names exported by the module.
    pub fn members() -> &'static [&'static str] {
        &MEMBERS
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // == Get ==
    /// Looks up `key`, returning [`ScriptValue::None`] when it is absent.
    pub async fn get(&self, key: &str) -> Result<ScriptValue> {
        match self.store.get(key).await? {
            None => {
                debug!("Cache miss for key {:?}", key);
                Ok(ScriptValue::None)
            }
            Some(bytes) => {
                debug!("Cache hit for key {:?}", key);
                value::decode(&bytes).map_err(|source| CacheError::Decode {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key` and returns [`ScriptValue::None`].
    ///
    /// Nothing is written if the value cannot be encoded.
    pub async fn set(&self, key: &str, value: &ScriptValue) -> Result<ScriptValue> {
        let bytes = value::encode(value).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &bytes).await?;
        Ok(ScriptValue::None)
    }

    // == Call ==
    /// Invokes a builtin by name with script arguments.
    ///
    /// `builtin` may be the bare member name (`get`) or the qualified one
    /// (`kvcache.get`).
    pub async fn call(
        &self,
        builtin: &str,
        args: Vec<ScriptValue>,
        kwargs: Vec<(String, ScriptValue)>,
    ) -> Result<ScriptValue> {
        let member = builtin
            .strip_prefix(MODULE_NAME)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(builtin);

        match member {
            "get" => {
                let name = "kvcache.get";
                let mut values = unpack_args(name, args, kwargs, &["key"])?.into_iter();
                let key = expect_string(name, "key", values.next().unwrap_or_default())?;
                self.get(&key).await
            }
            "set" => {
                let name = "kvcache.set";
                let mut values = unpack_args(name, args, kwargs, &["key", "value"])?.into_iter();
                let key = expect_string(name, "key", values.next().unwrap_or_default())?;
                let value = values.next().unwrap_or_default();
                self.set(&key, &value).await
            }
            _ => Err(CacheError::UnknownBuiltin(builtin.to_string())),
        }
    }

    // == Close ==
    /// Closes the backing store.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await?;
        Ok(())
    }
}
