//! Builtin Argument Unpacking
//!
//! Binds positional and keyword arguments to a builtin's parameter list.

use crate::error::{CacheError, Result};
use crate::value::ScriptValue;

/// Matches `args` then `kwargs` against `params`, all of which are required.
///
/// Returns one value per parameter, in parameter order. Error messages are
/// prefixed with `builtin` (e.g. `kvcache.get: missing argument for key`).
pub fn unpack_args(
    builtin: &str,
    args: Vec<ScriptValue>,
    kwargs: Vec<(String, ScriptValue)>,
    params: &[&str],
) -> Result<Vec<ScriptValue>> {
    if args.len() > params.len() {
        return Err(CacheError::InvalidArgument(format!(
            "{}: got {} arguments, want at most {}",
            builtin,
            args.len(),
            params.len()
        )));
    }

    let mut slots: Vec<Option<ScriptValue>> = vec![None; params.len()];
    for (slot, value) in slots.iter_mut().zip(args) {
        *slot = Some(value);
    }

    for (name, value) in kwargs {
        let index = params.iter().position(|p| *p == name).ok_or_else(|| {
            CacheError::InvalidArgument(format!(
                "{}: unexpected keyword argument {}",
                builtin, name
            ))
        })?;
        if slots[index].is_some() {
            return Err(CacheError::InvalidArgument(format!(
                "{}: got multiple values for parameter {}",
                builtin, name
            )));
        }
        slots[index] = Some(value);
    }

    slots
        .into_iter()
        .zip(params)
        .map(|(slot, name)| {
            slot.ok_or_else(|| {
                CacheError::InvalidArgument(format!("{}: missing argument for {}", builtin, name))
            })
        })
        .collect()
}

/// Requires a string argument.
pub fn expect_string(builtin: &str, param: &str, value: ScriptValue) -> Result<String> {
    match value {
        ScriptValue::String(s) => Ok(s),
        other => Err(CacheError::InvalidArgument(format!(
            "{}: for parameter {}: got {}, want string",
            builtin,
            param,
            other.type_name()
        ))),
    }
}
