use std::env;
use std::path::Path;
use std::str::FromStr;

/// Read an environment variable, treating empty values as unset
pub(super) fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Read and parse an environment variable
///
/// Returns `Ok(None)` when the variable is unset, and an error naming the
/// variable when the value does not parse.
pub(super) fn env_parse<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {name} value '{raw}': {e}")),
        None => Ok(None),
    }
}

/// Load system instructions from a file, passed through unmodified
pub(super) fn read_instructions(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read instructions file {}: {}", path.display(), e))
}
