use std::path::{Path, PathBuf};

use query_harness_core::prelude::ConfigurationError;

use crate::types::HarnessResult;

/// Resolve the path to an external binary.
///
/// A bare name such as `memgraph` is looked up in the user's `PATH`. Anything containing a path
/// separator is taken as given and must exist. `what` names the binary in error messages.
pub fn resolve_binary(bin: &Path, what: &str) -> HarnessResult<PathBuf> {
    if bin.as_os_str().is_empty() {
        return Err(ConfigurationError::new(format!("Path to the {what} binary is empty")).into());
    }

    if bin.components().count() == 1 && !bin.is_absolute() {
        log::debug!("'{}' is not a path so looking in user's 'PATH'", bin.display());
        return which::which(bin)
            .map_err(|e| {
                ConfigurationError::new(format!(
                    "The {what} binary '{}' was not found in PATH: {e}",
                    bin.display()
                ))
            })
            .map_err(Into::into);
    }

    if !bin.exists() {
        return Err(ConfigurationError::new(format!(
            "Path to the {what} binary '{}' doesn't exist",
            bin.display()
        ))
        .into());
    }

    Ok(bin.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn rejects_empty_path() {
        let err = resolve_binary(Path::new(""), "server").unwrap_err();
        assert!(err.is::<ConfigurationError>());
    }

    #[test]
    fn rejects_path_that_does_not_exist() {
        let err = resolve_binary(Path::new("/non/existent/path/to/server"), "server").unwrap_err();
        assert!(err.is::<ConfigurationError>());
        assert!(err.to_string().contains("doesn't exist"));
    }

    #[test]
    fn accepts_existing_path() {
        let temp = NamedTempFile::new().unwrap();
        let result = resolve_binary(temp.path(), "client").unwrap();
        assert_eq!(temp.path(), result);
    }

    #[cfg(unix)]
    #[test]
    fn bare_name_is_found_in_path() {
        let result = resolve_binary(Path::new("sh"), "client").unwrap();
        assert!(result.is_absolute());
        assert!(result.ends_with("sh"));
    }

    #[test]
    fn bare_name_missing_from_path_is_error() {
        let err = resolve_binary(Path::new("query-harness-no-such-binary"), "client").unwrap_err();
        assert!(err.is::<ConfigurationError>());
    }
}
