use std::path::{Component, Path};

use crate::TransferError;

/// Validates that `name` can be used as a single directory component.
///
/// Vault names and upload ids end up as directory names inside a sink's
/// storage root, so they must not be able to escape it.
///
/// Rejects:
/// - Empty names
/// - Absolute paths and Windows prefixes (`C:`, `\\server`)
/// - `.` and `..`
/// - Names containing a path separator
pub fn validate_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidPath("empty name".into()));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(TransferError::InvalidPath(format!(
            "separator not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(TransferError::InvalidPath(format!(
            "parent directory traversal not allowed: {name}"
        ))),
        (Some(Component::Prefix(_)), _) => Err(TransferError::InvalidPath(format!(
            "path prefix not allowed: {name}"
        ))),
        _ => Err(TransferError::InvalidPath(format!(
            "not a plain name: {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        assert!(validate_name("").is_err());
    }

    #[test]
    fn rejects_parent_dir() {
        assert!(validate_name("..").is_err());
    }

    #[test]
    fn rejects_current_dir() {
        assert!(validate_name(".").is_err());
    }

    #[test]
    fn rejects_nested_traversal() {
        assert!(validate_name("vault/../../escape").is_err());
    }

    #[test]
    fn rejects_absolute_path() {
        assert!(validate_name("/tmp/vault").is_err());
    }

    #[test]
    fn rejects_backslash() {
        assert!(validate_name("a\\b").is_err());
    }

    #[test]
    fn accepts_plain_vault_name() {
        assert!(validate_name("pop-os").is_ok());
    }

    #[test]
    fn accepts_dotted_name() {
        assert!(validate_name("backups.2026").is_ok());
    }

    #[test]
    fn error_names_the_input() {
        let err = validate_name("../x").unwrap_err();
        assert!(err.to_string().contains("../x"));
    }
}
