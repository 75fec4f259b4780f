//! Product version normalization and its coarse derived forms.
//!
//! Versions are coerced to four dot-separated components by right padding
//! with `0` (`"5.1"` becomes `"5.1.0.0"`). Inputs with four or more components
//! pass through unchanged. The derived forms keep a prefix of the normalized
//! components and append a literal `x`.

use crate::error::UtilError;

const COMPONENTS: usize = 4;

/// Validate that a version string contains only safe characters.
///
/// # Errors
/// Returns an error if the version is empty or contains characters other than
/// alphanumerics, dots, hyphens, and underscores.
pub fn validate_version(version: &str) -> Result<(), UtilError> {
    if version.is_empty()
        || !version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(UtilError::InvalidVersion {
            version: version.to_owned(),
        });
    }
    Ok(())
}

/// Pad `version` to four components: `"5"` becomes `"5.0.0.0"`.
///
/// # Errors
/// Returns an error if the version fails [`validate_version`].
pub fn normalize_version(version: &str) -> Result<String, UtilError> {
    validate_version(version)?;
    let mut parts: Vec<&str> = version.split('.').collect();
    while parts.len() < COMPONENTS {
        parts.push("0");
    }
    Ok(parts.join("."))
}

/// `"5.1"` becomes `"5.1.0.x"`.
///
/// # Errors
/// Returns an error if the version fails [`validate_version`].
pub fn version_abcx(version: &str) -> Result<String, UtilError> {
    coarse(version, 3)
}

/// `"5.2.3.4"` becomes `"5.2.x"`.
///
/// # Errors
/// Returns an error if the version fails [`validate_version`].
pub fn version_abx(version: &str) -> Result<String, UtilError> {
    coarse(version, 2)
}

/// `"5.1.2.3"` becomes `"5.x"`.
///
/// # Errors
/// Returns an error if the version fails [`validate_version`].
pub fn version_ax(version: &str) -> Result<String, UtilError> {
    coarse(version, 1)
}

fn coarse(version: &str, keep: usize) -> Result<String, UtilError> {
    let normalized = normalize_version(version)?;
    let mut parts: Vec<&str> = normalized.split('.').take(keep).collect();
    parts.push("x");
    Ok(parts.join("."))
}
