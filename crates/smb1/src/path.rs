//! Share-relative path validation.
//!
//! Public-API paths use backslash separators, begin with `\`, and never
//! carry drive letters. Rejections happen client-side so malformed names
//! never reach the wire.

use crate::error::{Error, Result};

/// Longest path the server accepts, in UTF-16 code units.
const MAX_PATH_UNITS: usize = 255;

pub(crate) fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidArgument("path is empty".into()));
    }
    if !path.starts_with('\\') {
        return Err(Error::InvalidArgument(format!(
            "path {path:?} must begin with '\\'"
        )));
    }
    if path.contains('/') {
        return Err(Error::InvalidArgument(format!(
            "path {path:?} contains '/'; use '\\' separators"
        )));
    }
    if path.contains('\0') {
        return Err(Error::InvalidArgument(format!(
            "path {path:?} contains a NUL byte"
        )));
    }
    if path.contains(':') {
        return Err(Error::InvalidArgument(format!(
            "path {path:?} contains a drive letter"
        )));
    }
    if path.encode_utf16().count() > MAX_PATH_UNITS {
        return Err(Error::InvalidArgument(format!(
            "path exceeds {MAX_PATH_UNITS} UTF-16 code units"
        )));
    }
    for component in path[1..].split('\\') {
        if component == "." || component == ".." {
            return Err(Error::InvalidArgument(format!(
                "path {path:?} contains a relative component"
            )));
        }
        if component.is_empty() && path != "\\" {
            return Err(Error::InvalidArgument(format!(
                "path {path:?} contains an empty component"
            )));
        }
    }
    Ok(())
}

/// The FIND search pattern for listing `path`.
pub(crate) fn listing_pattern(path: &str) -> String {
    if path == "\\" {
        "\\*".to_string()
    } else {
        format!("{path}\\*")
    }
}
