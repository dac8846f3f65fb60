//! Decodes lookup metadata into an editable source location.
//!
//! The engine only decodes: resolving a location into an open editor view
//! is the collaborator's job.

use tether_edn::{Map, Value};
use url::Url;

/// A decoded source location from a lookup response.
///
/// `line` and `column` are zero-based, converted from the one-based fields
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// URL scheme of the resource (`file`, `jar`, ...). Bare paths decode
    /// with the `file` scheme.
    pub scheme: String,
    /// Path component of the resource.
    pub path: String,
    /// Zero-based line.
    pub line: u32,
    /// Zero-based column.
    pub column: u32,
}

impl Location {
    /// Splits a `jar:` path into archive and entry parts.
    ///
    /// The entry's leading slash is stripped so it can be looked up inside
    /// the archive directly.
    #[must_use]
    pub fn archive_entry(&self) -> Option<(&str, &str)> {
        let (archive, entry) = self.path.split_once('!')?;
        Some((archive, entry.strip_prefix('/').unwrap_or(entry)))
    }
}

/// Decodes the `:file`/`:line`/`:column` fields of a lookup `:info` map.
///
/// Returns `None` when the info map carries no usable `:file` field.
#[must_use]
pub fn parse_location(info: &Map) -> Option<Location> {
    let file = info.get_keyword("file")?.as_str()?;
    if file.is_empty() {
        return None;
    }
    let (scheme, path) = match Url::parse(file) {
        Ok(url) => (url.scheme().to_owned(), url.path().to_owned()),
        // Bare paths such as "NO_SOURCE_FILE" or "/src/app.clj" are not
        // URLs; treat them as file paths.
        Err(_) => ("file".to_owned(), file.to_owned()),
    };
    Some(Location {
        scheme,
        path,
        line: zero_based(info.get_keyword("line")),
        column: zero_based(info.get_keyword("column")),
    })
}

/// Converts a one-based wire field to a zero-based offset, defaulting
/// missing or malformed fields to the first line or column.
fn zero_based(field: Option<&Value>) -> u32 {
    let one_based = match field {
        Some(Value::Int(number)) => *number,
        Some(Value::String(text)) => text.parse().unwrap_or(1),
        _ => 1,
    };
    u32::try_from(one_based.saturating_sub(1)).unwrap_or(0)
}
