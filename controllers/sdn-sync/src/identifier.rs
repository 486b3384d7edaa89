//! Resource identifier normalization
//!
//! Identifiers arrive either in canonical dashed form
//! (`6b9570f2-17b1-4fc3-99ec-1b7f7778a29a`) or as 32 bare hex digits. Every
//! identifier is checked and normalized before it reaches the backend.

use crate::sync_error::SyncError;

const SEPARATOR: char = '-';
const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// True if `raw`, with separators removed, is exactly 32 hex digits.
pub fn is_well_formed(raw: &str) -> bool {
    let mut digits = 0;
    for c in raw.chars().filter(|c| *c != SEPARATOR) {
        if !c.is_ascii_hexdigit() {
            return false;
        }
        digits += 1;
    }
    digits == 32
}

/// Canonical form of a well-formed identifier.
///
/// Bare hex digits are regrouped 8-4-4-4-12; input that already carries
/// separators is returned unchanged. Idempotent.
pub fn normalize(raw: &str) -> Result<String, SyncError> {
    if !is_well_formed(raw) {
        return Err(SyncError::InvalidIdentifier {
            field: "id".to_string(),
            value: raw.to_string(),
        });
    }
    if raw.contains(SEPARATOR) {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(36);
    let mut rest = raw;
    for (i, len) in GROUPS.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        let (group, tail) = rest.split_at(*len);
        out.push_str(group);
        rest = tail;
    }
    Ok(out)
}

fn normalize_field(field: &str, raw: &str) -> Result<String, SyncError> {
    normalize(raw).map_err(|_| SyncError::InvalidIdentifier {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

/// Normalized value of a required identifier field
pub fn require_uuid(field: &str, value: Option<&str>) -> Result<String, SyncError> {
    match value {
        Some(raw) if !raw.is_empty() => normalize_field(field, raw),
        _ => Err(SyncError::missing(field)),
    }
}

/// Normalized value of an optional identifier field
pub fn optional_uuid(field: &str, value: Option<&str>) -> Result<Option<String>, SyncError> {
    value.map(|raw| normalize_field(field, raw)).transpose()
}

/// Like [`optional_uuid`], but keeps an empty string (meaning "clear") as is
pub fn optional_uuid_or_empty(field: &str, value: Option<&str>) -> Result<Option<String>, SyncError> {
    match value {
        Some("") => Ok(Some(String::new())),
        other => optional_uuid(field, other),
    }
}

/// Normalized values of an optional identifier list
pub fn uuid_list(field: &str, values: Option<&[String]>) -> Result<Option<Vec<String>>, SyncError> {
    values
        .map(|ids| ids.iter().map(|id| normalize_field(field, id)).collect())
        .transpose()
}

/// Fresh identifier for objects the controller creates on its own
pub fn generate() -> String {
    uuid::Uuid::new_v4().to_string()
}
