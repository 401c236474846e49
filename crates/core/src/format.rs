//! Name normalization for kinds and fields
//!
//! Callers may spell a kind or field as `DogOwner`, `dog-owner`, `dog owner`
//! or `dog_owner`; all of them resolve to `dog_owner`.

use crate::record::Record;

/// Normalize a kind name
pub fn format_kind(kind: &str) -> String {
    snake_case(kind)
}

/// Normalize a field name
pub fn format_field(field: &str) -> String {
    snake_case(field)
}

/// Normalize every field name of a record; values are untouched
pub fn format_record(record: Record) -> Record {
    record
        .into_fields()
        .into_iter()
        .map(|(field, value)| (format_field(&field), value))
        .collect()
}

/// Convert an identifier to snake_case
///
/// Uppercase letters start a new word unless they follow another uppercase
/// letter that is not itself followed by a lowercase letter (`HTTPServer`
/// becomes `http_server`). Hyphens, spaces and dots become underscores and
/// runs of separators collapse.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '.' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.map_or(false, |n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}
