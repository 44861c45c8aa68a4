//! Filename handling for stored files and download headers.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use uuid::Uuid;

const MAX_SANITIZED_LEN: usize = 100;
const FALLBACK_NAME: &str = "upload";
const UUID_SIMPLE_LEN: usize = 32;

// RFC 5987 attr-char: ALPHA / DIGIT / "!" / "#" / "$" / "&" / "+" / "-" / "." / "^" / "_" / "`" / "|" / "~"
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Reduces an uploader-supplied name to `[A-Za-z0-9._-]`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let leading_dots = sanitized.len() - sanitized.trim_start_matches('.').len();
    sanitized.drain(..leading_dots);
    sanitized.truncate(MAX_SANITIZED_LEN);

    if sanitized.chars().all(|c| c == '_' || c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        sanitized
    }
}

pub fn stored_name_for(original_name: &str) -> String {
    format!("{}_{}", Uuid::new_v4().simple(), sanitize_filename(original_name))
}

/// Stored names are produced by [`stored_name_for`]; anything that could
/// escape the storage directory is refused.
pub fn is_safe_stored_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.starts_with('.')
}

/// Whether `name` has the `<32 hex digits>_<sanitized>` shape produced by
/// [`stored_name_for`]. Only such files are reclaimed as orphans.
pub fn is_generated_stored_name(name: &str) -> bool {
    let Some((id, rest)) = name.split_once('_') else {
        return false;
    };
    id.len() == UUID_SIMPLE_LEN
        && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        && !rest.is_empty()
        && is_safe_stored_name(name)
}

/// `Content-Disposition` value carrying both an ASCII fallback and the
/// UTF-8 encoded original name.
pub fn content_disposition(original_name: &str) -> String {
    let fallback: String = original_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(original_name, ATTR_CHAR)
    )
}
