//! Base-filename derivation for exported artifacts.
//!
//! The export layer names artifacts `<base>.har` / `<base>_Console.txt`
//! where `<base>` comes from the page title, falling back to the URL host,
//! falling back to [`FALLBACK_BASE_NAME`]. Sanitization is a pure,
//! idempotent function: running it twice never changes the result.

use url::Url;

/// Base name used when neither title nor URL host survives sanitization.
pub const FALLBACK_BASE_NAME: &str = "Trace";

/// Maximum length of a sanitized base name, in characters.
const MAX_BASE_LEN: usize = 120;

/// Characters that cannot appear in a filename on the supported platforms.
fn is_illegal(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// Reserved device names that cannot be used as a bare filename on Windows.
fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "con" | "prn" | "aux" | "nul" => true,
        _ => {
            lower.len() == 4
                && (lower.starts_with("com") || lower.starts_with("lpt"))
                && lower.as_bytes()[3].is_ascii_digit()
                && lower.as_bytes()[3] != b'0'
        }
    }
}

/// Sanitize a page title (or URL host) into a filesystem-safe base name.
///
/// Rules, in order: illegal and control characters become spaces;
/// whitespace runs collapse to a single space; the result is trimmed and
/// stripped of leading/trailing dots and spaces; reserved device names get
/// a `-site` suffix; names longer than 120 characters are truncated and
/// re-stripped of trailing dots and spaces. Empty input yields empty
/// output; the caller is responsible for falling back.
#[must_use]
pub fn sanitize_base_name(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| if is_illegal(c) { ' ' } else { c })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut name = collapsed
        .trim_matches(|c| c == '.' || c == ' ')
        .to_owned();

    if is_reserved(&name) {
        name.push_str("-site");
    }

    if name.chars().count() > MAX_BASE_LEN {
        name = name.chars().take(MAX_BASE_LEN).collect();
        name = name.trim_end_matches(|c| c == '.' || c == ' ').to_owned();
        // Truncation can strip a long dot/space tail and expose a reserved
        // name that the pre-truncation check could not see.
        if is_reserved(&name) {
            name.push_str("-site");
        }
    }

    name
}

/// Derive the artifact base name: sanitized title, else sanitized URL host,
/// else [`FALLBACK_BASE_NAME`].
#[must_use]
pub fn derive_base_name(title: Option<&str>, url: Option<&str>) -> String {
    if let Some(title) = title {
        let base = sanitize_base_name(title);
        if !base.is_empty() {
            return base;
        }
    }

    if let Some(url) = url {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                let base = sanitize_base_name(host);
                if !base.is_empty() {
                    return base;
                }
            }
        }
    }

    FALLBACK_BASE_NAME.to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
