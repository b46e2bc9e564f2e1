//! Input Sanitization
//!
//! Cleans user-supplied strings before they reach the admin API:
//! - Markup stripping (`sanitize_text`) and allow-listed HTML (`sanitize_html`)
//! - Script/handler removal for free-form input (`sanitize_input`)
//! - Recursive payload cleaning over JSON values (`sanitize_value`)
//! - Email, SQL and filename helpers
//!
//! Nothing here fails except [`sanitize_email`].

mod patterns;
mod payload;

use sf_common::SyncError;
use thiserror::Error;

pub use payload::{sanitize_object, sanitize_value, ArrayPolicy};

use patterns::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

impl From<SanitizeError> for SyncError {
    fn from(err: SanitizeError) -> Self {
        SyncError::validation(err.to_string())
    }
}

const MAX_FILENAME_LEN: usize = 255;

const ALLOWED_TAGS: &[&str] = &["b", "i", "em", "strong", "a", "p", "br"];

const UNSAFE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

/// Apply `step` until it stops changing the string. Every step only removes
/// text, so this terminates.
fn until_stable(input: String, step: impl Fn(&str) -> String) -> String {
    let mut current = input;
    loop {
        let next = step(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Strip all markup and return plain text. Script and style bodies are
/// dropped together with their tags.
pub fn sanitize_text(input: &str) -> String {
    let without_blocks = style_block().replace_all(&script_block().replace_all(input, ""), "").into_owned();
    any_tag().replace_all(&without_blocks, "").into_owned()
}

/// Keep only `b`, `i`, `em`, `strong`, `a[href]`, `p` and `br`. Other tags are
/// unwrapped, attributes other than a safe `href` are dropped.
pub fn sanitize_html(input: &str) -> String {
    let without_blocks = style_block().replace_all(&script_block().replace_all(input, ""), "").into_owned();

    any_tag()
        .replace_all(&without_blocks, |caps: &regex::Captures| rewrite_tag(&caps[0]))
        .into_owned()
}

fn rewrite_tag(tag: &str) -> String {
    let Some(parts) = tag_parts().captures(tag) else {
        return String::new();
    };

    let closing = !parts[1].is_empty();
    let name = parts[2].to_ascii_lowercase();
    if !ALLOWED_TAGS.contains(&name.as_str()) {
        return String::new();
    }

    if closing {
        return if name == "br" { String::new() } else { format!("</{}>", name) };
    }

    if name == "a" {
        let href = href_attr().captures(&parts[3]).and_then(|c| {
            c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)).map(|m| m.as_str().to_string())
        });
        return match href {
            Some(href) if is_safe_href(&href) => format!("<a href=\"{}\">", escape_attr(&href)),
            _ => "<a>".to_string(),
        };
    }

    format!("<{}>", name)
}

fn is_safe_href(href: &str) -> bool {
    let compact: String = href
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    !UNSAFE_SCHEMES.iter().any(|scheme| compact.starts_with(scheme))
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Free-form input cleaning: `None` becomes `""`; script blocks, stray script
/// tags, `javascript:` schemes and inline event handlers are removed, then
/// surrounding whitespace is trimmed.
pub fn sanitize_input(input: Option<&str>) -> String {
    let Some(input) = input else {
        return String::new();
    };

    let cleaned = until_stable(input.to_string(), |s| {
        let s = script_block().replace_all(s, "");
        let s = script_tag().replace_all(&s, "");
        let s = javascript_scheme().replace_all(&s, "");
        event_handler().replace_all(&s, "").into_owned()
    });

    cleaned.trim().to_string()
}

/// `^[^\s@]+@[^\s@]+\.[^\s@]+$`
pub fn validate_email(input: &str) -> bool {
    email().is_match(input)
}

/// Strip markup, trim and lowercase, then validate.
pub fn sanitize_email(input: &str) -> Result<String, SanitizeError> {
    let cleaned = sanitize_text(input).trim().to_lowercase();
    if validate_email(&cleaned) {
        Ok(cleaned)
    } else {
        Err(SanitizeError::InvalidFormat(cleaned))
    }
}

/// Best-effort removal of common SQL injection fragments. Not a substitute
/// for parameterized queries on the server.
pub fn remove_sql_injection(input: &str) -> String {
    until_stable(input.to_string(), |s| {
        let s = sql_union_select().replace_all(s, "");
        let s = sql_tautology().replace_all(&s, "");
        let s = sql_comment().replace_all(&s, "");
        sql_metachar().replace_all(&s, "").into_owned()
    })
}

/// Replace everything outside `[A-Za-z0-9._-]` with `_`, drop `..`, cap at
/// 255 characters.
pub fn sanitize_filename(input: &str) -> String {
    let mapped: String = input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();

    let mut cleaned = until_stable(mapped, |s| s.replace("..", ""));
    cleaned.truncate(MAX_FILENAME_LEN);
    cleaned
}
