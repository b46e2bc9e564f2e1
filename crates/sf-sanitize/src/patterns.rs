//! Compiled patterns, built once on first use

use std::sync::OnceLock;

use regex::Regex;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        pub(crate) fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($re).expect("static pattern compiles"))
        }
    };
}

// Markup
pattern!(script_block, r"(?is)<script\b[^>]*>.*?</script\s*>");
pattern!(style_block, r"(?is)<style\b[^>]*>.*?</style\s*>");
pattern!(script_tag, r"(?i)</?script[^>]*>?");
pattern!(any_tag, r"<[^>]*>");
pattern!(tag_parts, r"^<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9]*)([^>]*)>$");
pattern!(href_attr, r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#);

// Free-form input
pattern!(javascript_scheme, r"(?i)javascript\s*:");
pattern!(event_handler, r"(?i)\bon\w+\s*=");

// Email
pattern!(email, r"^[^\s@]+@[^\s@]+\.[^\s@]+$");

// SQL fragments
pattern!(sql_union_select, r"(?i)\bunion\b(\s+all)?\s+select\b");
pattern!(sql_tautology, r"(?i)\b(or|and)\b\s+(\d+|'[^']*')\s*=\s*(\d+|'[^']*')");
pattern!(sql_comment, r"--|/\*|\*/|#");
pattern!(sql_metachar, r#"['";]"#);
