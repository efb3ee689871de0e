//! Identifier normalization, one dialect per target stack.
//!
//! Everything here is pure: same input, same output, no I/O.

use crate::types;

/// First character upper-cased, remainder unchanged.
pub fn to_title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// First character lower-cased, remainder unchanged.
pub fn to_lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `createdAt` → `created_at`, `HTTPCode` → `httpcode`.
///
/// An underscore is inserted only where a lower-case letter or digit is
/// followed by an upper-case one, so acronyms stay in one piece.
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for ch in s.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            result.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    result
}

pub const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe",
    "use", "where", "while", "abstract", "become", "box", "do", "final", "gen", "macro", "override",
    "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// Snake-case Rust field identifier, raw-escaped when it collides with a
/// keyword.
pub fn rust_ident(s: &str) -> String {
    let snake = to_snake_case(s);
    if RUST_KEYWORDS.contains(&snake.as_str()) {
        format!("r#{}", snake)
    } else {
        snake
    }
}

/// Path keywords that `r#` cannot escape.
const PATH_KEYWORDS: &[&str] = &["crate", "self", "Self", "super"];

/// `r#` escaping would be rejected for these names.
pub fn is_unescapable(ident: &str) -> bool {
    ident == "_" || PATH_KEYWORDS.contains(&ident)
}

/// Usable as a plain `mod` name: an ASCII identifier that is not a
/// keyword. Generated paths and the entry file's `mod` lines use it
/// unescaped.
pub fn is_module_name(name: &str) -> bool {
    let mut chars = name.chars();
    let ident = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    ident && name != "_" && !RUST_KEYWORDS.contains(&name)
}

/// JSON tag for a field: the explicit tag, or the raw field name when the
/// tag is empty, with the first letter lower-cased.
pub fn json_tag(raw_tag: &str, raw_name: &str) -> String {
    let tag = raw_tag.trim();
    if tag.is_empty() {
        to_lower_first(raw_name)
    } else {
        to_lower_first(tag)
    }
}

/// Naming rules of one target stack.
///
/// Adding a target means adding a dialect; the emission pipeline only sees
/// the strings it produces.
pub trait Dialect: Send + Sync {
    /// Field name as it appears in the target's templates.
    fn field_name(&self, raw: &str) -> String;

    /// Field type in the target's type system.
    fn field_type(&self, raw_ty: &str) -> String;

    fn json_tag(&self, raw_tag: &str, raw_name: &str) -> String {
        json_tag(raw_tag, raw_name)
    }
}

/// Backend layer: title-cased names (column constants, enum variants) and
/// the storage token passed through.
pub struct BackendDialect;

impl Dialect for BackendDialect {
    fn field_name(&self, raw: &str) -> String {
        to_title(raw)
    }

    fn field_type(&self, raw_ty: &str) -> String {
        types::backend_type(raw_ty)
    }
}

/// Web layer: lower-first names, TypeScript types.
pub struct WebDialect;

impl Dialect for WebDialect {
    fn field_name(&self, raw: &str) -> String {
        to_lower_first(raw)
    }

    fn field_type(&self, raw_ty: &str) -> String {
        types::web_type(raw_ty).to_string()
    }
}

/// Mobile layer: lower-first names, nullable Dart types.
pub struct MobileDialect;

impl Dialect for MobileDialect {
    fn field_name(&self, raw: &str) -> String {
        to_lower_first(raw)
    }

    fn field_type(&self, raw_ty: &str) -> String {
        types::mobile_type(raw_ty).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_idempotent() {
        for s in ["order", "Order", "orderItem", "x", "", "éclair", "ßtraße", "_id", "9th"] {
            let once = to_title(s);
            assert_eq!(to_title(&once), once, "{:?}", s);
        }
    }

    #[test]
    fn title_starts_upper_for_alphabetic_input() {
        for s in ["order", "o", "orderItem", "Item", "éclair"] {
            let t = to_title(s);
            assert!(t.chars().next().unwrap().is_uppercase(), "{:?}", s);
        }
        assert_eq!(to_title(""), "");
    }

    #[test]
    fn only_first_letter_changes() {
        assert_eq!(to_title("orderItem"), "OrderItem");
        assert_eq!(to_title("order_item"), "Order_item");
        assert_eq!(to_lower_first("OrderItem"), "orderItem");
        assert_eq!(to_lower_first("ID"), "iD");
        assert_eq!(to_lower_first(""), "");
    }

    #[test]
    fn snake_case_keeps_acronyms_together() {
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("CreatedAt"), "created_at");
        assert_eq!(to_snake_case("ID"), "id");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("total"), "total");
        assert_eq!(to_snake_case("line2Total"), "line2_total");
    }

    #[test]
    fn rust_ident_escapes_keywords() {
        assert_eq!(rust_ident("type"), "r#type");
        assert_eq!(rust_ident("Type"), "r#type");
        assert_eq!(rust_ident("kind"), "kind");
    }

    #[test]
    fn json_tag_defaults_to_raw_name() {
        assert_eq!(json_tag("", "CreatedAt"), "createdAt");
        assert_eq!(json_tag("created_at", "CreatedAt"), "created_at");
        assert_eq!(json_tag("  ", "total"), "total");
    }

    #[test]
    fn dialects_are_deterministic() {
        let dialects: [&dyn Dialect; 3] = [&BackendDialect, &WebDialect, &MobileDialect];
        for d in dialects {
            assert_eq!(d.field_name("createdAt"), d.field_name("createdAt"));
            assert_eq!(d.field_type("int64"), d.field_type("int64"));
        }
        assert_eq!(BackendDialect.field_name("createdAt"), "CreatedAt");
        assert_eq!(WebDialect.field_name("CreatedAt"), "createdAt");
        assert_eq!(MobileDialect.field_type("float64"), "num?");
        assert_eq!(WebDialect.field_type("bool"), "boolean");
        assert_eq!(BackendDialect.field_type("Int"), "int");
    }

    #[test]
    fn module_names() {
        assert!(is_module_name("order"));
        assert!(is_module_name("orderItem"));
        assert!(is_module_name("_draft"));
        for bad in ["type", "self", "Self", "crate", "super", "mod", "_", "", "9lives", "a-b"] {
            assert!(!is_module_name(bad), "{}", bad);
        }
        assert!(is_unescapable("self"));
        assert!(!is_unescapable("type"));
    }
}
