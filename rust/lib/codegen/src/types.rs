//! Host storage-layer type tokens and their per-target mappings.
//!
//! A field's raw `ty` is one of the tokens in [`HOST_TYPE_TOKENS`]. Each
//! token resolves to a [`HostType`], and each target maps every
//! `HostType` to exactly one type. Unknown tokens fall back per target,
//! never to an empty string.

/// Every token the table recognizes (first letter is case-insensitive).
pub const HOST_TYPE_TOKENS: &[&str] = &[
    "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64",
    "float32", "float64", "string", "bool", "time.Time", "time", "date", "[]byte", "bytes",
];

pub const WEB_UNKNOWN: &str = "unknown";
pub const MOBILE_UNKNOWN: &str = "Object?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostType {
    Int { bits: u8, signed: bool },
    Float { bits: u8 },
    String,
    Bool,
    Time,
    Bytes,
}

impl HostType {
    /// Resolve a raw token. An empty token is a string.
    pub fn parse(token: &str) -> Option<HostType> {
        let token = crate::naming::to_lower_first(token.trim());
        let ty = match token.as_str() {
            "" | "string" => HostType::String,
            "int" | "int64" => HostType::Int { bits: 64, signed: true },
            "int8" => HostType::Int { bits: 8, signed: true },
            "int16" => HostType::Int { bits: 16, signed: true },
            "int32" => HostType::Int { bits: 32, signed: true },
            "uint" | "uint64" => HostType::Int { bits: 64, signed: false },
            "uint8" => HostType::Int { bits: 8, signed: false },
            "uint16" => HostType::Int { bits: 16, signed: false },
            "uint32" => HostType::Int { bits: 32, signed: false },
            "float32" => HostType::Float { bits: 32 },
            "float64" => HostType::Float { bits: 64 },
            "bool" => HostType::Bool,
            "time.Time" | "time" | "date" => HostType::Time,
            "[]byte" | "bytes" => HostType::Bytes,
            _ => return None,
        };
        Some(ty)
    }

    pub fn rust(&self) -> String {
        match self {
            HostType::Int { bits, signed } => {
                format!("{}{}", if *signed { 'i' } else { 'u' }, bits)
            }
            HostType::Float { bits } => format!("f{}", bits),
            HostType::String => "String".to_string(),
            HostType::Bool => "bool".to_string(),
            HostType::Time => "chrono::DateTime<chrono::Utc>".to_string(),
            HostType::Bytes => "Vec<u8>".to_string(),
        }
    }

    pub fn web(&self) -> &'static str {
        match self {
            HostType::Int { .. } | HostType::Float { .. } => "number",
            HostType::Bool => "boolean",
            HostType::Time | HostType::String | HostType::Bytes => "string",
        }
    }

    pub fn mobile(&self) -> &'static str {
        match self {
            HostType::Int { .. } | HostType::Float { .. } => "num?",
            HostType::Bool => "bool?",
            HostType::Time => "DateTime?",
            HostType::String => "String?",
            HostType::Bytes => "List<int>?",
        }
    }

    pub fn is_time(&self) -> bool {
        matches!(self, HostType::Time)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, HostType::Int { .. } | HostType::Float { .. })
    }
}

/// Backend storage-layer token: the token itself, first letter lower-cased.
pub fn backend_type(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        "string".to_string()
    } else {
        crate::naming::to_lower_first(raw)
    }
}

/// Rust type for a backend struct field. Unknown tokens are assumed to be
/// user types and pass through verbatim.
pub fn rust_type(raw: &str) -> String {
    match HostType::parse(raw) {
        Some(ty) => ty.rust(),
        None => raw.trim().to_string(),
    }
}

pub fn web_type(raw: &str) -> &'static str {
    HostType::parse(raw).map(|t| t.web()).unwrap_or(WEB_UNKNOWN)
}

pub fn mobile_type(raw: &str) -> &'static str {
    HostType::parse(raw).map(|t| t.mobile()).unwrap_or(MOBILE_UNKNOWN)
}
