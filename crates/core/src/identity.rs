//! Canonicalization and one-way hashing of identity fields.
//!
//! Raw email/phone/name values never leave the request scope: they are
//! normalized to a canonical form and digested to lowercase hex SHA-256
//! before storage or outbound use. Values that already match the token
//! shape pass through unchanged, so hashing is idempotent.

use sha2::{Digest, Sha256};

/// Field kind, selects the canonicalization rule applied before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Email,
    Phone,
    FirstName,
    LastName,
    City,
    State,
    Zip,
    Country,
}

/// Stateless hasher configured with the default country calling code
/// assumed for 10-digit phone numbers.
#[derive(Debug, Clone)]
pub struct IdentityHasher {
    default_country_code: String,
}

impl IdentityHasher {
    pub fn new(default_country_code: impl Into<String>) -> Self {
        Self {
            default_country_code: default_country_code.into(),
        }
    }

    /// Hash a raw identity value into its token form.
    ///
    /// Returns `None` for empty input. A value already matching the
    /// 64-char lowercase-hex token shape is passed through (lowercased)
    /// rather than hashed again.
    pub fn token(&self, kind: IdentityKind, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if is_hashed(trimmed) {
            return Some(trimmed.to_ascii_lowercase());
        }
        let canonical = self.canonicalize(kind, trimmed);
        if canonical.is_empty() {
            return None;
        }
        Some(sha256_hex(canonical.as_bytes()))
    }

    /// Combined first+last name hash used for reverse identity lookup.
    /// Computed identically on the index-write and lookup sides.
    pub fn name_combo(&self, first: &str, last: &str) -> Option<String> {
        let first = first.trim().to_lowercase();
        let last = last.trim().to_lowercase();
        if first.is_empty() && last.is_empty() {
            return None;
        }
        Some(sha256_hex(format!("{first} {last}").as_bytes()))
    }

    fn canonicalize(&self, kind: IdentityKind, value: &str) -> String {
        match kind {
            IdentityKind::Email
            | IdentityKind::FirstName
            | IdentityKind::LastName
            | IdentityKind::City
            | IdentityKind::State
            | IdentityKind::Country => value.to_lowercase(),
            IdentityKind::Zip => value
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase(),
            IdentityKind::Phone => self.canonicalize_phone(value),
        }
    }

    /// Normalize a phone number to E.164 form.
    ///
    /// Keeps digits only; a 10-digit number without `+` is assumed local
    /// and gets the default country calling code, an 11-digit number
    /// already starting with that country's trunk digit only gains `+`.
    fn canonicalize_phone(&self, value: &str) -> String {
        let has_plus = value.trim_start().starts_with('+');
        let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return String::new();
        }
        if has_plus {
            return format!("+{digits}");
        }
        if digits.len() == 10 {
            format!("+{}{digits}", self.default_country_code)
        } else {
            format!("+{digits}")
        }
    }
}

/// True if the value already has the fixed-length hex shape of a token.
pub fn is_hashed(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fixed-time string comparison for shared-secret checks.
///
/// Both sides are digested first so the comparison runs over equal-length
/// buffers with no early exit, regardless of input lengths.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
