//! Field validation shared by the create/update handlers.

use rust_decimal::Decimal;
use std::collections::HashMap;

pub const MAX_PRICE: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_SLUG_LEN: usize = 120;

/// Accumulates per-field messages so a request reports every problem at once
#[derive(Debug, Default, Clone)]
pub struct ValidationErrors {
    fields: HashMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        // First message per field wins
        self.fields.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|s| s.as_str())
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.fields
    }

    /// Ok when nothing was recorded
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn require_text(&mut self, field: &str, value: &str, max_len: usize) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, "This field is required");
        } else if trimmed.chars().count() > max_len {
            self.add(field, format!("Must be at most {} characters", max_len));
        }
    }

    pub fn optional_text(&mut self, field: &str, value: Option<&str>, max_len: usize) {
        if let Some(v) = value {
            if v.chars().count() > max_len {
                self.add(field, format!("Must be at most {} characters", max_len));
            }
        }
    }

    pub fn price(&mut self, field: &str, value: Decimal) {
        if let Err(msg) = validate_price(value) {
            self.add(field, msg);
        }
    }

    pub fn currency(&mut self, field: &str, value: &str) {
        if !is_valid_currency(value) {
            self.add(field, "Currency must be a 3-letter uppercase ISO code");
        }
    }

    pub fn slug(&mut self, field: &str, value: &str) {
        if !is_valid_slug(value) {
            self.add(field, "Slug may only contain lowercase letters, digits and single hyphens");
        }
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.add(field, format!("Must be one of: {}", allowed.join(", ")));
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fields: Vec<_> = self.fields.iter().collect();
        fields.sort();
        let parts: Vec<String> = fields.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub fn validate_price(value: Decimal) -> Result<(), String> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err("Price must not be negative".to_string());
    }
    if value > MAX_PRICE {
        return Err(format!("Price must not exceed {}", MAX_PRICE));
    }
    if value.normalize().scale() > 2 {
        return Err("Price may have at most 2 decimal places".to_string());
    }
    Ok(())
}

pub fn is_valid_currency(value: &str) -> bool {
    value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase())
}

pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SLUG_LEN
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.contains("--")
        && value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Lowercase, ASCII-only, hyphen separated
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    slug.trim_end_matches('-').to_string()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() > 254 || email.contains(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("The Rust Book: 2nd Edition!"), "the-rust-book-2nd-edition");
        assert_eq!(slugify("  --Hello   World--  "), "hello-world");
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("intro-to-rust"));
        assert!(is_valid_slug("2024-recap"));
        assert!(!is_valid_slug("Intro"));
        assert!(!is_valid_slug("a--b"));
        assert!(!is_valid_slug("-a"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn price_rules() {
        assert!(validate_price(Decimal::from_str("0").unwrap()).is_ok());
        assert!(validate_price(Decimal::from_str("19.99").unwrap()).is_ok());
        assert!(validate_price(Decimal::from_str("19.990").unwrap()).is_ok());
        assert!(validate_price(Decimal::from_str("-1").unwrap()).is_err());
        assert!(validate_price(Decimal::from_str("1.999").unwrap()).is_err());
        assert!(validate_price(Decimal::from_str("100000.01").unwrap()).is_err());
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("reader@example.com"));
        assert!(!is_valid_email("reader@example"));
        assert!(!is_valid_email("reader example@x.com"));
        assert!(!is_valid_email("@example.com"));
        assert_eq!(normalize_email("  Reader@Example.COM "), "reader@example.com");
    }

    #[test]
    fn collects_all_field_errors() {
        let mut errors = ValidationErrors::new();
        errors.require_text("title", "   ", MAX_TITLE_LEN);
        errors.currency("currency", "usd");
        errors.one_of("status", "live", &["draft", "published"]);
        assert_eq!(errors.get("title"), Some("This field is required"));
        assert!(errors.get("currency").is_some());
        assert!(errors.clone().finish().is_err());
        assert_eq!(errors.into_map().len(), 3);
    }
}
