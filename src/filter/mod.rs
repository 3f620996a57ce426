pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod error;

pub use types::*;
pub use filter::Filter;
pub use error::FilterError;

/// Tables carrying a `deleted_at` column
pub const SOFT_DELETE_TABLES: &[&str] = &["users", "books", "courses", "events", "blog_posts"];

/// Plain SQL identifier: starts with a letter or underscore, then [A-Za-z0-9_]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
