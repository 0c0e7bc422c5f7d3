//! # Shared Utility Functions
//!
//! Display helpers used by the client when rendering who is logged in.
//!
//! A missing [`Profile`] is a normal state (it may not be materialized yet),
//! so callers fall back to the identity fields instead of treating it as an error.
//!
//! ## Usage
//!
//! ```rust
//! use shared::utils::truncate_id;
//!
//! let id = "7c1f9a52-5f0e-4d0c-9f65-0d3b1fb6c2aa";
//! assert_eq!(truncate_id(id, 4, 4), "7c1f...c2aa");
//! ```

use crate::dto::{Profile, User};

/// Shorten an opaque id by showing the first `prefix_len` and last `suffix_len` characters.
///
/// If the id is shorter than `prefix_len + suffix_len`, it is returned as-is.
pub fn truncate_id(id: &str, prefix_len: usize, suffix_len: usize) -> String {
    let chars: Vec<char> = id.chars().collect();
    let len = chars.len();

    if len <= prefix_len + suffix_len {
        return id.to_string();
    }

    let prefix: String = chars[..prefix_len].iter().collect();
    let suffix: String = chars[len - suffix_len..].iter().collect();

    format!("{}...{}", prefix, suffix)
}

/// Best available display name: profile name, then email, then phone, then a shortened id.
pub fn display_name(user: &User, profile: Option<&Profile>) -> String {
    profile
        .and_then(|p| p.name.as_deref())
        .filter(|name| !name.trim().is_empty())
        .or(user.email.as_deref())
        .or(user.phone.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| truncate_id(&user.id, 4, 4))
}
