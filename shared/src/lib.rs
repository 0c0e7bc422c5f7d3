//! # Shared Data Transfer Objects Library
//!
//! This library defines the contract between the client, its durable auth
//! cache and the remote backend-as-a-service (identity provider + profile table).
//! All DTOs use JSON serialization via `serde`.
//!
//! ## Structure
//!
//! - **[`dto`]**: Data Transfer Objects
//!   - **[`dto::auth`]**: identity, credentials, provider sessions and session-change events
//!   - **[`dto::profile`]**: the denormalized account profile row
//! - **[`utils`]**: Shared display helpers
//!   - **[`utils::display_name`]**: Best available display name for a user
//!   - **[`utils::truncate_id`]**: Shorten opaque ids for display
//!
//! ## Wire Format
//!
//! - Field names use **snake_case** in Rust and in JSON
//! - Optional fields are omitted from JSON when `None`
//! - Enums serialize to **snake_case** strings
//!
//! ## Usage
//!
//! ```rust
//! use shared::dto::auth::User;
//! use shared::utils::display_name;
//!
//! let user = User::new("7c1f9a52-5f0e-4d0c-9f65-0d3b1fb6c2aa").with_email("ana@example.com");
//! assert_eq!(display_name(&user, None), "ana@example.com");
//! ```

pub mod dto;
pub mod utils;

// Re-export commonly used types for convenience
pub use dto::*;
pub use utils::*;
