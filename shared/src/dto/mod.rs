//! # Data Transfer Objects (DTOs)
//!
//! Data structures exchanged with the identity provider and the profile
//! store, and persisted in the client's durable auth cache.
//!
//! ## Module Organization
//!
//! - [`auth`] - Identity, credentials, provider sessions, session-change events
//! - [`profile`] - Account profile row (display fields, KYC status, balance snapshot)
//!
//! ## Serialization Format
//!
//! - **Field naming**: snake_case (default serde behavior)
//! - **Optional fields**: Omitted when `None` using `#[serde(skip_serializing_if = "Option::is_none")]`
//! - **Enums**: Serialize to snake_case strings
//!
//! ## Example JSON
//!
//! ```text
//! POST /auth/v1/token?grant_type=password
//! Content-Type: application/json
//!
//! { "email": "ana@example.com", "password": "MyPassword123!" }
//! ```
//!
//! ```text
//! HTTP/1.1 200 OK
//!
//! {
//!   "access_token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...",
//!   "refresh_token": "v1.Mr5...",
//!   "expires_at": 1760612345,
//!   "user": { "id": "7c1f9a52-...", "email": "ana@example.com" }
//! }
//! ```

pub mod auth;
pub mod profile;

pub use auth::*;
pub use profile::*;
