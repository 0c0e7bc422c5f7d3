//! # Backend API Client Module
//!
//! HTTP client for the hosted auth and REST API. [`ApiClient`] implements
//! the `lib-auth` provider traits, so the session manager and the auth
//! flows run against it unchanged.
//!
//! ## Module Structure
//!
//! ```text
//! api/
//! ├── mod.rs      - Module exports and documentation
//! ├── client.rs   - ApiClient, persisted provider session, token refresh
//! ├── auth.rs     - /auth/v1 endpoints (IdentityProvider + CredentialsApi)
//! ├── profile.rs  - /rest/v1/users (ProfileStore)
//! └── wire.rs     - Response bodies
//! ```

pub mod auth;
pub mod client;
pub mod profile;
pub mod wire;

pub use client::{ApiClient, SESSION_STORAGE_KEY};
