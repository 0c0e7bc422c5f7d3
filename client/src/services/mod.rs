//! # Services Module
//!
//! External service integrations.
//!
//! ```text
//! services/
//! └── api/   - Backend HTTP client (identity, credentials, profiles)
//! ```

pub mod api;
