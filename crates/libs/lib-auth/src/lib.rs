//! # Authentication Library
//!
//! Client-side session core: durable auth cache, provider seams, the
//! reactive session manager, and the sign-in/sign-up flows.

pub mod cache;
pub mod provider;
pub mod service;
pub mod session;
pub mod store;

#[cfg(test)]
mod mock;

// Re-export commonly used types
pub use cache::{AuthCache, StoredAuth};
pub use provider::{CredentialsApi, IdentityProvider, ProfileStore};
pub use service::AuthService;
pub use session::{AuthState, SessionManager, SessionOptions, SessionPhase};
pub use store::{FileStore, KeyValueStore, MemoryStore};
