//! # TradePrem Client - Library Root
//!
//! Command-line client for a TradePrem account. This library crate contains
//! the modules used by the `tradeprem` binary (`main.rs`).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │              client (this crate)                       │
//! │   cli      - clap commands, state rendering            │
//! │   debug    - tracing subscriber + rolling log file     │
//! │   services - ApiClient (reqwest)                       │
//! └────────────────────────────────────────────────────────┘
//!          │ implements provider traits
//!          ▼
//! ┌────────────────────────────────────────────────────────┐
//! │  lib-auth: SessionManager, AuthCache, AuthService      │
//! └────────────────────────────────────────────────────────┘
//!          │ HTTP
//!          ▼
//! ┌─────────────────────────┐
//! │  Hosted auth + REST API │
//! └─────────────────────────┘
//! ```

pub mod cli;
pub mod debug;
pub mod services;
