//! Invite Server - invitation token verification and account registration.
//!
//! The server answers one question for clients, "does this invitation token
//! exist?", and creates accounts by consuming a token:
//! - `GET|POST /api/token/verify` reports `{ "valid": bool }`
//! - `POST /api/accounts` creates an account and removes its token
//! - Tokens and accounts persist to a JSON snapshot file

pub mod api;
pub mod config;
pub mod error;
pub mod registry;

pub use config::Config;
pub use error::ApiError;
pub use registry::{AccountRecord, Registry, Store, TokenRecord};
