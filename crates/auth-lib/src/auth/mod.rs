// ============================
// crates/auth-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod access;
pub mod lockout;
pub mod password;
pub mod refresh;
pub mod strength;
pub mod token_generator;
mod service;
mod service_impl;

pub use access::{AccessClaims, AccessTokenIssuer, TOKEN_TYPE_ACCESS};
pub use lockout::{LockStatus, LockoutTracker};
pub use password::{CredentialHasher, SCHEME_ARGON2ID};
pub use refresh::{MemoryRefreshTokenStore, RefreshTokenService, RefreshTokenStore};
pub use service::AuthService;
pub use service_impl::DefaultAuth;
pub use strength::{validate_strength, StrengthReport};
pub use token_generator::generate_opaque_token;
