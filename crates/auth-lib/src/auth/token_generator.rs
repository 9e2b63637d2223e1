// ============================
// crates/auth-lib/src/auth/token_generator.rs
// ============================
//! Opaque token generation.
//!
//! Refresh tokens carry no decodable structure; their only defence is
//! entropy. Tokens are drawn from the OS CSPRNG and encoded as
//! URL-safe base64 without padding.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Token size in bytes (32 bytes = 256 bits of entropy)
const TOKEN_BYTES: usize = 32;

/// Generate an opaque token with 256 bits of entropy
pub fn generate_opaque_token() -> String {
    generate_opaque_token_with_size(TOKEN_BYTES)
}

/// Generate an opaque token with an explicit entropy size in bytes
pub fn generate_opaque_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}
