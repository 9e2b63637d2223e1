// ============================
// crates/auth-lib/src/metrics.rs
// ============================
//! Central place for metric keys.
pub const LOGIN_SUCCESS: &str = "auth.login.success";
pub const LOGIN_FAILURE: &str = "auth.login.failure";
pub const ACCOUNT_LOCKED: &str = "auth.account.locked";
pub const USER_REGISTERED: &str = "auth.user.registered";
pub const TOKEN_ISSUED: &str = "auth.token.issued";
pub const TOKEN_ROTATED: &str = "auth.token.rotated";
pub const TOKEN_REVOKED: &str = "auth.token.revoked";
pub const RATE_LIMITED: &str = "auth.rate_limited";
