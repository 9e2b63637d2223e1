// ============================
// crates/auth-lib/src/auth/strength.rs
// ============================
//! Password strength validation.
//!
//! Validation is a dual gate: a password must have zero rule
//! violations AND reach a minimum cumulative score. The score floor
//! catches passwords that pass every individual rule but are still
//! weak in aggregate (short with low character diversity).

use crate::config::StrengthPolicy;

/// Substrings that immediately disqualify a password
const COMMON_PASSWORDS: &[&str] = &[
    "password", "123456", "qwerty", "letmein", "welcome", "admin", "iloveyou", "abc123",
];

/// Outcome of strength validation
#[derive(Debug, Clone)]
pub struct StrengthReport {
    /// True iff there are no errors and the score reaches the floor
    pub is_valid: bool,
    /// Human-readable rule violations
    pub errors: Vec<String>,
    /// Cumulative strength score (length tiers + character classes)
    pub score: u32,
}

/// Validate a password against the policy. Deterministic; no I/O.
pub fn validate_strength(password: &str, policy: &StrengthPolicy) -> StrengthReport {
    let mut errors = Vec::new();

    let length = password.chars().count();
    if length < policy.min_length {
        errors.push(format!(
            "must be at least {} characters long",
            policy.min_length
        ));
    }
    if length > policy.max_length {
        errors.push(format!("must not exceed {} characters", policy.max_length));
    }

    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_alphanumeric());

    if !has_lower {
        errors.push("must contain a lowercase letter".to_string());
    }
    if !has_upper {
        errors.push("must contain an uppercase letter".to_string());
    }
    if !has_digit {
        errors.push("must contain a digit".to_string());
    }

    if has_repeated_run(password) {
        errors.push("must not repeat the same character 3 or more times in a row".to_string());
    }
    if has_repeating_pattern(password) {
        errors.push("must not contain short repeating patterns".to_string());
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.iter().any(|weak| lowered.contains(weak)) {
        errors.push("must not contain a common password".to_string());
    }

    let mut score = 0u32;
    if length >= 8 {
        score += 1;
    }
    if length >= 12 {
        score += 1;
    }
    if length >= 16 {
        score += 1;
    }
    score += u32::from(has_lower);
    score += u32::from(has_upper);
    score += u32::from(has_digit);
    score += u32::from(has_symbol);

    StrengthReport {
        is_valid: errors.is_empty() && score >= policy.score_floor,
        errors,
        score,
    }
}

/// Three or more identical characters back-to-back ("aaa")
fn has_repeated_run(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

/// A unit of 2-4 characters repeated immediately ("abcabc", "1212").
/// The regex crate has no backreferences, so this is a manual scan.
fn has_repeating_pattern(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    for unit in 2..=4usize {
        if chars.len() < unit * 2 {
            break;
        }
        for start in 0..=(chars.len() - unit * 2) {
            if chars[start..start + unit] == chars[start + unit..start + unit * 2] {
                return true;
            }
        }
    }
    false
}
