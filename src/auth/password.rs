use std::collections::HashMap;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::error;

pub const MIN_LENGTH: usize = 8;

/// Ratio at or above which a password counts as too similar to a user attribute.
const MAX_SIMILARITY: f64 = 0.7;

/// A small sample of frequently leaked passwords, compared case-insensitively.
/// Not a full breached-password dictionary.
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "12345678", "123456789", "1234567890", "qwerty", "qwerty123", "qwertyuiop",
    "1q2w3e4r", "1qaz2wsx", "password", "password1", "password123", "passw0rd", "iloveyou",
    "sunshine", "princess", "football", "baseball", "welcome", "welcome1", "letmein",
    "letmein1", "trustno1", "superman", "starwars", "whatever", "dragon", "monkey",
    "master", "shadow", "michael", "abc123", "abc12345", "admin", "admin123", "zaq12wsx",
    "11111111", "00000000", "87654321", "asdfghjkl", "changeme",
];

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Runs the strength rules and returns every message that applies.
///
/// `attributes` pairs a human-readable attribute name ("username",
/// "email address", ...) with the value the password is compared against.
pub fn strength_errors(password: &str, attributes: &[(&str, &str)]) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(name) = too_similar_to(password, attributes) {
        errors.push(format!("The password is too similar to the {name}."));
    }
    if password.chars().count() < MIN_LENGTH {
        errors.push(format!(
            "This password is too short. It must contain at least {MIN_LENGTH} characters."
        ));
    }
    let lowered = password.trim().to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        errors.push("This password is too common.".to_string());
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }
    errors
}

fn too_similar_to<'a>(password: &str, attributes: &[(&'a str, &str)]) -> Option<&'a str> {
    lazy_static! {
        static ref NON_WORD: Regex = Regex::new(r"\W+").unwrap();
    }
    let password = password.to_lowercase();
    let password_len = password.chars().count();
    // Parts under a tenth of the password's length can't reach the threshold.
    let length_bound = MAX_SIMILARITY / 2.0 * password_len as f64;
    for (name, value) in attributes {
        let value = value.to_lowercase();
        if value.is_empty() {
            continue;
        }
        let whole = std::iter::once(value.as_str());
        let parts = NON_WORD.split(&value).filter(|p| !p.is_empty());
        if whole.chain(parts).any(|part| {
            let part_len = part.chars().count();
            if password_len >= 10 * part_len && (part_len as f64) < length_bound {
                return false;
            }
            similarity(&password, part) >= MAX_SIMILARITY
        }) {
            return Some(name);
        }
    }
    None
}

/// `2 * M / (len(a) + len(b))` where `M` is the number of characters the two
/// strings share, counted as multisets. Order is ignored, so this is an upper
/// bound on the sequence-matching ratio.
fn similarity(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let mut avail: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *avail.entry(c).or_default() += 1;
    }
    let mut matches = 0usize;
    for c in a.chars() {
        if let Some(n) = avail.get_mut(&c) {
            if *n > 0 {
                *n -= 1;
                matches += 1;
            }
        }
    }
    2.0 * matches as f64 / total as f64
}
