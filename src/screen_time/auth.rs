use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::time::{Duration, Instant};

use crate::screen_time::profile::Profile;

/// Profile credential (PIN) hashing and verification
pub struct CredentialAuth;

impl CredentialAuth {
    /// Hash a PIN using Argon2id
    pub fn hash_credential(pin: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = Argon2::default()
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash credential: {}", e))?
            .to_string();

        Ok(hash)
    }

    /// Verify a PIN against a stored hash
    pub fn verify_credential(pin: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| anyhow::anyhow!("Failed to parse credential hash: {}", e))?;

        Ok(Argon2::default()
            .verify_password(pin.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Check whether `pin` unlocks a switch to `profile`.
    /// Profiles without a credential (restricted only) switch freely.
    pub fn authorize_switch(profile: &Profile, pin: Option<&str>) -> Result<bool> {
        match profile.credential.as_deref() {
            Some(hash) if !hash.is_empty() => match pin {
                Some(pin) => Self::verify_credential(pin, hash),
                None => Ok(false),
            },
            _ => Ok(true),
        }
    }
}

/// Rate limiter for PIN attempts
pub struct RateLimiter {
    attempts: Vec<Instant>,
    max_attempts: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window_seconds: u64) -> Self {
        Self {
            attempts: Vec::new(),
            max_attempts,
            window: Duration::from_secs(window_seconds),
        }
    }

    /// Record an attempt, returning false when the window is exhausted
    pub fn is_allowed(&mut self) -> bool {
        let now = Instant::now();
        self.attempts
            .retain(|&attempt| now.duration_since(attempt) < self.window);

        if self.attempts.len() < self.max_attempts {
            self.attempts.push(now);
            true
        } else {
            false
        }
    }

    /// Time until the next attempt is allowed
    pub fn time_until_allowed(&self) -> Option<Duration> {
        if self.attempts.len() < self.max_attempts {
            return None;
        }

        let elapsed = self.attempts.first()?.elapsed();
        self.window.checked_sub(elapsed)
    }

    pub fn reset(&mut self) {
        self.attempts.clear();
    }
}
