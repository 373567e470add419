use chrono::{DateTime, Duration, Utc};

use crate::error::RequestError;

/// How long a token handed out by the authorization endpoint stays usable.
pub const TOKEN_LIFETIME_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    issued_at: DateTime<Utc>,
}

/// The bearer token of one pipeline and the moment it was issued.
#[derive(Debug, Default)]
pub struct TokenCache {
    cached: Option<CachedToken>,
}

impl TokenCache {
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.cached.as_ref().is_some_and(|cached| {
            !cached.token.is_empty()
                && cached.token != RequestError::SENTINEL
                && now - cached.issued_at < Duration::minutes(TOKEN_LIFETIME_MINUTES)
        })
    }

    pub fn store(&mut self, token: String, now: DateTime<Utc>) {
        self.cached = Some(CachedToken {
            token,
            issued_at: now,
        });
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.cached.as_ref().map(|cached| cached.token.as_str())
    }
}
