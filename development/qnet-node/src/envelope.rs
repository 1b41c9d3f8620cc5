//! Security Envelope (component G, spec.md §4.G): the gatekeeper every
//! externally-originated event passes through before it can touch any
//! core state. Wraps `qnet_core::envelope::VerifierRegistry` (signature
//! verification) with rate limiting, replay/nonce tracking, session
//! tokens, and payload/IP policy — all loaded from [`EnvelopeConfig`]
//! rather than hardcoded, per SPEC_FULL §4.G.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use qnet_core::envelope::{SignatureAlgorithm, VerifierRegistry, VerifySurface};
use thiserror::Error;

use crate::config::EnvelopeConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("rate limit exceeded for {origin}")]
    QuotaExceeded { origin: String },
    #[error("origin {0} is blacklisted")]
    Blacklisted(String),
    #[error("nonce already consumed or unknown")]
    ReplayDetected,
    #[error("payload exceeds cap of {cap} bytes")]
    PayloadTooLarge { cap: usize },
    #[error("TLS required but connection is plaintext")]
    TlsRequired,
    #[error("origin {0} is not on the allow list")]
    NotAllowed(String),
    #[error("origin {0} is on the deny list")]
    Denied(String),
    #[error("signature verification failed: {0}")]
    InvalidSignature(String),
}

/// Per-origin token bucket: `capacity` tokens, refilled at `rate` per
/// second, consumed one per request.
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, rate: u32) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            rate: rate as f64,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct BlacklistEntry {
    offenses: u32,
    until: Instant,
}

/// Gatekeeper state. Construction happens once at the composition root;
/// every ingress RPC passes through [`SecurityEnvelope::admit`] before the
/// core ever sees it.
pub struct SecurityEnvelope {
    config: EnvelopeConfig,
    verifiers: VerifierRegistry,
    algorithm: SignatureAlgorithm,
    buckets: DashMap<String, Mutex<TokenBucket>>,
    blacklist: DashMap<String, BlacklistEntry>,
    consumed_nonces: Mutex<HashMap<String, Instant>>,
    sessions: Mutex<HashMap<String, Instant>>,
}

impl SecurityEnvelope {
    pub fn new(config: EnvelopeConfig, verifiers: VerifierRegistry, algorithm: SignatureAlgorithm) -> Self {
        Self {
            config,
            verifiers,
            algorithm,
            buckets: DashMap::new(),
            blacklist: DashMap::new(),
            consumed_nonces: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Full gate a transport-level request passes through before any core
    /// mutation: IP policy, TLS flag, blacklist, rate limit, payload cap.
    /// Failure never mutates any core state (spec.md §4.G).
    pub fn admit(&self, origin: &str, payload_len: usize, tls: bool) -> Result<(), EnvelopeError> {
        if self.config.ip_deny_list.iter().any(|ip| ip == origin) {
            return Err(EnvelopeError::Denied(origin.to_string()));
        }
        if !self.config.ip_allow_list.is_empty() && !self.config.ip_allow_list.iter().any(|ip| ip == origin) {
            return Err(EnvelopeError::NotAllowed(origin.to_string()));
        }
        if self.config.tls_required && !tls {
            return Err(EnvelopeError::TlsRequired);
        }
        if payload_len > self.config.max_payload_bytes {
            return Err(EnvelopeError::PayloadTooLarge { cap: self.config.max_payload_bytes });
        }
        if let Some(entry) = self.blacklist.get(origin) {
            if Instant::now() < entry.until {
                return Err(EnvelopeError::Blacklisted(origin.to_string()));
            }
        }
        if !self.consume_token(origin) {
            self.record_offense(origin);
            return Err(EnvelopeError::QuotaExceeded { origin: origin.to_string() });
        }
        Ok(())
    }

    fn consume_token(&self, origin: &str) -> bool {
        let bucket = self.buckets.entry(origin.to_string()).or_insert_with(|| {
            Mutex::new(TokenBucket::new(self.config.rate_limit_burst, self.config.rate_limit_per_second))
        });
        bucket.lock().try_consume()
    }

    /// Exponential backoff on repeat offenders, capped at
    /// `blacklist_backoff_cap_seconds`.
    fn record_offense(&self, origin: &str) {
        let cap = Duration::from_secs(self.config.blacklist_backoff_cap_seconds);
        let mut entry = self.blacklist.entry(origin.to_string()).or_insert_with(|| BlacklistEntry {
            offenses: 0,
            until: Instant::now(),
        });
        entry.offenses += 1;
        let backoff = Duration::from_secs(2u64.saturating_pow(entry.offenses.min(20))).min(cap);
        entry.until = Instant::now() + backoff;
    }

    /// Mint a fresh 5-minute, single-use nonce.
    pub fn issue_nonce(&self, id: &str) {
        self.consumed_nonces.lock().remove(id);
    }

    /// Consume a nonce exactly once. A nonce already consumed, or one
    /// never issued and older than the TTL window, is replay.
    pub fn consume_nonce(&self, id: &str) -> Result<(), EnvelopeError> {
        let mut consumed = self.consumed_nonces.lock();
        if let Some(used_at) = consumed.get(id) {
            if used_at.elapsed() < Duration::from_secs(self.config.nonce_ttl_seconds) {
                return Err(EnvelopeError::ReplayDetected);
            }
        }
        consumed.insert(id.to_string(), Instant::now());
        Ok(())
    }

    /// Issue a CSRF/session token with the configured TTL.
    pub fn issue_session(&self, token: &str) {
        self.sessions.lock().insert(token.to_string(), Instant::now());
    }

    pub fn session_valid(&self, token: &str) -> bool {
        match self.sessions.lock().get(token) {
            Some(issued_at) => issued_at.elapsed() < Duration::from_secs(self.config.session_ttl_seconds),
            None => false,
        }
    }

    /// The envelope's single polymorphic verification surface
    /// (spec.md §4.G). Delegates the math entirely to the registered
    /// verifiers; never reimplements a signature scheme here.
    pub fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), EnvelopeError> {
        VerifySurface::verify(self, message, signature, public_key)
            .map_err(|e| EnvelopeError::InvalidSignature(e.to_string()))
    }
}

impl VerifySurface for SecurityEnvelope {
    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<(), qnet_core::envelope::VerifyError> {
        self.verifiers.verify(message, signature, public_key, self.algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnet_core::envelope::SignatureVerifier;

    struct AlwaysValid;
    impl SignatureVerifier for AlwaysValid {
        fn algorithm(&self) -> SignatureAlgorithm {
            SignatureAlgorithm::LatticeL3
        }
        fn verify(&self, _message: &[u8], signature: &[u8], _public_key: &[u8]) -> bool {
            !signature.is_empty()
        }
    }

    fn envelope(config: EnvelopeConfig) -> SecurityEnvelope {
        let mut verifiers = VerifierRegistry::new();
        verifiers.register(Box::new(AlwaysValid));
        SecurityEnvelope::new(config, verifiers, SignatureAlgorithm::LatticeL3)
    }

    #[test]
    fn deny_list_rejects_before_rate_limit() {
        let mut config = EnvelopeConfig::default();
        config.ip_deny_list = vec!["10.0.0.1".to_string()];
        let env = envelope(config);
        assert_eq!(env.admit("10.0.0.1", 10, true), Err(EnvelopeError::Denied("10.0.0.1".to_string())));
    }

    #[test]
    fn rate_limit_trips_after_burst_exhausted() {
        let mut config = EnvelopeConfig::default();
        config.rate_limit_burst = 1;
        config.rate_limit_per_second = 0;
        let env = envelope(config);
        env.admit("peer", 10, true).unwrap();
        let err = env.admit("peer", 10, true).unwrap_err();
        assert!(matches!(err, EnvelopeError::QuotaExceeded { .. }));
    }

    #[test]
    fn nonce_cannot_be_replayed() {
        let env = envelope(EnvelopeConfig::default());
        env.consume_nonce("n1").unwrap();
        assert_eq!(env.consume_nonce("n1"), Err(EnvelopeError::ReplayDetected));
    }

    #[test]
    fn payload_cap_is_enforced() {
        let mut config = EnvelopeConfig::default();
        config.max_payload_bytes = 10;
        let env = envelope(config);
        assert_eq!(env.admit("peer", 11, true), Err(EnvelopeError::PayloadTooLarge { cap: 10 }));
    }
}
