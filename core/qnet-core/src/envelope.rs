//! Polymorphic signature-verification surface for the Security Envelope
//! (component G, spec.md §4.G): `verify(message, signature, public_key,
//! algorithm)` over the supported post-quantum algorithm set.
//!
//! This crate defines the contract, not the math. A production deployment
//! registers a [`SignatureVerifier`] per [`SignatureAlgorithm`] backed by a
//! real PQC library; nothing in this workspace implements lattice/hash-based
//! signature schemes itself (crypto primitive implementations are out of
//! scope, per spec.md §1).

use std::collections::HashMap;
use std::fmt;

/// The algorithm set the envelope's `verify` surface is polymorphic over
/// (spec.md Glossary: "Supported signature algorithms"). Concrete parameter
/// sets per level are a deployment-time choice, not fixed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// Lattice-based signature scheme, security level 2 (fastest, smallest).
    LatticeL2,
    /// Lattice-based signature scheme, security level 3.
    LatticeL3,
    /// Lattice-based signature scheme, security level 5 (strongest).
    LatticeL5,
    /// Hash-based signature scheme (stateless, large signatures).
    HashBased,
    /// Classical elliptic-curve signature scheme, kept for interop /
    /// transition periods; the hardening-audit-mode flag can forbid it.
    EllipticCurve,
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignatureAlgorithm::LatticeL2 => "lattice-l2",
            SignatureAlgorithm::LatticeL3 => "lattice-l3",
            SignatureAlgorithm::LatticeL5 => "lattice-l5",
            SignatureAlgorithm::HashBased => "hash-based",
            SignatureAlgorithm::EllipticCurve => "elliptic-curve",
        };
        write!(f, "{name}")
    }
}

impl SignatureAlgorithm {
    /// Whether this algorithm is considered post-quantum safe. The
    /// hardening-audit-mode flag (spec.md §4.G) forbids falling back to
    /// algorithms where this is `false`.
    pub fn is_post_quantum(&self) -> bool {
        !matches!(self, SignatureAlgorithm::EllipticCurve)
    }
}

/// Error surfaced by a signature verification attempt.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("no verifier registered for algorithm {0}")]
    AlgorithmUnavailable(String),
    #[error("signature does not verify")]
    InvalidSignature,
    #[error("algorithm {0} forbidden under hardening-audit mode")]
    ForbiddenByAuditMode(String),
    #[error("malformed key or signature encoding: {0}")]
    MalformedInput(String),
}

/// A pluggable verifier for one [`SignatureAlgorithm`]. Implementations are
/// supplied by the host process (backed by whatever PQC library it links);
/// this crate never implements one itself.
pub trait SignatureVerifier: Send + Sync {
    fn algorithm(&self) -> SignatureAlgorithm;
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

/// Registry of verifiers keyed by algorithm — the envelope's single
/// `verify(message, signature, public_key, algorithm)` entry point,
/// polymorphic over whichever algorithms are registered.
#[derive(Default)]
pub struct VerifierRegistry {
    verifiers: HashMap<SignatureAlgorithm, Box<dyn SignatureVerifier>>,
    /// When set, [`VerifierRegistry::verify`] rejects any algorithm for
    /// which [`SignatureAlgorithm::is_post_quantum`] is `false`.
    hardening_audit_mode: bool,
}

impl VerifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hardening_audit_mode(mut self, enabled: bool) -> Self {
        self.hardening_audit_mode = enabled;
        self
    }

    pub fn register(&mut self, verifier: Box<dyn SignatureVerifier>) {
        self.verifiers.insert(verifier.algorithm(), verifier);
    }

    /// Verify `signature` over `message` under `public_key`, for the given
    /// `algorithm`. This is the envelope's single polymorphic surface named
    /// in spec.md §4.G.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> Result<(), VerifyError> {
        if self.hardening_audit_mode && !algorithm.is_post_quantum() {
            return Err(VerifyError::ForbiddenByAuditMode(algorithm.to_string()));
        }
        let verifier = self
            .verifiers
            .get(&algorithm)
            .ok_or_else(|| VerifyError::AlgorithmUnavailable(algorithm.to_string()))?;
        if verifier.verify(message, signature, public_key) {
            Ok(())
        } else {
            Err(VerifyError::InvalidSignature)
        }
    }
}

/// A verification surface bound to one algorithm. Components downstream of
/// the Security Envelope (D, and anything else that needs to check a
/// signature) depend on this trait rather than holding their own
/// [`VerifierRegistry`], so every signature in the system is checked through
/// whichever single instance the composition root wires as the envelope
/// (spec.md §4.D, §4.G).
pub trait VerifySurface: Send + Sync {
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), VerifyError>;
}

/// A [`VerifierRegistry`] paired with the one algorithm a caller verifies
/// against. Lets standalone callers (tests, or a minimal deployment with no
/// envelope) satisfy [`VerifySurface`] without standing up a full gatekeeper.
pub struct BoundVerifier {
    registry: VerifierRegistry,
    algorithm: SignatureAlgorithm,
}

impl BoundVerifier {
    pub fn new(registry: VerifierRegistry, algorithm: SignatureAlgorithm) -> Self {
        Self { registry, algorithm }
    }
}

impl VerifySurface for BoundVerifier {
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), VerifyError> {
        self.registry.verify(message, signature, public_key, self.algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysValid(SignatureAlgorithm);
    impl SignatureVerifier for AlwaysValid {
        fn algorithm(&self) -> SignatureAlgorithm {
            self.0
        }
        fn verify(&self, _message: &[u8], signature: &[u8], _public_key: &[u8]) -> bool {
            !signature.is_empty()
        }
    }

    #[test]
    fn missing_algorithm_is_reported() {
        let registry = VerifierRegistry::new();
        let err = registry
            .verify(b"m", b"s", b"k", SignatureAlgorithm::LatticeL3)
            .unwrap_err();
        assert_eq!(
            err,
            VerifyError::AlgorithmUnavailable("lattice-l3".to_string())
        );
    }

    #[test]
    fn registered_verifier_is_used() {
        let mut registry = VerifierRegistry::new();
        registry.register(Box::new(AlwaysValid(SignatureAlgorithm::LatticeL3)));
        assert!(registry
            .verify(b"m", b"s", b"k", SignatureAlgorithm::LatticeL3)
            .is_ok());
        assert_eq!(
            registry.verify(b"m", b"", b"k", SignatureAlgorithm::LatticeL3),
            Err(VerifyError::InvalidSignature)
        );
    }

    #[test]
    fn hardening_audit_mode_forbids_ec_fallback() {
        let mut registry = VerifierRegistry::new().with_hardening_audit_mode(true);
        registry.register(Box::new(AlwaysValid(SignatureAlgorithm::EllipticCurve)));
        let err = registry
            .verify(b"m", b"s", b"k", SignatureAlgorithm::EllipticCurve)
            .unwrap_err();
        assert_eq!(
            err,
            VerifyError::ForbiddenByAuditMode("elliptic-curve".to_string())
        );
    }
}
