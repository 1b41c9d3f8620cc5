//! Fundamental primitives shared by every QNet node component: content
//! hashing and the post-quantum signature-verification surface the
//! Security Envelope (component G) exposes to the rest of the core.
//!
//! Concrete signature algorithms (lattice-based, hash-based, EC) are
//! deliberately *not* implemented here — only the verification contract.
//! A real deployment plugs in verifiers backed by an external PQC library;
//! this crate only needs the algorithms to be distinguishable and the
//! surface to be polymorphic over them.

pub mod envelope;
pub mod hash;

pub use envelope::{BoundVerifier, SignatureAlgorithm, SignatureVerifier, VerifierRegistry, VerifySurface};
pub use hash::{hash256, Hash256};

pub type Amount = u64;
