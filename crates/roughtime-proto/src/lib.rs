//! Roughtime protocol core: wire format, Merkle proofs, and signing primitives.
//!
//! Roughtime is an authenticated coarse time protocol. A server answers a
//! batch of client nonces with one Ed25519-signed response, and each client
//! checks a SHA-512 Merkle inclusion proof to confirm its own nonce was
//! covered. This crate provides the pieces shared by clients and servers:
//!
//! - [`tag::Tag`] — the closed set of protocol field identifiers
//! - [`wire::Message`] — the canonical tag→value map codec
//! - [`builder::MessageBuilder`] — message construction with request padding
//! - [`merkle`] — tweaked leaf/node hashing and inclusion-proof verification
//! - [`crypto`] — Ed25519 signing/verification with domain-separation contexts
//!
//! Everything here is a synchronous, allocation-light transformation over
//! in-memory buffers. Transport, retries, and scheduling live elsewhere.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Protocol tag identifiers and their wire encodings.
pub mod tag;

/// Error types for message decoding and construction.
pub mod error;

/// Canonical tag-value message codec.
pub mod wire;

/// Message construction with minimum-size request padding.
pub mod builder;

/// SHA-512 Merkle tree hashing and inclusion-proof verification.
pub mod merkle;

/// Ed25519 signing and verification with domain-separation contexts.
pub mod crypto;

/// Size (in bytes) of a client nonce.
pub const NONCE_LENGTH: usize = 64;

/// Size (in bytes) of an Ed25519 public key.
pub const PUBKEY_LENGTH: usize = 32;

/// Size (in bytes) of an Ed25519 signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// Size (in bytes) of a timestamp value (MIDP, MINT, MAXT).
pub const TIMESTAMP_LENGTH: usize = 8;

/// Size (in bytes) of the uncertainty radius value (RADI).
pub const RADIUS_LENGTH: usize = 4;

/// Minimum size (in bytes) of a client request, reached via PAD.
pub const MIN_REQUEST_LENGTH: usize = 1024;

/// Minimum size (in bytes) of a private key seed.
pub const MIN_SEED_LENGTH: usize = 32;
