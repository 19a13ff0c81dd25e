//! Ed25519 signing and verification with domain-separation contexts.
//!
//! Every Roughtime signature covers a fixed ASCII context string followed by
//! the payload. The delegation certificate and the signed response use
//! different contexts, so a signature valid in one role can never be replayed
//! in the other.
//!
//! [`Signer`] and [`Verifier`] are streaming: feed bytes with `update`, then
//! `sign`/`verify`. Both reset their accumulated input after each operation,
//! so an instance is reusable but must be owned by one call chain at a time.

use core::fmt;

use alloc::vec::Vec;

use ring::signature::{self, KeyPair};

use crate::{MIN_SEED_LENGTH, SIGNATURE_LENGTH};

/// Prefixed to the DELE bytes when generating or verifying a certificate
/// signature.
pub const CERTIFICATE_CONTEXT: &[u8] = b"RoughTime v1 delegation signature--\x00";

/// Prefixed to the SREP bytes when generating or verifying the server's
/// response signature.
pub const SIGNED_RESPONSE_CONTEXT: &[u8] = b"RoughTime v1 response signature\x00";

/// Errors from signing-key construction and signature verification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CryptoError {
    /// The private key seed is shorter than the 32-byte minimum.
    InvalidSeedLength {
        /// The length found.
        actual: usize,
    },
    /// The seed was rejected by the underlying Ed25519 implementation.
    SeedRejected,
    /// The signature is not exactly 64 bytes.
    InvalidSignatureLength {
        /// The length found.
        actual: usize,
    },
    /// The signature does not verify under the given public key.
    SignatureMismatch,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidSeedLength { actual } => {
                write!(
                    f,
                    "insufficient private key seed length: {} bytes, need {}",
                    actual, MIN_SEED_LENGTH
                )
            }
            CryptoError::SeedRejected => write!(f, "private key seed rejected"),
            CryptoError::InvalidSignatureLength { actual } => {
                write!(
                    f,
                    "signature is the wrong length: {} bytes, need {}",
                    actual, SIGNATURE_LENGTH
                )
            }
            CryptoError::SignatureMismatch => write!(f, "signature does not match"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CryptoError {}

/// Signs byte-strings with the Ed25519 private key derived from a seed.
///
/// The seed is expanded into a key pair per RFC 8032; only the first 32 bytes
/// of a longer seed are used.
pub struct Signer {
    key_pair: signature::Ed25519KeyPair,
    buf: Vec<u8>,
}

impl Signer {
    /// Derive a signing key from `seed` (at least 32 bytes).
    pub fn new(seed: &[u8]) -> Result<Signer, CryptoError> {
        if seed.len() < MIN_SEED_LENGTH {
            return Err(CryptoError::InvalidSeedLength { actual: seed.len() });
        }
        let key_pair = signature::Ed25519KeyPair::from_seed_unchecked(&seed[..MIN_SEED_LENGTH])
            .map_err(|_| CryptoError::SeedRejected)?;
        Ok(Signer {
            key_pair,
            buf: Vec::new(),
        })
    }

    /// Append bytes to the content to be signed.
    pub fn update(&mut self, content: &[u8]) {
        self.buf.extend_from_slice(content);
    }

    /// Sign all content fed since construction or the previous `sign`.
    ///
    /// The accumulated content is cleared, leaving the signer ready for the
    /// next signature.
    pub fn sign(&mut self) -> [u8; SIGNATURE_LENGTH] {
        let content = core::mem::take(&mut self.buf);
        let sig = self.key_pair.sign(&content);
        let mut out = [0u8; SIGNATURE_LENGTH];
        out.copy_from_slice(sig.as_ref());
        out
    }

    /// The Ed25519 public key corresponding to the seed-derived private key.
    pub fn public_key(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.key_pair.public_key().as_ref());
        out
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose key material or pending content.
        f.debug_struct("Signer")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Verifies Ed25519 signatures of byte-strings under a fixed public key.
#[derive(Debug)]
pub struct Verifier {
    public_key: [u8; 32],
    buf: Vec<u8>,
}

impl Verifier {
    /// Create a verifier for the given 32-byte Ed25519 public key.
    pub fn new(public_key: [u8; 32]) -> Verifier {
        Verifier {
            public_key,
            buf: Vec::new(),
        }
    }

    /// Append bytes to the content to be verified.
    pub fn update(&mut self, content: &[u8]) {
        self.buf.extend_from_slice(content);
    }

    /// Verify `sig` over all content fed since construction or the previous
    /// `verify`.
    ///
    /// A signature that is not exactly 64 bytes fails before the underlying
    /// verification runs. The accumulated content is cleared whether or not
    /// the signature matches.
    pub fn verify(&mut self, sig: &[u8]) -> Result<(), CryptoError> {
        let content = core::mem::take(&mut self.buf);
        if sig.len() != SIGNATURE_LENGTH {
            return Err(CryptoError::InvalidSignatureLength { actual: sig.len() });
        }
        let key = signature::UnparsedPublicKey::new(&signature::ED25519, &self.public_key);
        key.verify(&content, sig)
            .map_err(|_| CryptoError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    // RFC 8032 test vectors, TEST 1 and TEST 3.

    #[test]
    fn test_sign_empty_message() {
        let seed = hex("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60");
        let expected = hex(
            "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e06522490155\
             5fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b",
        );

        let mut signer = Signer::new(&seed).unwrap();
        assert_eq!(signer.sign().as_slice(), expected.as_slice());
    }

    #[test]
    fn test_sign_message() {
        let seed = hex("0d4a05b07352a5436e180356da0ae6efa0345ff7fb1572575772e8005ed978e9");
        let message = hex("cbc77b");
        let expected = hex(
            "d9868d52c2bebce5f3fa5a79891970f309cb6591e3e1702a70276fa97c24b3a8\
             e58606c38c9758529da50ee31b8219cba45271c689afa60b0ea26c99db19b00c",
        );

        let mut signer = Signer::new(&seed).unwrap();
        signer.update(&message);
        assert_eq!(signer.sign().as_slice(), expected.as_slice());
    }

    #[test]
    fn test_verify_empty_message() {
        let public_key: [u8; 32] =
            hex("d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a")
                .try_into()
                .unwrap();
        let sig = hex(
            "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e06522490155\
             5fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b",
        );

        let mut verifier = Verifier::new(public_key);
        assert_eq!(verifier.verify(&sig), Ok(()));
    }

    #[test]
    fn test_verify_message() {
        let public_key: [u8; 32] =
            hex("c0dac102c4533186e25dc43128472353eaabdb878b152aeb8e001f92d90233a7")
                .try_into()
                .unwrap();
        let message = hex("5f4c8989");
        let sig = hex(
            "124f6fc6b0d100842769e71bd530664d888df8507df6c56dedfdb509aeb93416\
             e26b918d38aa06305df3095697c18b2aa832eaa52edc0ae49fbae5a85e150c07",
        );

        let mut verifier = Verifier::new(public_key);
        verifier.update(&message);
        assert_eq!(verifier.verify(&sig), Ok(()));
    }

    #[test]
    fn test_sign_verify_roundtrip_with_context() {
        let seed = [0x33u8; 32];
        let mut signer = Signer::new(&seed).unwrap();
        signer.update(CERTIFICATE_CONTEXT);
        signer.update(b"hello world");
        let sig = signer.sign();

        let mut verifier = Verifier::new(signer.public_key());
        verifier.update(CERTIFICATE_CONTEXT);
        verifier.update(b"hello world");
        assert_eq!(verifier.verify(&sig), Ok(()));

        // Same payload under the other context must not verify.
        verifier.update(SIGNED_RESPONSE_CONTEXT);
        verifier.update(b"hello world");
        assert_eq!(verifier.verify(&sig), Err(CryptoError::SignatureMismatch));
    }

    #[test]
    fn test_signer_resets_after_sign() {
        let seed = [0x44u8; 32];
        let mut signer = Signer::new(&seed).unwrap();
        signer.update(b"first");
        let first = signer.sign();
        signer.update(b"first");
        let again = signer.sign();
        assert_eq!(first, again);
    }

    #[test]
    fn test_verifier_resets_after_failed_verify() {
        let seed = [0x55u8; 32];
        let mut signer = Signer::new(&seed).unwrap();
        signer.update(b"payload");
        let sig = signer.sign();

        let mut verifier = Verifier::new(signer.public_key());
        verifier.update(b"payload");
        assert_eq!(
            verifier.verify(&[0u8; 63]),
            Err(CryptoError::InvalidSignatureLength { actual: 63 })
        );

        // The failed attempt must not leak content into the next check.
        verifier.update(b"payload");
        assert_eq!(verifier.verify(&sig), Ok(()));
    }

    #[test]
    fn test_short_seed_rejected() {
        let err = Signer::new(&[0u8; 16]).unwrap_err();
        assert_eq!(err, CryptoError::InvalidSeedLength { actual: 16 });
    }
}
