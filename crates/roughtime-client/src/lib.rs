/*!
Roughtime client: request construction and response validation.

A [`ClientSession`] owns one 64-byte nonce and the server's long-term
Ed25519 public key. [`ClientSession::create_request`] produces the padded
request message carrying the nonce; [`ClientSession::process_response`]
checks the server's answer end to end:

1. the delegation certificate is signed by the long-term key,
2. the signed response is signed by the delegated key,
3. the session nonce is included in the response's Merkle tree,
4. the midpoint falls within the delegation's validity window.

All four checks must pass before [`ClientSession::midpoint`] and
[`ClientSession::radius`] report anything other than zero. A failed check
leaves the session invalid with the first failure recorded as its cause.

```no_run
use roughtime_client::ClientSession;

let public_key = [0u8; 32]; // the server's published long-term key
let mut session = ClientSession::new(public_key);
let request = session.create_request().encode();
// ... exchange `request` for `response_bytes` over UDP ...
# let response_bytes: Vec<u8> = Vec::new();
let response = roughtime_proto::wire::Message::parse(&response_bytes)?;
session.process_response(&response);
if session.is_response_valid() {
    println!("midpoint {} us, radius {} us", session.midpoint(), session.radius());
}
# Ok::<(), roughtime_proto::error::WireError>(())
```
*/

#![warn(missing_docs)]

use std::fmt;

use log::debug;

use roughtime_proto::builder::MessageBuilder;
use roughtime_proto::crypto::{
    CryptoError, Verifier, CERTIFICATE_CONTEXT, SIGNED_RESPONSE_CONTEXT,
};
use roughtime_proto::error::WireError;
use roughtime_proto::merkle::{self, MerkleError};
use roughtime_proto::tag::Tag;
use roughtime_proto::wire::Message;
use roughtime_proto::{NONCE_LENGTH, PUBKEY_LENGTH};

/// Reasons a server response was rejected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResponseError {
    /// The response (or a nested message) was structurally malformed or
    /// missing a required tag.
    Wire(WireError),
    /// The certificate's DELE signature does not verify under the long-term
    /// public key.
    DelegationSignature(CryptoError),
    /// The top-level SREP signature does not verify under the delegated
    /// public key.
    ResponseSignature(CryptoError),
    /// A signature step was invoked before the delegated key was established.
    DelegationNotVerified,
    /// The session nonce is not covered by the response's Merkle tree.
    Merkle(MerkleError),
    /// The delegation validity window is degenerate (MINT is not strictly
    /// before MAXT).
    InvalidBounds {
        /// Window start (epoch microseconds).
        min: u64,
        /// Window end (epoch microseconds).
        max: u64,
    },
    /// The response midpoint falls outside the delegation validity window.
    MidpointOutOfBounds {
        /// The midpoint reported by the server (epoch microseconds).
        midpoint: u64,
        /// Window start (epoch microseconds).
        min: u64,
        /// Window end (epoch microseconds).
        max: u64,
    },
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseError::Wire(e) => write!(f, "malformed response: {}", e),
            ResponseError::DelegationSignature(e) => {
                write!(f, "invalid signature on DELE certificate: {}", e)
            }
            ResponseError::ResponseSignature(e) => {
                write!(f, "invalid top-level signature on SREP: {}", e)
            }
            ResponseError::DelegationNotVerified => {
                write!(f, "delegated key has not been verified")
            }
            ResponseError::Merkle(e) => write!(f, "nonce inclusion check failed: {}", e),
            ResponseError::InvalidBounds { min, max } => {
                write!(f, "degenerate delegation window: MINT {} >= MAXT {}", min, max)
            }
            ResponseError::MidpointOutOfBounds { midpoint, min, max } => {
                write!(
                    f,
                    "midpoint {} outside delegation window [{}, {}]",
                    midpoint, min, max
                )
            }
        }
    }
}

impl std::error::Error for ResponseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResponseError::Wire(e) => Some(e),
            ResponseError::DelegationSignature(e) | ResponseError::ResponseSignature(e) => Some(e),
            ResponseError::Merkle(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WireError> for ResponseError {
    fn from(e: WireError) -> ResponseError {
        ResponseError::Wire(e)
    }
}

impl From<ResponseError> for std::io::Error {
    fn from(e: ResponseError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, e)
    }
}

/// A validated server time: midpoint and uncertainty radius.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeResult {
    /// Midpoint of the server's time interval, epoch microseconds.
    pub midpoint: u64,
    /// Uncertainty radius around the midpoint, microseconds.
    pub radius: u32,
}

impl TimeResult {
    /// Midpoint as whole seconds since the epoch.
    pub fn midpoint_seconds(&self) -> u64 {
        self.midpoint / 1_000_000
    }
}

/// One request/response exchange with a Roughtime server.
///
/// The session is single-use: one nonce, one request, one response.
#[derive(Debug)]
pub struct ClientSession {
    nonce: [u8; NONCE_LENGTH],
    long_term_public_key: [u8; PUBKEY_LENGTH],
    delegated_key: Option<[u8; PUBKEY_LENGTH]>,
    delegation_min: u64,
    delegation_max: u64,
    midpoint: u64,
    radius: u32,
    valid: bool,
    cause: Option<ResponseError>,
}

impl ClientSession {
    /// Create a session with a freshly generated random nonce.
    pub fn new(long_term_public_key: [u8; PUBKEY_LENGTH]) -> ClientSession {
        let mut nonce = [0u8; NONCE_LENGTH];
        rand::fill(&mut nonce);
        ClientSession::with_nonce(long_term_public_key, nonce)
    }

    /// Create a session with a caller-supplied nonce.
    pub fn with_nonce(
        long_term_public_key: [u8; PUBKEY_LENGTH],
        nonce: [u8; NONCE_LENGTH],
    ) -> ClientSession {
        ClientSession {
            nonce,
            long_term_public_key,
            delegated_key: None,
            delegation_min: 0,
            delegation_max: 0,
            midpoint: 0,
            radius: 0,
            valid: false,
            cause: None,
        }
    }

    /// The nonce this session sends and expects to find in the response tree.
    pub fn nonce(&self) -> &[u8; NONCE_LENGTH] {
        &self.nonce
    }

    /// Build the request message: the nonce, padded to the 1024-byte minimum.
    pub fn create_request(&self) -> Message {
        let built = MessageBuilder::new()
            .pad_to_minimum(true)
            .add(Tag::Nonc, self.nonce.to_vec())
            .build();
        match built {
            Ok(msg) => msg,
            // A one-entry builder cannot produce EmptyMessage.
            Err(_) => unreachable!(),
        }
    }

    /// Run the full validation pipeline over a parsed response.
    ///
    /// On success the session becomes valid and [`midpoint`](Self::midpoint)
    /// and [`radius`](Self::radius) become readable. On failure the session
    /// is invalid and the first failing check is recorded as
    /// [`invalid_response_cause`](Self::invalid_response_cause).
    pub fn process_response(&mut self, response: &Message) {
        match self.run_validation(response) {
            Ok(()) => {
                self.valid = true;
                self.cause = None;
            }
            Err(e) => {
                debug!("response rejected: {}", e);
                self.valid = false;
                self.cause = Some(e);
            }
        }
    }

    fn run_validation(&mut self, response: &Message) -> Result<(), ResponseError> {
        self.verify_delegated_key(response)?;
        self.verify_top_level_signature(response)?;
        self.verify_nonce_included(response)?;
        self.verify_midpoint_bounds(response)?;
        Ok(())
    }

    /// Check the certificate: the long-term key must have signed the DELE
    /// value under the delegation context. On success the delegated public
    /// key and its validity window are retained for the later checks.
    pub fn verify_delegated_key(&mut self, response: &Message) -> Result<(), ResponseError> {
        let cert = response.get_nested(Tag::Cert)?;
        let dele_bytes = cert.require(Tag::Dele)?;
        let cert_sig = cert.require(Tag::Sig)?;

        let mut verifier = Verifier::new(self.long_term_public_key);
        verifier.update(CERTIFICATE_CONTEXT);
        verifier.update(dele_bytes);
        verifier
            .verify(cert_sig)
            .map_err(ResponseError::DelegationSignature)?;

        let dele = Message::parse(dele_bytes)?;
        let pubk = dele.require(Tag::Pubk)?;
        if pubk.len() != PUBKEY_LENGTH {
            return Err(ResponseError::Wire(WireError::InvalidValueLength {
                tag: Tag::Pubk,
                expected: PUBKEY_LENGTH,
                actual: pubk.len(),
            }));
        }
        let mut delegated_key = [0u8; PUBKEY_LENGTH];
        delegated_key.copy_from_slice(pubk);

        self.delegated_key = Some(delegated_key);
        self.delegation_min = dele.get_u64(Tag::Mint)?;
        self.delegation_max = dele.get_u64(Tag::Maxt)?;
        Ok(())
    }

    /// Check the top-level signature: the delegated key must have signed the
    /// SREP value under the response context.
    ///
    /// Requires a prior successful
    /// [`verify_delegated_key`](Self::verify_delegated_key); the delegated
    /// key is the only key this signature may verify under.
    pub fn verify_top_level_signature(&self, response: &Message) -> Result<(), ResponseError> {
        let delegated_key = self
            .delegated_key
            .ok_or(ResponseError::DelegationNotVerified)?;
        let srep_bytes = response.require(Tag::Srep)?;
        let sig = response.require(Tag::Sig)?;

        let mut verifier = Verifier::new(delegated_key);
        verifier.update(SIGNED_RESPONSE_CONTEXT);
        verifier.update(srep_bytes);
        verifier
            .verify(sig)
            .map_err(ResponseError::ResponseSignature)
    }

    /// Check that the session nonce is a leaf of the Merkle tree whose root
    /// the server signed.
    pub fn verify_nonce_included(&self, response: &Message) -> Result<(), ResponseError> {
        let srep = response.get_nested(Tag::Srep)?;
        let root = srep.require(Tag::Root)?;
        let path = response.require(Tag::Path)?;
        let index = response.get_u32(Tag::Indx)?;

        merkle::verify_inclusion(&self.nonce, root, path, index).map_err(ResponseError::Merkle)
    }

    /// Check that the reported midpoint lies inside the delegation validity
    /// window, and retain midpoint and radius.
    ///
    /// Uses the window captured by
    /// [`verify_delegated_key`](Self::verify_delegated_key); before that
    /// step the window is the degenerate `[0, 0]` and every midpoint is
    /// rejected.
    pub fn verify_midpoint_bounds(&mut self, response: &Message) -> Result<(), ResponseError> {
        let srep = response.get_nested(Tag::Srep)?;
        let midpoint = srep.get_u64(Tag::Midp)?;
        let radius = srep.get_u32(Tag::Radi)?;

        let (min, max) = (self.delegation_min, self.delegation_max);
        if min >= max {
            return Err(ResponseError::InvalidBounds { min, max });
        }
        if midpoint < min || midpoint > max {
            return Err(ResponseError::MidpointOutOfBounds { midpoint, min, max });
        }

        self.midpoint = midpoint;
        self.radius = radius;
        Ok(())
    }

    /// Whether the most recent [`process_response`](Self::process_response)
    /// accepted the response.
    pub fn is_response_valid(&self) -> bool {
        self.valid
    }

    /// Midpoint of the server's time interval (epoch microseconds), or 0 if
    /// no valid response has been processed.
    pub fn midpoint(&self) -> u64 {
        if self.valid {
            self.midpoint
        } else {
            0
        }
    }

    /// Uncertainty radius (microseconds), or 0 if no valid response has been
    /// processed.
    pub fn radius(&self) -> u32 {
        if self.valid {
            self.radius
        } else {
            0
        }
    }

    /// The first check that failed, if the response was rejected.
    pub fn invalid_response_cause(&self) -> Option<&ResponseError> {
        self.cause.as_ref()
    }
}

/// Validate `response` against `nonce` and `public_key` in one call.
///
/// Convenience wrapper over [`ClientSession`] for callers that already hold
/// the raw response bytes.
pub fn verify_response(
    response: &[u8],
    nonce: [u8; NONCE_LENGTH],
    public_key: [u8; PUBKEY_LENGTH],
) -> Result<TimeResult, ResponseError> {
    let msg = Message::parse(response)?;
    let mut session = ClientSession::with_nonce(public_key, nonce);
    session.run_validation(&msg)?;
    session.valid = true;
    Ok(TimeResult {
        midpoint: session.midpoint(),
        radius: session.radius(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_is_padded_and_carries_nonce() {
        let session = ClientSession::with_nonce([0; 32], [0xA7; 64]);
        let request = session.create_request();
        assert_eq!(request.get(Tag::Nonc), Some(&[0xA7u8; 64][..]));
        assert!(request.get(Tag::Pad).is_some());
        assert_eq!(request.encode().len(), 1024);
    }

    #[test]
    fn test_fresh_sessions_use_distinct_nonces() {
        let a = ClientSession::new([0; 32]);
        let b = ClientSession::new([0; 32]);
        assert_ne!(a.nonce(), b.nonce());
    }

    #[test]
    fn test_accessors_zero_before_validation() {
        let session = ClientSession::new([0; 32]);
        assert!(!session.is_response_valid());
        assert_eq!(session.midpoint(), 0);
        assert_eq!(session.radius(), 0);
        assert_eq!(session.invalid_response_cause(), None);
    }

    #[test]
    fn test_top_level_check_requires_delegated_key() {
        let session = ClientSession::new([0; 32]);
        let response = MessageBuilder::new()
            .add(Tag::Srep, vec![0; 4])
            .add(Tag::Sig, vec![0; 64])
            .build()
            .unwrap();
        assert_eq!(
            session.verify_top_level_signature(&response),
            Err(ResponseError::DelegationNotVerified)
        );
    }

    #[test]
    fn test_midpoint_bounds_degenerate_window() {
        // A session that never verified a certificate has the [0, 0] window.
        let mut session = ClientSession::new([0; 32]);
        let srep = MessageBuilder::new()
            .add(Tag::Radi, 0u32.to_le_bytes().to_vec())
            .add(Tag::Midp, 5u64.to_le_bytes().to_vec())
            .build()
            .unwrap();
        let response = MessageBuilder::new()
            .add_message(Tag::Srep, &srep)
            .build()
            .unwrap();
        assert_eq!(
            session.verify_midpoint_bounds(&response),
            Err(ResponseError::InvalidBounds { min: 0, max: 0 })
        );
    }
}
