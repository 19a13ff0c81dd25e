/*!
Server-side Roughtime key management.

A Roughtime server holds a long-term Ed25519 key pair whose public half is
published out of band, but signs responses with a short-lived *delegated*
key. The long-term key signs a DELE certificate binding the delegated public
key to a validity window, and then only the delegated key touches request
traffic. [`LongTermKey`] owns both keys: it rotates the delegated pair,
produces the CERT message clients verify, and refuses to sign once the
current time leaves the delegation window.
*/

#![warn(missing_docs)]

use std::fmt;
use std::time::Duration;

use log::debug;

use roughtime_proto::builder::MessageBuilder;
use roughtime_proto::crypto::{CryptoError, Signer, CERTIFICATE_CONTEXT, SIGNED_RESPONSE_CONTEXT};
use roughtime_proto::tag::Tag;
use roughtime_proto::wire::Message;
use roughtime_proto::{MIN_SEED_LENGTH, PUBKEY_LENGTH, SIGNATURE_LENGTH};

pub mod clock;

use clock::{ClockSource, SystemClock};

/// Delegations shorter than this are refused.
pub const MIN_DELEGATION_DURATION: Duration = Duration::from_secs(60);

/// Default delegation validity window.
pub const DEFAULT_DELEGATION_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Errors from key construction and delegated signing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeyError {
    /// A seed was rejected when deriving an Ed25519 key pair.
    Crypto(CryptoError),
    /// The requested delegation duration is at or below the 60-second
    /// minimum.
    InvalidDuration {
        /// The requested duration, in seconds.
        seconds: u64,
    },
    /// A delegated signature was requested outside the delegation window.
    DelegationExpired {
        /// The current time (epoch milliseconds).
        now: u64,
        /// Window start (epoch milliseconds).
        start: u64,
        /// Window end (epoch milliseconds).
        end: u64,
    },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::Crypto(e) => write!(f, "key derivation failed: {}", e),
            KeyError::InvalidDuration { seconds } => {
                write!(
                    f,
                    "delegation duration of {} seconds is below the {}-second minimum",
                    seconds,
                    MIN_DELEGATION_DURATION.as_secs()
                )
            }
            KeyError::DelegationExpired { now, start, end } => {
                write!(
                    f,
                    "current time {} outside delegated key bounds [{}, {}]",
                    now, start, end
                )
            }
        }
    }
}

impl std::error::Error for KeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyError::Crypto(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CryptoError> for KeyError {
    fn from(e: CryptoError) -> KeyError {
        KeyError::Crypto(e)
    }
}

/// A long-term server key pair with a rotating delegated key.
///
/// Delegation windows are tracked in epoch milliseconds; the MINT/MAXT
/// values in the emitted certificate are epoch microseconds, matching the
/// resolution of the response midpoint.
pub struct LongTermKey {
    long_term_key: Signer,
    delegation_duration: Duration,
    clock: Box<dyn ClockSource>,
    delegated_key: Signer,
    delegation_start: u64,
    delegation_end: u64,
}

impl LongTermKey {
    /// Create a key manager with the default 7-day delegation window and the
    /// system clock. A first delegated key is generated immediately.
    pub fn new(seed: &[u8]) -> Result<LongTermKey, KeyError> {
        LongTermKey::with_options(seed, DEFAULT_DELEGATION_DURATION, Box::new(SystemClock))
    }

    /// Create a key manager with an explicit delegation duration and clock.
    pub fn with_options(
        seed: &[u8],
        delegation_duration: Duration,
        clock: Box<dyn ClockSource>,
    ) -> Result<LongTermKey, KeyError> {
        if delegation_duration <= MIN_DELEGATION_DURATION {
            return Err(KeyError::InvalidDuration {
                seconds: delegation_duration.as_secs(),
            });
        }

        let long_term_key = Signer::new(seed)?;
        let mut key = LongTermKey {
            long_term_key,
            delegation_duration,
            clock,
            // Placeholder; replaced by the rotation below.
            delegated_key: Signer::new(&[0u8; MIN_SEED_LENGTH])?,
            delegation_start: 0,
            delegation_end: 0,
        };
        key.new_delegated_key()?;
        Ok(key)
    }

    /// Generate a fresh delegated key pair and restart the validity window
    /// at the current time.
    pub fn new_delegated_key(&mut self) -> Result<(), KeyError> {
        let mut seed = [0u8; MIN_SEED_LENGTH];
        rand::fill(&mut seed);
        self.delegated_key = Signer::new(&seed)?;
        self.delegation_start = self.clock.now();
        self.delegation_end = self.delegation_start + self.delegation_duration.as_millis() as u64;
        debug!(
            "rotated delegated key, window [{}, {}]",
            self.delegation_start, self.delegation_end
        );
        Ok(())
    }

    /// The CERT message for the current delegated key: a DELE value carrying
    /// PUBK/MINT/MAXT, and the long-term key's signature over the delegation
    /// context and the DELE bytes.
    pub fn as_cert_message(&mut self) -> Message {
        let dele = build_nonempty(
            MessageBuilder::new()
                .add(Tag::Pubk, self.delegated_public_key().to_vec())
                .add(
                    Tag::Mint,
                    millis_to_micros(self.delegation_start).to_le_bytes().to_vec(),
                )
                .add(
                    Tag::Maxt,
                    millis_to_micros(self.delegation_end).to_le_bytes().to_vec(),
                ),
        );
        let dele_bytes = dele.encode();

        self.long_term_key.update(CERTIFICATE_CONTEXT);
        self.long_term_key.update(&dele_bytes);
        let sig = self.long_term_key.sign();

        build_nonempty(
            MessageBuilder::new()
                .add(Tag::Sig, sig.to_vec())
                .add(Tag::Dele, dele_bytes),
        )
    }

    /// The long-term public key.
    pub fn long_term_public_key(&self) -> [u8; PUBKEY_LENGTH] {
        self.long_term_key.public_key()
    }

    /// The public key of the current delegated key.
    pub fn delegated_public_key(&self) -> [u8; PUBKEY_LENGTH] {
        self.delegated_key.public_key()
    }

    /// Start of the delegated key's validity (epoch milliseconds).
    pub fn delegation_start(&self) -> u64 {
        self.delegation_start
    }

    /// End of the delegated key's validity (epoch milliseconds).
    pub fn delegation_end(&self) -> u64 {
        self.delegation_end
    }

    /// Sign `content` with the long-term key.
    pub fn sign_long_term(&mut self, content: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.long_term_key.update(content);
        self.long_term_key.sign()
    }

    /// Sign `content` with the current delegated key.
    ///
    /// Fails if the current time is outside the delegation window; the
    /// caller must rotate first.
    pub fn sign_delegated(&mut self, content: &[u8]) -> Result<[u8; SIGNATURE_LENGTH], KeyError> {
        let now = self.clock.now();
        if now < self.delegation_start || now > self.delegation_end {
            return Err(KeyError::DelegationExpired {
                now,
                start: self.delegation_start,
                end: self.delegation_end,
            });
        }

        self.delegated_key.update(content);
        Ok(self.delegated_key.sign())
    }

    /// Sign an encoded SREP value with the current delegated key under the
    /// response context, producing the response's top-level SIG value.
    pub fn sign_response(&mut self, srep: &[u8]) -> Result<[u8; SIGNATURE_LENGTH], KeyError> {
        let mut content = Vec::with_capacity(SIGNED_RESPONSE_CONTEXT.len() + srep.len());
        content.extend_from_slice(SIGNED_RESPONSE_CONTEXT);
        content.extend_from_slice(srep);
        self.sign_delegated(&content)
    }
}

impl fmt::Debug for LongTermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongTermKey")
            .field("long_term_public_key", &self.long_term_public_key())
            .field("delegated_public_key", &self.delegated_public_key())
            .field("delegation_start", &self.delegation_start)
            .field("delegation_end", &self.delegation_end)
            .finish_non_exhaustive()
    }
}

fn millis_to_micros(millis: u64) -> u64 {
    millis.saturating_mul(1000)
}

/// Builds a message from a builder known to hold at least one entry.
fn build_nonempty(builder: MessageBuilder) -> Message {
    match builder.build() {
        Ok(msg) => msg,
        Err(_) => unreachable!(),
    }
}
