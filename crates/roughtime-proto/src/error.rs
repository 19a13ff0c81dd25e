//! Error types for Roughtime message decoding and construction.
//!
//! [`WireError`] is `no_std`-compatible via `core::fmt::Display`; the
//! [`std::error::Error`] impl and the conversion to [`std::io::Error`] sit
//! behind the `std` feature.
//!
//! Decoding is fail-closed: no partial message is ever returned. Every length
//! and offset is checked before any indexing, since wire input is untrusted.

use core::fmt;

use crate::tag::Tag;

/// Errors that can occur while decoding or building a Roughtime message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WireError {
    /// The buffer is shorter than the 4-byte header.
    TooShort {
        /// Number of bytes available.
        available: usize,
    },
    /// The buffer length is not a multiple of 4.
    Unaligned {
        /// The offending total length.
        length: usize,
    },
    /// The header's `num_tags` exceeds the implementation cap of 65535.
    InvalidTagCount {
        /// The declared tag count.
        count: u32,
    },
    /// The buffer cannot hold the offset and tag tables `num_tags` implies.
    InsufficientPayload {
        /// The declared tag count.
        num_tags: u32,
        /// Bytes available after the header.
        available: usize,
    },
    /// An offset-table entry is not a multiple of 4.
    UnalignedOffset {
        /// Zero-based index of the offending offset-table entry.
        index: usize,
        /// The offending offset value.
        offset: u32,
    },
    /// An offset-table entry points beyond the value region, or backwards.
    OffsetOverflow {
        /// Zero-based index of the offending offset-table entry.
        index: usize,
        /// The offending offset value.
        offset: u32,
    },
    /// Tag codes are not strictly increasing by wire value.
    TagsNotIncreasing {
        /// The tag code that failed to increase.
        current: u32,
        /// The tag code before it.
        previous: u32,
    },
    /// A tag code does not name any known protocol tag.
    UnknownTag {
        /// The unrecognized wire value.
        raw: u32,
    },
    /// A required tag is absent from the message.
    MissingTag {
        /// The tag that was expected.
        tag: Tag,
    },
    /// A tag's value has the wrong length for its type.
    InvalidValueLength {
        /// The tag whose value was malformed.
        tag: Tag,
        /// The length the protocol requires.
        expected: usize,
        /// The length found.
        actual: usize,
    },
    /// `build()` was called on a builder with no entries.
    EmptyMessage,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::TooShort { available } => {
                write!(f, "message too short: {} bytes, need at least 4", available)
            }
            WireError::Unaligned { length } => {
                write!(f, "message length not a multiple of 4: {}", length)
            }
            WireError::InvalidTagCount { count } => {
                write!(f, "invalid num_tags value {}", count)
            }
            WireError::InsufficientPayload { num_tags, available } => {
                write!(
                    f,
                    "insufficient payload for num_tags of {}: {} bytes",
                    num_tags, available
                )
            }
            WireError::UnalignedOffset { index, offset } => {
                write!(f, "offset {} not a multiple of 4: {}", index, offset)
            }
            WireError::OffsetOverflow { index, offset } => {
                write!(f, "offset {} overflow: {}", index, offset)
            }
            WireError::TagsNotIncreasing { current, previous } => {
                write!(
                    f,
                    "tags not strictly increasing: current 0x{:08x}, previous 0x{:08x}",
                    current, previous
                )
            }
            WireError::UnknownTag { raw } => {
                write!(f, "unknown tag 0x{:08x}", raw)
            }
            WireError::MissingTag { tag } => {
                write!(f, "missing required tag: {}", tag)
            }
            WireError::InvalidValueLength {
                tag,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "tag {} has invalid length: expected {}, got {}",
                    tag, expected, actual
                )
            }
            WireError::EmptyMessage => {
                write!(f, "cannot build an empty message")
            }
        }
    }
}

#[cfg(feature = "std")]
impl From<WireError> for std::io::Error {
    fn from(err: WireError) -> std::io::Error {
        let kind = match &err {
            WireError::TooShort { .. } | WireError::InsufficientPayload { .. } => {
                std::io::ErrorKind::UnexpectedEof
            }
            _ => std::io::ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WireError {}
