//! Canonical tag-value message codec.
//!
//! A Roughtime message is an ordered map of [`Tag`] to opaque byte-string.
//! Layout:
//!
//! ```text
//! num_tags: u32 LE
//! offsets:  [u32 LE; N-1]   (cumulative byte offsets into the value region;
//!                            value 0 implicitly starts at 0)
//! tags:     [[u8; 4]; N]    (strictly ascending by LE u32 value)
//! values:   [u8]            (concatenated; value i spans offset[i]..offset[i+1],
//!                            the last value runs to the end of the buffer)
//! ```
//!
//! Decoding is strict and fail-closed: misaligned lengths, bad offsets,
//! out-of-order tags, and unknown tags are all rejected before any value is
//! materialized. `parse` and `encode` are mutually inverse for every valid
//! message.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::error::WireError;
use crate::tag::Tag;

/// Implementation cap on `num_tags`. The abstract protocol permits up to
/// 2^32-1 tags, but untrusted input must not drive allocation that far.
const MAX_NUM_TAGS: u32 = 0xFFFF;

/// An immutable Roughtime protocol message.
///
/// Construct one by [`parse`](Message::parse)-ing wire bytes or through
/// [`MessageBuilder`](crate::builder::MessageBuilder).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    map: BTreeMap<Tag, Vec<u8>>,
}

impl Message {
    /// Parse a message from wire bytes.
    ///
    /// The entire buffer is consumed: the last value runs to the end of
    /// `buf`. Framing above this layer owns any trailing bytes.
    pub fn parse(buf: &[u8]) -> Result<Message, WireError> {
        if buf.len() < 4 {
            return Err(WireError::TooShort {
                available: buf.len(),
            });
        }
        if buf.len() % 4 != 0 {
            return Err(WireError::Unaligned { length: buf.len() });
        }

        let num_tags = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if num_tags > MAX_NUM_TAGS {
            return Err(WireError::InvalidTagCount { count: num_tags });
        }
        if num_tags == 0 {
            return Ok(Message {
                map: BTreeMap::new(),
            });
        }

        let num_tags = num_tags as usize;
        let rest = &buf[4..];

        // Offset table (N-1 entries) followed by the tag table (N entries).
        let offsets_len = 4 * (num_tags - 1);
        let table_len = offsets_len + 4 * num_tags;
        if rest.len() < table_len {
            return Err(WireError::InsufficientPayload {
                num_tags: num_tags as u32,
                available: rest.len(),
            });
        }

        let offset_bytes = &rest[..offsets_len];
        let tag_bytes = &rest[offsets_len..table_len];
        let values = &rest[table_len..];

        // Value boundaries: implicit 0, the stored offsets, end of buffer.
        let mut bounds = Vec::with_capacity(num_tags + 1);
        bounds.push(0usize);
        for (i, chunk) in offset_bytes.chunks_exact(4).enumerate() {
            let offset = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if offset % 4 != 0 {
                return Err(WireError::UnalignedOffset { index: i, offset });
            }
            // Equal offsets are legal (zero-length values); decreasing or
            // out-of-range offsets are not.
            if (offset as usize) > values.len() || (offset as usize) < bounds[i] {
                return Err(WireError::OffsetOverflow { index: i, offset });
            }
            bounds.push(offset as usize);
        }
        bounds.push(values.len());

        let mut map = BTreeMap::new();
        let mut prev: Option<u32> = None;
        for (i, chunk) in tag_bytes.chunks_exact(4).enumerate() {
            let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if let Some(previous) = prev {
                if raw <= previous {
                    return Err(WireError::TagsNotIncreasing {
                        current: raw,
                        previous,
                    });
                }
            }
            let tag = Tag::from_wire_value(raw).ok_or(WireError::UnknownTag { raw })?;
            map.insert(tag, values[bounds[i]..bounds[i + 1]].to_vec());
            prev = Some(raw);
        }

        Ok(Message { map })
    }

    /// Encode this message to its canonical wire form.
    ///
    /// `Message::parse(&msg.encode())` reproduces `msg` for every valid
    /// message.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        buf.extend_from_slice(&(self.map.len() as u32).to_le_bytes());

        // Cumulative offsets; the first value's offset is implicit.
        if self.map.len() > 1 {
            let mut sum = 0u32;
            for value in self.map.values().take(self.map.len() - 1) {
                sum += value.len() as u32;
                buf.extend_from_slice(&sum.to_le_bytes());
            }
        }
        for tag in self.map.keys() {
            buf.extend_from_slice(&tag.wire_bytes());
        }
        for value in self.map.values() {
            buf.extend_from_slice(value);
        }

        buf
    }

    /// Size in bytes of this message's wire encoding, without encoding it.
    pub fn encoded_size(&self) -> usize {
        compute_encoded_size(&self.map)
    }

    /// Number of tags in this message.
    pub fn num_tags(&self) -> usize {
        self.map.len()
    }

    /// The value mapped to `tag`, if present.
    pub fn get(&self, tag: Tag) -> Option<&[u8]> {
        self.map.get(&tag).map(Vec::as_slice)
    }

    /// The value mapped to `tag`, or `MissingTag` if absent.
    pub fn require(&self, tag: Tag) -> Result<&[u8], WireError> {
        self.get(tag).ok_or(WireError::MissingTag { tag })
    }

    /// Parse the value mapped to `tag` as a nested message.
    pub fn get_nested(&self, tag: Tag) -> Result<Message, WireError> {
        Message::parse(self.require(tag)?)
    }

    /// The value mapped to `tag` as a little-endian `u32`.
    pub fn get_u32(&self, tag: Tag) -> Result<u32, WireError> {
        let data = self.require(tag)?;
        if data.len() != 4 {
            return Err(WireError::InvalidValueLength {
                tag,
                expected: 4,
                actual: data.len(),
            });
        }
        Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
    }

    /// The value mapped to `tag` as a little-endian `u64`.
    pub fn get_u64(&self, tag: Tag) -> Result<u64, WireError> {
        let data = self.require(tag)?;
        if data.len() != 8 {
            return Err(WireError::InvalidValueLength {
                tag,
                expected: 8,
                actual: data.len(),
            });
        }
        Ok(u64::from_le_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ]))
    }

    /// Iterate over `(tag, value)` pairs in ascending wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &[u8])> {
        self.map.iter().map(|(t, v)| (*t, v.as_slice()))
    }

    pub(crate) fn from_map(map: BTreeMap<Tag, Vec<u8>>) -> Message {
        Message { map }
    }

    fn fmt_indented(&self, f: &mut core::fmt::Formatter<'_>, level: usize) -> core::fmt::Result {
        writeln!(f, "Message|{}|{{", self.map.len())?;
        for (tag, value) in &self.map {
            for _ in 0..level + 1 {
                f.write_str("  ")?;
            }
            write!(f, "{}({}) = ", tag, value.len())?;
            match Message::parse(value) {
                Ok(nested) if tag.is_nested() => nested.fmt_indented(f, level + 1)?,
                _ => {
                    for byte in value {
                        write!(f, "{:02x}", byte)?;
                    }
                    writeln!(f)?;
                }
            }
        }
        for _ in 0..level {
            f.write_str("  ")?;
        }
        writeln!(f, "}}")
    }
}

/// Hierarchical dump of the message, recursing into nested CERT/DELE/SREP
/// values. Intended for diagnostics.
impl core::fmt::Display for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Size in bytes of the wire encoding of `map`.
///
/// `4` for the header, one 4-byte code per tag, one 4-byte offset per tag
/// after the first, plus the value bytes.
pub fn compute_encoded_size(map: &BTreeMap<Tag, Vec<u8>>) -> usize {
    let header = 4;
    let tags = 4 * map.len();
    let offsets = 4 * map.len().saturating_sub(1);
    let values: usize = map.values().map(Vec::len).sum();

    header + tags + offsets + values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MessageBuilder;

    #[test]
    fn test_parse_empty_message() {
        let msg = Message::parse(&[0, 0, 0, 0]).unwrap();
        assert_eq!(msg.num_tags(), 0);
        assert_eq!(msg.get(Tag::Cert), None);
    }

    #[test]
    fn test_parse_single_tag_message() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(b"CERT");
        buf.extend_from_slice(&[0x50; 4]);

        let msg = Message::parse(&buf).unwrap();
        assert_eq!(msg.num_tags(), 1);
        assert_eq!(msg.get(Tag::Cert), Some(&[0x50u8; 4][..]));
    }

    #[test]
    fn test_parse_three_tag_message() {
        // DELE < INDX < PAD by wire value; offsets {4, 8}.
        let mut buf = Vec::new();
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&8u32.to_le_bytes());
        buf.extend_from_slice(b"DELE");
        buf.extend_from_slice(b"INDX");
        buf.extend_from_slice(&[b'P', b'A', b'D', 0xFF]);
        buf.extend_from_slice(&[0x11; 4]);
        buf.extend_from_slice(&[0x22; 4]);
        buf.extend_from_slice(&[0x33; 4]);

        let msg = Message::parse(&buf).unwrap();
        assert_eq!(msg.num_tags(), 3);
        assert_eq!(msg.get(Tag::Dele), Some(&[0x11u8; 4][..]));
        assert_eq!(msg.get(Tag::Indx), Some(&[0x22u8; 4][..]));
        assert_eq!(msg.get(Tag::Pad), Some(&[0x33u8; 4][..]));
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(Message::parse(&[]), Err(WireError::TooShort { available: 0 }));
        assert_eq!(
            Message::parse(&[0x01]),
            Err(WireError::TooShort { available: 1 })
        );
    }

    #[test]
    fn test_parse_unaligned_length() {
        assert_eq!(
            Message::parse(&[0, 1, 0, 0, 0]),
            Err(WireError::Unaligned { length: 5 })
        );
    }

    #[test]
    fn test_parse_num_tags_above_cap() {
        assert_eq!(
            Message::parse(&[0xFF, 0xFF, 0xFF, 0xEF]),
            Err(WireError::InvalidTagCount { count: 0xEFFF_FFFF })
        );
    }

    #[test]
    fn test_parse_insufficient_payload() {
        // Two tags declared, but only the offset table follows.
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        assert_eq!(
            Message::parse(&buf),
            Err(WireError::InsufficientPayload {
                num_tags: 2,
                available: 4
            })
        );
    }

    #[test]
    fn test_parse_unaligned_offset() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&7u32.to_le_bytes()); // not a multiple of 4
        buf.extend_from_slice(b"DELE");
        buf.extend_from_slice(b"INDX");
        buf.extend_from_slice(&[b'P', b'A', b'D', 0xFF]);
        buf.extend_from_slice(&[0u8; 12]);
        assert_eq!(
            Message::parse(&buf),
            Err(WireError::UnalignedOffset {
                index: 1,
                offset: 7
            })
        );
    }

    #[test]
    fn test_parse_offset_overflow() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&0x0102_0304u32.to_le_bytes());
        buf.extend_from_slice(b"DELE");
        buf.extend_from_slice(b"INDX");
        buf.extend_from_slice(&[0u8; 8]);
        assert_eq!(
            Message::parse(&buf),
            Err(WireError::OffsetOverflow {
                index: 0,
                offset: 0x0102_0304
            })
        );
    }

    #[test]
    fn test_parse_tags_not_increasing() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(b"INDX"); // INDX sorts after DELE
        buf.extend_from_slice(b"DELE");
        buf.extend_from_slice(&[0u8; 8]);
        assert_eq!(
            Message::parse(&buf),
            Err(WireError::TagsNotIncreasing {
                current: Tag::Dele.wire_value(),
                previous: Tag::Indx.wire_value(),
            })
        );
    }

    #[test]
    fn test_parse_duplicate_tag_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(b"DELE");
        buf.extend_from_slice(b"DELE");
        buf.extend_from_slice(&[0u8; 8]);
        assert_eq!(
            Message::parse(&buf),
            Err(WireError::TagsNotIncreasing {
                current: Tag::Dele.wire_value(),
                previous: Tag::Dele.wire_value(),
            })
        );
    }

    #[test]
    fn test_parse_unknown_tag() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(b"ZZZZ");
        buf.extend_from_slice(&[0u8; 4]);
        assert_eq!(
            Message::parse(&buf),
            Err(WireError::UnknownTag {
                raw: u32::from_le_bytes(*b"ZZZZ")
            })
        );
    }

    #[test]
    fn test_parse_zero_length_value_between_tags() {
        // Equal consecutive offsets give the middle value zero length, as in
        // real server responses where PATH is empty.
        let mut buf = Vec::new();
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&[b'S', b'I', b'G', 0x00]);
        buf.extend_from_slice(b"PATH");
        buf.extend_from_slice(b"SREP");
        buf.extend_from_slice(&[0xAA; 4]);
        buf.extend_from_slice(&[0xBB; 4]);

        let msg = Message::parse(&buf).unwrap();
        assert_eq!(msg.get(Tag::Sig), Some(&[0xAAu8; 4][..]));
        assert_eq!(msg.get(Tag::Path), Some(&[][..]));
        assert_eq!(msg.get(Tag::Srep), Some(&[0xBBu8; 4][..]));
    }

    #[test]
    fn test_roundtrip() {
        let msg = MessageBuilder::new()
            .add(Tag::Nonc, vec![0xAB; 64])
            .add(Tag::Indx, 7u32.to_le_bytes().to_vec())
            .add(Tag::Path, Vec::new())
            .build()
            .unwrap();

        let encoded = msg.encode();
        let decoded = Message::parse(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_encoded_size_matches_encoding() {
        let msg = MessageBuilder::new()
            .add(Tag::Nonc, vec![1; 64])
            .add(Tag::Srep, vec![2; 100])
            .add(Tag::Sig, vec![3; 64])
            .build()
            .unwrap();
        assert_eq!(msg.encoded_size(), msg.encode().len());

        let empty = Message::parse(&[0, 0, 0, 0]).unwrap();
        assert_eq!(empty.encoded_size(), 4);
    }

    #[test]
    fn test_nested_message() {
        let inner = MessageBuilder::new()
            .add(Tag::Pubk, vec![0x42; 32])
            .build()
            .unwrap();
        let outer = MessageBuilder::new()
            .add_message(Tag::Dele, &inner)
            .build()
            .unwrap();

        let nested = outer.get_nested(Tag::Dele).unwrap();
        assert_eq!(nested, inner);
        assert_eq!(nested.get(Tag::Pubk), Some(&[0x42u8; 32][..]));
    }

    #[test]
    fn test_require_missing_tag() {
        let msg = Message::parse(&[0, 0, 0, 0]).unwrap();
        assert_eq!(
            msg.require(Tag::Nonc),
            Err(WireError::MissingTag { tag: Tag::Nonc })
        );
    }

    #[test]
    fn test_get_u64_and_u32() {
        let msg = MessageBuilder::new()
            .add(Tag::Midp, 42u64.to_le_bytes().to_vec())
            .add(Tag::Radi, 99u32.to_le_bytes().to_vec())
            .build()
            .unwrap();
        assert_eq!(msg.get_u64(Tag::Midp), Ok(42));
        assert_eq!(msg.get_u32(Tag::Radi), Ok(99));
        assert_eq!(
            msg.get_u64(Tag::Radi),
            Err(WireError::InvalidValueLength {
                tag: Tag::Radi,
                expected: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn test_display_dump() {
        let inner = MessageBuilder::new()
            .add(Tag::Pubk, vec![0xAA; 2])
            .build()
            .unwrap();
        let outer = MessageBuilder::new()
            .add_message(Tag::Dele, &inner)
            .add(Tag::Indx, vec![0, 0, 0, 0])
            .build()
            .unwrap();

        let dump = alloc::format!("{}", outer);
        assert!(dump.contains("DELE"));
        assert!(dump.contains("PUBK(2) = aaaa"));
        assert!(dump.contains("INDX(4) = 00000000"));
    }
}
