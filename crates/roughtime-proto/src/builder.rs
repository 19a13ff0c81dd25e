//! Message construction.
//!
//! The builder keeps entries sorted by tag wire value (a `BTreeMap` keyed on
//! [`Tag`], whose ordering is the wire ordering) and can pad a request up to
//! the protocol's 1024-byte minimum with a `PAD` entry.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::WireError;
use crate::tag::Tag;
use crate::wire::{compute_encoded_size, Message};
use crate::MIN_REQUEST_LENGTH;

/// Bytes a PAD entry adds beyond its value: its tag code and its slot in the
/// offset table.
const PAD_OVERHEAD: usize = 8;

/// Accumulates tag-value pairs and produces an immutable [`Message`].
#[derive(Debug, Default)]
pub struct MessageBuilder {
    map: BTreeMap<Tag, Vec<u8>>,
    pad_to_minimum: bool,
}

impl MessageBuilder {
    /// Create an empty builder.
    pub fn new() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Add a tag with an opaque byte-string value.
    ///
    /// Adding the same tag twice replaces the earlier value.
    pub fn add(mut self, tag: Tag, value: Vec<u8>) -> MessageBuilder {
        self.map.insert(tag, value);
        self
    }

    /// Add a tag whose value is a nested message, canonically encoded.
    pub fn add_message(self, tag: Tag, msg: &Message) -> MessageBuilder {
        self.add(tag, msg.encode())
    }

    /// Request padding up to the 1024-byte minimum request size.
    ///
    /// If the built message would encode below the minimum, a `PAD` entry is
    /// synthesized with exactly enough zero bytes to reach it.
    pub fn pad_to_minimum(mut self, pad: bool) -> MessageBuilder {
        self.pad_to_minimum = pad;
        self
    }

    /// Build the message. Fails with `EmptyMessage` if nothing was added.
    pub fn build(mut self) -> Result<Message, WireError> {
        if self.map.is_empty() {
            return Err(WireError::EmptyMessage);
        }

        let encoded_size = compute_encoded_size(&self.map);
        if self.pad_to_minimum && encoded_size < MIN_REQUEST_LENGTH {
            // The PAD tag and offset entry may by themselves be enough to
            // reach the minimum, leaving a zero-length pad value.
            let padding = MIN_REQUEST_LENGTH.saturating_sub(encoded_size + PAD_OVERHEAD);
            self.map.insert(Tag::Pad, vec![0u8; padding]);
        }

        Ok(Message::from_map(self.map))
    }
}
