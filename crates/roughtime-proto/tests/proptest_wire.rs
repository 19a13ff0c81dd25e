use proptest::prelude::*;

use roughtime_proto::builder::MessageBuilder;
use roughtime_proto::tag::Tag;
use roughtime_proto::wire::Message;

const ALL_TAGS: [Tag; 14] = [
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

/// Strategy producing a non-empty set of distinct tags with arbitrary values.
fn arb_entries() -> impl Strategy<Value = Vec<(Tag, Vec<u8>)>> {
    prop::collection::btree_set(0usize..ALL_TAGS.len(), 1..=ALL_TAGS.len()).prop_flat_map(|idxs| {
        let tags: Vec<Tag> = idxs.into_iter().map(|i| ALL_TAGS[i]).collect();
        let len = tags.len();
        (
            Just(tags),
            prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), len),
        )
            .prop_map(|(tags, values)| tags.into_iter().zip(values).collect())
    })
}

fn build(entries: &[(Tag, Vec<u8>)]) -> Message {
    let mut builder = MessageBuilder::new();
    for (tag, value) in entries {
        builder = builder.add(*tag, value.clone());
    }
    builder.build().unwrap()
}

proptest! {
    /// decode(encode(m)) == m for every valid message.
    #[test]
    fn roundtrip(entries in arb_entries()) {
        let msg = build(&entries);
        let encoded = msg.encode();
        let decoded = Message::parse(&encoded).unwrap();
        prop_assert_eq!(&msg, &decoded);
        for (tag, value) in &entries {
            prop_assert_eq!(decoded.get(*tag), Some(value.as_slice()));
        }
    }

    /// The computed encoded size always matches the actual encoding length.
    #[test]
    fn encoded_size_law(entries in arb_entries()) {
        let msg = build(&entries);
        prop_assert_eq!(msg.encoded_size(), msg.encode().len());
    }

    /// Arbitrary bytes either parse or fail cleanly; a successful parse
    /// re-encodes to a message equal to itself.
    #[test]
    fn parse_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(msg) = Message::parse(&bytes) {
            let reparsed = Message::parse(&msg.encode()).unwrap();
            prop_assert_eq!(msg, reparsed);
        }
    }

    /// Padded requests always encode to at least the 1024-byte minimum.
    #[test]
    fn padded_request_reaches_minimum(nonce in prop::collection::vec(any::<u8>(), 64)) {
        let msg = MessageBuilder::new()
            .pad_to_minimum(true)
            .add(Tag::Nonc, nonce)
            .build()
            .unwrap();
        prop_assert_eq!(msg.encode().len(), 1024);
    }
}
