//! SHA-512 Merkle tree hashing and inclusion-proof verification.
//!
//! One server signature covers a whole batch of client nonces: the server
//! publishes the root of a Merkle tree over the batch, and each client
//! recomputes the root from its own nonce, the sibling-hash path, and its
//! leaf index. Leaves and interior nodes are hashed under different one-byte
//! tweaks so a leaf hash can never be confused with a node hash.

use core::fmt;

use ring::digest;

/// Size (in bytes) of a tree hash (full SHA-512 output).
pub const HASH_LENGTH: usize = 64;

/// Byte prepended to leaf data prior to hashing.
pub const TREE_LEAF_TWEAK: u8 = 0x00;

/// Byte prepended to concatenated child hashes prior to hashing.
pub const TREE_NODE_TWEAK: u8 = 0x01;

/// Errors from Merkle inclusion-proof verification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MerkleError {
    /// The root is not exactly 64 bytes.
    InvalidRootLength {
        /// The length found.
        actual: usize,
    },
    /// The path is not a whole number of 64-byte sibling hashes.
    InvalidPathLength {
        /// The length found.
        actual: usize,
    },
    /// A single-leaf proof did not match: the root is not the leaf hash of
    /// the nonce, or the index was nonzero with an empty path.
    NonceNotIncluded,
    /// A multi-leaf path walk did not reproduce the root.
    TreeMismatch,
}

impl fmt::Display for MerkleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MerkleError::InvalidRootLength { actual } => {
                write!(f, "root not {} bytes: {}", HASH_LENGTH, actual)
            }
            MerkleError::InvalidPathLength { actual } => {
                write!(f, "path not a multiple of {} bytes: {}", HASH_LENGTH, actual)
            }
            MerkleError::NonceNotIncluded => {
                write!(f, "nonce not found in response Merkle tree")
            }
            MerkleError::TreeMismatch => {
                write!(f, "Merkle tree path does not reproduce the root")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MerkleError {}

/// `SHA-512(0x00 ‖ data)`.
pub fn hash_leaf(data: &[u8]) -> [u8; HASH_LENGTH] {
    let mut ctx = digest::Context::new(&digest::SHA512);
    ctx.update(&[TREE_LEAF_TWEAK]);
    ctx.update(data);
    finish(ctx)
}

/// `SHA-512(0x01 ‖ left ‖ right)`.
pub fn hash_node(left: &[u8], right: &[u8]) -> [u8; HASH_LENGTH] {
    let mut ctx = digest::Context::new(&digest::SHA512);
    ctx.update(&[TREE_NODE_TWEAK]);
    ctx.update(left);
    ctx.update(right);
    finish(ctx)
}

fn finish(ctx: digest::Context) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    out.copy_from_slice(ctx.finish().as_ref());
    out
}

/// Verify that `nonce` is a leaf of the tree whose root is `root`.
///
/// `path` is the sequence of sibling hashes from the leaf level upward;
/// `index` is the zero-based position of the leaf. At each level the low bit
/// of `index` selects whether the running hash is the left (bit 0) or right
/// (bit 1) child, then `index` shifts right. An empty path is the single-leaf
/// tree: `index` must be 0 and the root must equal the leaf hash exactly.
pub fn verify_inclusion(
    nonce: &[u8],
    root: &[u8],
    path: &[u8],
    index: u32,
) -> Result<(), MerkleError> {
    if root.len() != HASH_LENGTH {
        return Err(MerkleError::InvalidRootLength { actual: root.len() });
    }
    if path.len() % HASH_LENGTH != 0 {
        return Err(MerkleError::InvalidPathLength { actual: path.len() });
    }

    if path.is_empty() {
        if index != 0 || hash_leaf(nonce) != root {
            return Err(MerkleError::NonceNotIncluded);
        }
        return Ok(());
    }

    let mut current = hash_leaf(nonce);
    let mut index = index;
    for sibling in path.chunks_exact(HASH_LENGTH) {
        current = if index & 1 == 0 {
            hash_node(&current, sibling)
        } else {
            hash_node(sibling, &current)
        };
        index >>= 1;
    }

    if current != root {
        return Err(MerkleError::TreeMismatch);
    }

    Ok(())
}
