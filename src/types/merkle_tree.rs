//! Merkle commitment over the ordered transactions of a block.
//!
//! - No leaves: the digest of the empty byte string.
//! - Leaves are digests of each transaction's canonical encoding.
//! - Each level hashes adjacent pairs (`left ++ right`); an odd level repeats
//!   its last node.
//!
//! Order is part of the commitment: swapping two transactions changes the root.

use crate::core::transaction::Transaction;
use crate::types::encoding::Encode;
use crate::types::hash::Hash;

pub struct MerkleTree;

impl MerkleTree {
    fn hash_pair(left: Hash, right: Hash) -> Hash {
        Hash::sha3()
            .chain(left.as_slice())
            .chain(right.as_slice())
            .finalize()
    }

    /// Root of the empty tree.
    pub fn empty_root() -> Hash {
        Hash::digest(&[])
    }

    /// Leaf digest for one transaction.
    pub fn leaf(tx: &Transaction) -> Hash {
        let mut h = Hash::sha3();
        tx.encode(&mut h);
        h.finalize()
    }

    /// Reduces `nodes` in place to a single root.
    pub fn from_leaves(mut nodes: Vec<Hash>) -> Hash {
        if nodes.is_empty() {
            return Self::empty_root();
        }

        let mut len = nodes.len();
        while len > 1 {
            let mut write = 0;
            for read in (0..len).step_by(2) {
                let left = nodes[read];
                let right = if read + 1 < len { nodes[read + 1] } else { left };
                nodes[write] = Self::hash_pair(left, right);
                write += 1;
            }
            len = write;
        }

        nodes[0]
    }

    pub fn from_transactions(txs: &[Transaction]) -> Hash {
        Self::from_leaves(txs.iter().map(Self::leaf).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::utils::{award, citizen_query, tx_at};

    fn leaf(data: &[u8]) -> Hash {
        Hash::digest(data)
    }

    #[test]
    fn empty_is_digest_of_empty_bytes() {
        assert_eq!(MerkleTree::from_leaves(Vec::new()), Hash::digest(b""));
        assert_eq!(MerkleTree::from_transactions(&[]), MerkleTree::empty_root());
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let a = leaf(b"a");
        assert_eq!(MerkleTree::from_leaves(vec![a]), a);
    }

    #[test]
    fn four_leaves_reduce_pairwise() {
        let (a, b, c, d) = (leaf(b"a"), leaf(b"b"), leaf(b"c"), leaf(b"d"));
        let expected = MerkleTree::hash_pair(
            MerkleTree::hash_pair(a, b),
            MerkleTree::hash_pair(c, d),
        );
        assert_eq!(MerkleTree::from_leaves(vec![a, b, c, d]), expected);
    }

    #[test]
    fn odd_level_duplicates_last_node() {
        let (a, b, c) = (leaf(b"a"), leaf(b"b"), leaf(b"c"));
        let expected = MerkleTree::hash_pair(
            MerkleTree::hash_pair(a, b),
            MerkleTree::hash_pair(c, c),
        );
        assert_eq!(MerkleTree::from_leaves(vec![a, b, c]), expected);
    }

    #[test]
    fn pair_is_plain_concatenation() {
        let (a, b) = (leaf(b"a"), leaf(b"b"));
        let mut joined = a.0.to_vec();
        joined.extend_from_slice(&b.0);
        assert_eq!(MerkleTree::hash_pair(a, b), Hash::digest(&joined));
    }

    #[test]
    fn root_is_deterministic() {
        let txs = vec![tx_at(award("123/4"), 1), tx_at(citizen_query("77/1"), 2)];
        let first = MerkleTree::from_transactions(&txs);
        for _ in 0..5 {
            assert_eq!(MerkleTree::from_transactions(&txs), first);
        }
        assert_eq!(MerkleTree::from_transactions(&txs.clone()), first);
    }

    #[test]
    fn order_changes_root() {
        let a = tx_at(award("123/4"), 1);
        let b = tx_at(citizen_query("77/1"), 2);
        assert_ne!(
            MerkleTree::from_transactions(&[a.clone(), b.clone()]),
            MerkleTree::from_transactions(&[b, a])
        );
    }

    #[test]
    fn leaf_commits_to_the_full_record() {
        let a = tx_at(award("123/4"), 1);
        let b = tx_at(award("123/4"), 2);
        assert_ne!(MerkleTree::leaf(&a), MerkleTree::leaf(&b));
    }
}
