//! Sealed blocks: header, ordered transactions and the proof-of-work hash.

use crate::core::transaction::Transaction;
use crate::types::encoding::Encode;
use crate::types::hash::{Hash, HashBuilder};
use crate::types::merkle_tree::MerkleTree;
use ledger_derive::BinaryCodec;

/// `previous_hash` of the genesis block.
pub const ROOT_MARKER: Hash = Hash::zero();

/// Highest accepted mining difficulty, in leading zero hex characters.
pub const MAX_DIFFICULTY: u8 = 6;

/// Block metadata. Everything except `nonce` is fixed when the block is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Header {
    /// Position in the chain (genesis = 0)
    pub index: u64,
    /// Seal time, nanoseconds since the Unix epoch
    pub timestamp: u64,
    /// Hash of the preceding block, [`ROOT_MARKER`] for genesis
    pub previous_hash: Hash,
    /// Merkle root of `transactions`
    pub merkle_root: Hash,
    pub nonce: u64,
}

/// An immutable, sealed block.
///
/// `hash` is stored alongside the header and never trusted: validation
/// recomputes it from the header and the transactions.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct Block {
    pub header: Header,
    pub transactions: Box<[Transaction]>,
    pub hash: Hash,
}

impl Block {
    /// Builds an unmined block (nonce 0) and computes its merkle root and hash.
    pub fn new(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        previous_hash: Hash,
    ) -> Self {
        let merkle_root = MerkleTree::from_transactions(&transactions);
        let mut block = Self {
            header: Header {
                index,
                timestamp,
                previous_hash,
                merkle_root,
                nonce: 0,
            },
            transactions: transactions.into_boxed_slice(),
            hash: Hash::zero(),
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn index(&self) -> u64 {
        self.header.index
    }

    /// Hasher fed with every hashed field that precedes the nonce.
    fn prefix_hasher(&self) -> HashBuilder {
        let mut h = Hash::sha3();
        self.header.index.encode(&mut h);
        self.header.timestamp.encode(&mut h);
        self.transactions.encode(&mut h);
        self.header.previous_hash.encode(&mut h);
        self.header.merkle_root.encode(&mut h);
        h
    }

    /// Hash of `index, timestamp, transactions, previous_hash, merkle_root,
    /// nonce` in canonical encoding.
    pub fn compute_hash(&self) -> Hash {
        let mut h = self.prefix_hasher();
        self.header.nonce.encode(&mut h);
        h.finalize()
    }

    /// Searches nonces from 0 upward until the hash starts with `difficulty`
    /// zero hex characters, then stores the nonce and hash.
    ///
    /// Returns the number of attempts. Difficulty above [`MAX_DIFFICULTY`] is
    /// clamped.
    pub fn mine(&mut self, difficulty: u8) -> u64 {
        let difficulty = difficulty.min(MAX_DIFFICULTY);
        let prefix = self.prefix_hasher();

        let mut nonce = 0u64;
        loop {
            let mut h = prefix.clone();
            nonce.encode(&mut h);
            let hash = h.finalize();
            if hash.meets_difficulty(difficulty) {
                self.header.nonce = nonce;
                self.hash = hash;
                return nonce + 1;
            }
            nonce += 1;
        }
    }

    /// True when the stored hash equals the recomputed one.
    pub fn verify_hash(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// True when the stored merkle root commits to the stored transactions.
    pub fn verify_merkle_root(&self) -> bool {
        MerkleTree::from_transactions(&self.transactions) == self.header.merkle_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::Payload;
    use crate::types::encoding::Decode;
    use crate::utils::test_utils::utils::{award, citizen_query, payment, tx_at};

    fn sample_block() -> Block {
        Block::new(
            3,
            1_000,
            vec![tx_at(award("123/4"), 10), tx_at(payment("123/4"), 11)],
            Hash::digest(b"parent"),
        )
    }

    #[test]
    fn new_block_is_self_consistent() {
        let block = sample_block();
        assert_eq!(block.header.nonce, 0);
        assert!(block.verify_hash());
        assert!(block.verify_merkle_root());
    }

    #[test]
    fn mine_meets_difficulty_and_verifies() {
        for difficulty in 0..=3u8 {
            let mut block = sample_block();
            block.mine(difficulty);
            assert!(block.hash.meets_difficulty(difficulty));
            assert!(block.verify_hash());
        }
    }

    #[test]
    fn mine_at_zero_difficulty_keeps_first_nonce() {
        let mut block = sample_block();
        assert_eq!(block.mine(0), 1);
        assert_eq!(block.header.nonce, 0);
    }

    #[test]
    fn mine_is_deterministic() {
        let mut a = sample_block();
        let mut b = sample_block();
        a.mine(2);
        b.mine(2);
        assert_eq!(a.header.nonce, b.header.nonce);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn mined_hash_equals_full_recompute() {
        let mut block = sample_block();
        block.mine(2);

        let mut h = Hash::sha3();
        block.header.index.encode(&mut h);
        block.header.timestamp.encode(&mut h);
        block.transactions.encode(&mut h);
        block.header.previous_hash.encode(&mut h);
        block.header.merkle_root.encode(&mut h);
        block.header.nonce.encode(&mut h);
        assert_eq!(h.finalize(), block.hash);
    }

    #[test]
    fn every_header_field_is_committed() {
        let mut block = sample_block();
        block.mine(1);

        let mut tampered = block.clone();
        tampered.header.index += 1;
        assert!(!tampered.verify_hash());

        let mut tampered = block.clone();
        tampered.header.timestamp += 1;
        assert!(!tampered.verify_hash());

        let mut tampered = block.clone();
        tampered.header.previous_hash = Hash::digest(b"other");
        assert!(!tampered.verify_hash());

        let mut tampered = block.clone();
        tampered.header.merkle_root = Hash::digest(b"other");
        assert!(!tampered.verify_hash());

        let mut tampered = block.clone();
        tampered.header.nonce += 1;
        assert!(!tampered.verify_hash());
    }

    #[test]
    fn editing_a_transaction_breaks_hash_and_root() {
        let mut block = sample_block();
        block.mine(1);

        let mut txs = block.transactions.to_vec();
        if let Payload::AwardDeclaration(a) = &mut txs[0].payload {
            a.village = "Kharadi".into();
        }
        block.transactions = txs.into_boxed_slice();

        assert!(!block.verify_hash());
        assert!(!block.verify_merkle_root());
    }

    #[test]
    fn stored_bytes_keep_nonce_and_hash() {
        let mut block = Block::new(1, 5, vec![tx_at(citizen_query("8/2"), 4)], ROOT_MARKER);
        block.mine(2);
        let restored = Block::from_bytes(&block.to_bytes()).unwrap();
        assert_eq!(restored, block);
        assert!(restored.verify_hash());
    }
}
