//! Sorted-pair keccak256 Merkle tree over depositor keys.
//!
//! A leaf is `keccak256(pubkey)`. Interior nodes hash the two children in
//! ascending byte order, so proofs carry no left/right flags. A node without
//! a sibling is promoted to the next layer unchanged.

use anchor_lang::prelude::*;
use anchor_lang::solana_program::keccak::hashv;

pub type MerkleNode = [u8; 32];

pub fn leaf_hash(account: &Pubkey) -> MerkleNode {
    hashv(&[account.as_ref()]).to_bytes()
}

pub fn hash_pair(a: &MerkleNode, b: &MerkleNode) -> MerkleNode {
    if a <= b {
        hashv(&[a.as_ref(), b.as_ref()]).to_bytes()
    } else {
        hashv(&[b.as_ref(), a.as_ref()]).to_bytes()
    }
}

pub fn compute_root(leaf: MerkleNode, proof: &[MerkleNode]) -> MerkleNode {
    proof
        .iter()
        .fold(leaf, |computed, sibling| hash_pair(&computed, sibling))
}

pub fn verify(account: &Pubkey, proof: &[MerkleNode], root: &MerkleNode) -> bool {
    compute_root(leaf_hash(account), proof) == *root
}

/// Builds allowlist roots and per-account proofs off-chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowlistTree {
    layers: Vec<Vec<MerkleNode>>,
}

impl AllowlistTree {
    pub fn new(accounts: &[Pubkey]) -> Self {
        let mut leaves: Vec<MerkleNode> = accounts.iter().map(leaf_hash).collect();
        leaves.sort_unstable();
        leaves.dedup();

        let mut layers = vec![leaves];
        while let Some(layer) = layers.last() {
            if layer.len() <= 1 {
                break;
            }
            let next: Vec<MerkleNode> = layer
                .chunks(2)
                .map(|pair| {
                    pair.iter()
                        .copied()
                        .reduce(|left, right| hash_pair(&left, &right))
                        .unwrap_or_default()
                })
                .collect();
            layers.push(next);
        }

        Self { layers }
    }

    /// Zeroed when the tree has no leaves.
    pub fn root(&self) -> MerkleNode {
        self.layers
            .last()
            .and_then(|layer| layer.first())
            .copied()
            .unwrap_or_default()
    }

    pub fn proof(&self, account: &Pubkey) -> Option<Vec<MerkleNode>> {
        let leaf = leaf_hash(account);
        let mut index = self.layers.first()?.binary_search(&leaf).ok()?;

        let mut proof = vec![];
        for layer in self.layers.iter().take(self.layers.len().saturating_sub(1)) {
            let sibling = index ^ 1;
            if let Some(node) = layer.get(sibling) {
                proof.push(*node);
            }
            index /= 2;
        }

        Some(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_member_verifies() {
        let accounts: Vec<Pubkey> = (0..5).map(|_| Pubkey::new_unique()).collect();
        let tree = AllowlistTree::new(&accounts);
        let root = tree.root();

        for account in accounts.iter() {
            let proof = tree.proof(account).unwrap();
            assert!(verify(account, &proof, &root));
        }

        let outsider = Pubkey::new_unique();
        assert!(tree.proof(&outsider).is_none());
        assert!(!verify(&outsider, &[], &root));
    }

    #[test]
    fn proof_is_bound_to_its_leaf() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let carol = Pubkey::new_unique();
        let tree = AllowlistTree::new(&[alice, bob, carol]);
        let root = tree.root();

        let alice_proof = tree.proof(&alice).unwrap();
        assert!(verify(&alice, &alice_proof, &root));
        assert!(!verify(&bob, &alice_proof, &root));

        let mallory = Pubkey::new_unique();
        assert!(!verify(&mallory, &alice_proof, &root));
    }

    #[test]
    fn single_leaf_tree() {
        let alice = Pubkey::new_unique();
        let tree = AllowlistTree::new(&[alice]);
        assert_eq!(tree.root(), leaf_hash(&alice));
        assert_eq!(tree.proof(&alice).unwrap(), Vec::<MerkleNode>::new());

        assert_eq!(AllowlistTree::new(&[]).root(), [0u8; 32]);
    }

    #[test]
    fn pair_hash_is_order_independent() {
        let a = leaf_hash(&Pubkey::new_unique());
        let b = leaf_hash(&Pubkey::new_unique());
        assert_eq!(hash_pair(&a, &b), hash_pair(&b, &a));
    }
}
