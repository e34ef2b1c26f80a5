//! # In-Memory Sparse Merkle Tree
//!
//! An iden3-compatible sparse Merkle tree held in memory. It backs the
//! identity claims, revocation and roots trees of test identities and the
//! global identity state tree of mock state storage, so proofs handed to
//! the input generator are real proofs.
//!
//! ## Algorithm
//!
//! Insertion walks the key path from the root. Reaching an empty node
//! stores the leaf there. Reaching a leaf pushes both leaves down until
//! their paths diverge, creating a chain of middle nodes. Insertion fails
//! once the path would exceed `max_levels`.

use std::collections::HashMap;

use crate::error::{CoreError, TreeError};
use crate::field::Hash;
use crate::merkle::{self, leaf_hash, middle_hash, NodeAux, Proof, MAX_DEPTH};

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf { key: Hash, value: Hash },
    Middle { left: Hash, right: Hash },
}

/// Sparse Merkle tree with a fixed maximum depth.
#[derive(Debug, Clone)]
pub struct SparseMerkleTree {
    max_levels: usize,
    root: Hash,
    nodes: HashMap<Hash, Node>,
}

impl SparseMerkleTree {
    /// An empty tree.
    pub fn new(max_levels: usize) -> Self {
        Self {
            max_levels: max_levels.min(MAX_DEPTH),
            root: Hash::ZERO,
            nodes: HashMap::new(),
        }
    }

    /// Current root.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Maximum depth.
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Insert a new entry.
    pub fn add(&mut self, key: Hash, value: Hash) -> Result<(), CoreError> {
        let leaf_key = leaf_hash(&key, &value)?;
        let root = self.add_leaf(key, value, leaf_key, self.root, 0)?;
        self.root = root;
        Ok(())
    }

    fn add_leaf(
        &mut self,
        key: Hash,
        value: Hash,
        leaf_key: Hash,
        current: Hash,
        lvl: usize,
    ) -> Result<Hash, CoreError> {
        if lvl + 1 > self.max_levels {
            return Err(TreeError::MaxLevelReached(self.max_levels).into());
        }
        if current.is_zero() {
            self.nodes.insert(leaf_key, Node::Leaf { key, value });
            return Ok(leaf_key);
        }
        match self.node(&current)? {
            Node::Leaf { key: old_key, .. } => {
                if old_key == key {
                    return Err(TreeError::EntryExists(key.to_decimal()).into());
                }
                self.nodes.insert(leaf_key, Node::Leaf { key, value });
                self.push_leaf(key, leaf_key, old_key, current, lvl)
            }
            Node::Middle { left, right } => {
                let node = if key.test_bit(lvl) {
                    let next = self.add_leaf(key, value, leaf_key, right, lvl + 1)?;
                    Node::Middle { left, right: next }
                } else {
                    let next = self.add_leaf(key, value, leaf_key, left, lvl + 1)?;
                    Node::Middle { left: next, right }
                };
                self.store_middle(node)
            }
        }
    }

    fn push_leaf(
        &mut self,
        new_key: Hash,
        new_leaf: Hash,
        old_key: Hash,
        old_leaf: Hash,
        lvl: usize,
    ) -> Result<Hash, CoreError> {
        if lvl + 2 > self.max_levels {
            return Err(TreeError::MaxLevelReached(self.max_levels).into());
        }
        let new_bit = new_key.test_bit(lvl);
        if new_bit == old_key.test_bit(lvl) {
            let next = self.push_leaf(new_key, new_leaf, old_key, old_leaf, lvl + 1)?;
            let node = if new_bit {
                Node::Middle { left: Hash::ZERO, right: next }
            } else {
                Node::Middle { left: next, right: Hash::ZERO }
            };
            return self.store_middle(node);
        }
        let node = if new_bit {
            Node::Middle { left: old_leaf, right: new_leaf }
        } else {
            Node::Middle { left: new_leaf, right: old_leaf }
        };
        self.store_middle(node)
    }

    fn store_middle(&mut self, node: Node) -> Result<Hash, CoreError> {
        let key = match node {
            Node::Middle { left, right } => middle_hash(&left, &right)?,
            Node::Leaf { key, value } => leaf_hash(&key, &value)?,
        };
        self.nodes.insert(key, node);
        Ok(key)
    }

    fn node(&self, key: &Hash) -> Result<Node, CoreError> {
        self.nodes
            .get(key)
            .copied()
            .ok_or_else(|| TreeError::NodeNotFound(key.to_decimal()).into())
    }

    /// Value stored under `key`, if any.
    pub fn get(&self, key: &Hash) -> Result<Option<Hash>, CoreError> {
        let (proof, value) = self.generate_proof(key)?;
        Ok(proof.existence().then_some(value))
    }

    /// Inclusion or non-inclusion proof for `key` against the current root,
    /// with the stored value (zero when absent).
    pub fn generate_proof(&self, key: &Hash) -> Result<(Proof, Hash), CoreError> {
        self.generate_proof_at(key, self.root)
    }

    /// Proof for `key` against a historical `root` still held in storage.
    pub fn generate_proof_at(&self, key: &Hash, root: Hash) -> Result<(Proof, Hash), CoreError> {
        let mut notempties = [0u8; MAX_DEPTH / 8];
        let mut siblings = Vec::new();
        let mut next = root;

        for depth in 0..self.max_levels {
            if next.is_zero() {
                let proof = Proof::new(false, depth, notempties, siblings, None)?;
                return Ok((proof, Hash::ZERO));
            }
            match self.node(&next)? {
                Node::Leaf { key: leaf_key, value } => {
                    if leaf_key == *key {
                        let proof = Proof::new(true, depth, notempties, siblings, None)?;
                        return Ok((proof, value));
                    }
                    let aux = NodeAux { key: leaf_key, value };
                    let proof = Proof::new(false, depth, notempties, siblings, Some(aux))?;
                    return Ok((proof, Hash::ZERO));
                }
                Node::Middle { left, right } => {
                    let sibling = if key.test_bit(depth) {
                        next = right;
                        left
                    } else {
                        next = left;
                        right
                    };
                    if !sibling.is_zero() {
                        merkle::set_notempty(&mut notempties, depth);
                        siblings.push(sibling);
                    }
                }
            }
        }
        Err(TreeError::MaxLevelReached(self.max_levels).into())
    }
}
