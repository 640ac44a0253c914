//! Off-chain mirror of the committed tree

use tokio::sync::RwLock;

use mytree_merkle::{Field, FieldHasher, Keccak256Hasher, MerkleResult, MerkleTree, MerkleWitness};

/// Full tree kept alongside the ledger, which itself only stores the root
#[derive(Debug, Default)]
pub struct Mirror<const DEPTH: usize, H: FieldHasher = Keccak256Hasher> {
    tree: RwLock<MerkleTree<DEPTH, H>>,
}

impl<const DEPTH: usize, H: FieldHasher> Mirror<DEPTH, H> {
    /// Create a mirror over an empty tree
    pub fn new() -> Self {
        Self::from_tree(MerkleTree::new())
    }

    /// Create a mirror over an existing tree
    pub fn from_tree(tree: MerkleTree<DEPTH, H>) -> Self {
        Self {
            tree: RwLock::new(tree),
        }
    }

    /// Current root
    pub async fn root(&self) -> Field {
        self.tree.read().await.root()
    }

    /// Witness for `index`
    pub async fn witness(&self, index: u64) -> MerkleResult<MerkleWitness<DEPTH>> {
        self.tree.read().await.witness(index)
    }

    /// Leaf content at `index`
    pub async fn leaf(&self, index: u64) -> MerkleResult<Field> {
        self.tree.read().await.leaf(index)
    }

    /// Write a leaf, returning the new root
    pub async fn set_leaf(&self, index: u64, value: Field) -> MerkleResult<Field> {
        let mut tree = self.tree.write().await;
        tree.set_leaf(index, value)?;
        Ok(tree.root())
    }

    /// Number of non-empty leaves
    pub async fn occupied(&self) -> usize {
        self.tree.read().await.occupied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_leaf_moves_root() {
        let mirror = Mirror::<7, Keccak256Hasher>::new();
        let empty = mirror.root().await;

        let root = mirror.set_leaf(4, Field::from_u64(9)).await.unwrap();
        assert_ne!(root, empty);
        assert_eq!(mirror.root().await, root);
        assert_eq!(mirror.leaf(4).await.unwrap(), Field::from_u64(9));

        let witness = mirror.witness(4).await.unwrap();
        assert_eq!(witness.calculate_root::<Keccak256Hasher>(&Field::from_u64(9)), root);
        assert!(mirror.witness(128).await.is_err());
    }
}
