use crate::core::Transaction;
use crate::utils::{sha256_digest, HASH_LEN};

/// Root committed to by `Header::root_hash` for an empty block.
pub const EMPTY_ROOT: [u8; HASH_LEN] = [0u8; HASH_LEN];

/// Merkle root over the transaction digests, in block order.
pub fn calculate_root_hash(transactions: &[Transaction]) -> [u8; HASH_LEN] {
    let leaves: Vec<[u8; HASH_LEN]> = transactions.iter().map(Transaction::hash).collect();
    root_from_hashes(&leaves)
}

/// Builds the tree level by level. A lone node at the end of a level is
/// paired with itself, and a single leaf is still hashed once with itself so
/// the root is never a raw transaction digest.
pub fn root_from_hashes(leaves: &[[u8; HASH_LEN]]) -> [u8; HASH_LEN] {
    if leaves.is_empty() {
        return EMPTY_ROOT;
    }

    let mut level = leaves.to_vec();
    loop {
        let next: Vec<[u8; HASH_LEN]> = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                hash_pair(left, right)
            })
            .collect();
        if next.len() == 1 {
            return next[0];
        }
        level = next;
    }
}

fn hash_pair(left: &[u8], right: &[u8]) -> [u8; HASH_LEN] {
    let mut combined = Vec::with_capacity(left.len() + right.len());
    combined.extend_from_slice(left);
    combined.extend_from_slice(right);
    sha256_digest(&combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root_is_zero() {
        assert_eq!(calculate_root_hash(&[]), EMPTY_ROOT);
    }

    #[test]
    fn test_single_leaf_is_paired_with_itself() {
        let leaf = [7u8; HASH_LEN];
        assert_eq!(root_from_hashes(&[leaf]), hash_pair(&leaf, &leaf));
        assert_ne!(root_from_hashes(&[leaf]), leaf);
    }

    #[test]
    fn test_odd_leaf_duplicated() {
        let (a, b, c) = ([1u8; HASH_LEN], [2u8; HASH_LEN], [3u8; HASH_LEN]);
        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &c));
        assert_eq!(root_from_hashes(&[a, b, c]), expected);
    }

    #[test]
    fn test_order_matters() {
        let (a, b) = ([1u8; HASH_LEN], [2u8; HASH_LEN]);
        assert_ne!(root_from_hashes(&[a, b]), root_from_hashes(&[b, a]));
    }
}
