use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fields::m31::M31;
use crate::hash::{Hash, MerkleHasher};
use crate::vcs::hash_layer_node;

/// The two witness streams a decommitment carries, consumed in ascending
/// node-index order during the bottom-up verification walk. §4.D.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MerkleDecommitment {
    /// Sibling hashes for nodes that aren't themselves on the path to any
    /// queried leaf.
    pub hash_witness: Vec<Hash>,
    /// Row values, for columns attached below the tree's max log-size, at
    /// nodes on the path to a queried leaf that weren't already supplied in
    /// `queried_values`.
    pub column_witness: Vec<M31>,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MerkleVerificationError {
    #[error("hash witness ran out before the root was reached")]
    WitnessTooShort,
    #[error("hash witness was not fully consumed")]
    WitnessTooLong,
    #[error("too few queried values were supplied for the declared columns")]
    TooFewQueriedValues,
    #[error("too many queried values were supplied for the declared columns")]
    TooManyQueriedValues,
    #[error("recomputed root does not match the committed root")]
    RootMismatch,
}

/// Verifies decommitments against a single committed root, given only the
/// declared log-size of each column (the shape the prover committed to, not
/// the column contents).
pub struct MerkleVerifier<H> {
    root: Hash,
    column_log_sizes: Vec<u32>,
    max_log_size: u32,
    _hasher: std::marker::PhantomData<H>,
}

impl<H: MerkleHasher> MerkleVerifier<H> {
    pub fn new(root: Hash, column_log_sizes: Vec<u32>) -> Self {
        let max_log_size = *column_log_sizes.iter().max().expect("at least one column");
        Self {
            root,
            column_log_sizes,
            max_log_size,
            _hasher: std::marker::PhantomData,
        }
    }

    pub fn root(&self) -> Hash {
        self.root
    }

    pub fn column_log_sizes(&self) -> &[u32] {
        &self.column_log_sizes
    }

    pub fn max_log_size(&self) -> u32 {
        self.max_log_size
    }

    /// Recompute the root from a query set, the prover's claimed values for
    /// every column at those queries, and the decommitment witness streams,
    /// and check it matches the committed root.
    pub fn verify(
        &self,
        queries: &[usize],
        queried_values: &[Vec<M31>],
        decommitment: &MerkleDecommitment,
    ) -> Result<(), MerkleVerificationError> {
        if queried_values.len() != self.column_log_sizes.len() {
            return Err(MerkleVerificationError::TooFewQueriedValues);
        }
        for values in queried_values {
            if values.len() < queries.len() {
                return Err(MerkleVerificationError::TooFewQueriedValues);
            }
            if values.len() > queries.len() {
                return Err(MerkleVerificationError::TooManyQueriedValues);
            }
        }

        let mut sorted_queries = queries.to_vec();
        sorted_queries.sort_unstable();
        sorted_queries.dedup();

        let leaf_cols: Vec<usize> = (0..self.column_log_sizes.len())
            .filter(|&i| self.column_log_sizes[i] == self.max_log_size)
            .collect();
        // Map each original query to its position in `queries`, to index
        // into `queried_values` (which is aligned with the caller's
        // un-deduplicated query list).
        let query_pos: BTreeMap<usize, usize> = queries
            .iter()
            .enumerate()
            .map(|(i, &q)| (q, i))
            .collect();

        let mut needed: BTreeMap<usize, Hash> = BTreeMap::new();
        for &q in &sorted_queries {
            let pos = query_pos[&q];
            let row_values: Vec<M31> = leaf_cols.iter().map(|&c| queried_values[c][pos]).collect();
            needed.insert(q, hash_layer_node::<H>(None, &row_values));
        }

        let mut hash_witness = decommitment.hash_witness.iter().copied();
        let mut column_witness = decommitment.column_witness.iter().copied();

        for l in (1..=self.max_log_size).rev() {
            let mut parents: Vec<usize> = needed.keys().map(|&row| row >> 1).collect();
            parents.dedup();

            let cols_here: Vec<usize> = (0..self.column_log_sizes.len())
                .filter(|&i| self.column_log_sizes[i] == l - 1)
                .collect();

            // A `cols_here` column's value at a parent row is already bound
            // to the root through `queried_values` whenever that row is
            // itself one of the original queries at this layer's
            // resolution; only the verifier's witness stream supplies the
            // rest.
            let shift = self.max_log_size - (l - 1);
            let layer_query_pos: BTreeMap<usize, usize> = queries
                .iter()
                .enumerate()
                .map(|(i, &q)| (q >> shift, i))
                .collect();

            let mut next_needed = BTreeMap::new();
            for &p in &parents {
                let mut child_hash = |child: usize| -> Result<Hash, MerkleVerificationError> {
                    if let Some(h) = needed.get(&child) {
                        Ok(*h)
                    } else {
                        hash_witness
                            .next()
                            .ok_or(MerkleVerificationError::WitnessTooShort)
                    }
                };
                let left = child_hash(2 * p)?;
                let right = child_hash(2 * p + 1)?;

                let mut row_values = Vec::with_capacity(cols_here.len());
                for &c in &cols_here {
                    let value = if let Some(&i) = layer_query_pos.get(&p) {
                        queried_values[c][i]
                    } else {
                        column_witness
                            .next()
                            .ok_or(MerkleVerificationError::WitnessTooShort)?
                    };
                    row_values.push(value);
                }
                let hash = hash_layer_node::<H>(Some((left, right)), &row_values);
                next_needed.insert(p, hash);
            }
            needed = next_needed;
        }

        if hash_witness.next().is_some() || column_witness.next().is_some() {
            return Err(MerkleVerificationError::WitnessTooLong);
        }

        let root = needed.get(&0).copied().ok_or(MerkleVerificationError::RootMismatch)?;
        if root == self.root {
            Ok(())
        } else {
            Err(MerkleVerificationError::RootMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Blake2sMerkleHasher;
    use crate::vcs::prover::MerkleProver;

    fn col(log_size: u32, seed: u32) -> Vec<M31> {
        (0..1u32 << log_size)
            .map(|i| M31::from_u64((seed.wrapping_mul(7919).wrapping_add(i)) as u64))
            .collect()
    }

    #[test]
    fn round_trips_single_column() {
        let columns = vec![col(4, 1)];
        let prover = MerkleProver::<Blake2sMerkleHasher>::commit(columns);
        let queries = vec![0usize, 3, 5, 15];
        let (queried_values, decommitment) = prover.decommit(&queries);
        let verifier = MerkleVerifier::<Blake2sMerkleHasher>::new(
            prover.root(),
            prover.column_log_sizes().to_vec(),
        );
        assert!(verifier
            .verify(&queries, &queried_values, &decommitment)
            .is_ok());
    }

    #[test]
    fn round_trips_mixed_degree_columns() {
        let columns = vec![col(4, 1), col(2, 2), col(4, 3), col(1, 4)];
        let prover = MerkleProver::<Blake2sMerkleHasher>::commit(columns);
        let queries = vec![0usize, 1, 6, 9, 14];
        let (queried_values, decommitment) = prover.decommit(&queries);
        let verifier = MerkleVerifier::<Blake2sMerkleHasher>::new(
            prover.root(),
            prover.column_log_sizes().to_vec(),
        );
        assert!(verifier
            .verify(&queries, &queried_values, &decommitment)
            .is_ok());
    }

    #[test]
    fn tampered_queried_value_is_rejected() {
        let columns = vec![col(3, 1), col(2, 5)];
        let prover = MerkleProver::<Blake2sMerkleHasher>::commit(columns);
        let queries = vec![0usize, 2, 5];
        let (mut queried_values, decommitment) = prover.decommit(&queries);
        queried_values[0][0] = queried_values[0][0] + M31::from_u64(1);
        let verifier = MerkleVerifier::<Blake2sMerkleHasher>::new(
            prover.root(),
            prover.column_log_sizes().to_vec(),
        );
        assert_eq!(
            verifier.verify(&queries, &queried_values, &decommitment),
            Err(MerkleVerificationError::RootMismatch)
        );
    }

    #[test]
    fn tampered_hash_witness_is_rejected() {
        let columns = vec![col(4, 9), col(2, 11)];
        let prover = MerkleProver::<Blake2sMerkleHasher>::commit(columns);
        let queries = vec![1usize, 12];
        let (queried_values, mut decommitment) = prover.decommit(&queries);
        assert!(!decommitment.hash_witness.is_empty());
        decommitment.hash_witness[0].0[0] ^= 0xff;
        let verifier = MerkleVerifier::<Blake2sMerkleHasher>::new(
            prover.root(),
            prover.column_log_sizes().to_vec(),
        );
        assert_eq!(
            verifier.verify(&queries, &queried_values, &decommitment),
            Err(MerkleVerificationError::RootMismatch)
        );
    }
}
