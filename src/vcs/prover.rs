use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::fields::m31::M31;
use crate::hash::{Hash, MerkleHasher};
use crate::vcs::hash_layer_node;
use crate::vcs::verifier::MerkleDecommitment;

/// A committed mixed-degree Merkle tree: one binary heap-shaped array of
/// node hashes, built bottom-up, with columns of a given log-size attached
/// exactly at the tree layer of that log-size. §4.D.
///
/// `layers[l]` holds `2^l` hashes, `layers[0] = [root]`,
/// `layers[max_log_size]` is the leaf layer.
pub struct MerkleProver<H> {
    columns: Vec<Vec<M31>>,
    column_log_sizes: Vec<u32>,
    max_log_size: u32,
    layers: Vec<Vec<Hash>>,
    _hasher: PhantomData<H>,
}

impl<H: MerkleHasher> MerkleProver<H> {
    /// Commit to a list of columns (arbitrary, possibly repeated, log
    /// sizes). Columns are not reordered in the public API; internally
    /// they're grouped by log-size to decide which tree layer each one
    /// attaches to.
    pub fn commit(columns: Vec<Vec<M31>>) -> Self {
        assert!(!columns.is_empty(), "cannot commit to zero columns");
        let column_log_sizes: Vec<u32> = columns
            .iter()
            .map(|c| {
                assert!(c.len().is_power_of_two(), "column length must be a power of two");
                c.len().ilog2()
            })
            .collect();
        let max_log_size = *column_log_sizes.iter().max().unwrap();

        let mut layers: Vec<Vec<Hash>> = vec![Vec::new(); max_log_size as usize + 1];

        // Leaf layer.
        let leaf_cols: Vec<usize> = (0..columns.len())
            .filter(|&i| column_log_sizes[i] == max_log_size)
            .collect();
        layers[max_log_size as usize] = (0..1usize << max_log_size)
            .map(|row| {
                let row_values: Vec<M31> = leaf_cols.iter().map(|&c| columns[c][row]).collect();
                hash_layer_node::<H>(None, &row_values)
            })
            .collect();

        // Ancestor layers, attaching any columns whose log-size matches.
        for l in (0..max_log_size).rev() {
            let cols_here: Vec<usize> = (0..columns.len())
                .filter(|&i| column_log_sizes[i] == l)
                .collect();
            let child_layer = &layers[l as usize + 1];
            layers[l as usize] = (0..1usize << l)
                .map(|row| {
                    let children = (child_layer[2 * row], child_layer[2 * row + 1]);
                    let row_values: Vec<M31> = cols_here.iter().map(|&c| columns[c][row]).collect();
                    hash_layer_node::<H>(Some(children), &row_values)
                })
                .collect();
        }

        Self {
            columns,
            column_log_sizes,
            max_log_size,
            layers,
            _hasher: PhantomData,
        }
    }

    pub fn root(&self) -> Hash {
        self.layers[0][0]
    }

    pub fn max_log_size(&self) -> u32 {
        self.max_log_size
    }

    pub fn column_log_sizes(&self) -> &[u32] {
        &self.column_log_sizes
    }

    /// Produce the queried values (one `Vec<M31>` per original column, in
    /// original column order) and the decommitment witness for a set of
    /// query positions at the tree's max resolution.
    pub fn decommit(
        &self,
        queries: &[usize],
    ) -> (Vec<Vec<M31>>, MerkleDecommitment) {
        let mut sorted_queries = queries.to_vec();
        sorted_queries.sort_unstable();
        sorted_queries.dedup();

        // Queried values: every column, resolved at every original query.
        let queried_values: Vec<Vec<M31>> = (0..self.columns.len())
            .map(|c| {
                let shift = self.max_log_size - self.column_log_sizes[c];
                queries
                    .iter()
                    .map(|&q| self.columns[c][q >> shift])
                    .collect()
            })
            .collect();

        let mut hash_witness = Vec::new();
        let mut column_witness = Vec::new();

        // needed[row] = known hash at the current layer.
        let mut needed: BTreeMap<usize, Hash> = sorted_queries
            .iter()
            .map(|&q| (q, self.layers[self.max_log_size as usize][q]))
            .collect();

        for l in (1..=self.max_log_size).rev() {
            let mut parents: BTreeMap<usize, ()> = BTreeMap::new();
            for &row in needed.keys() {
                parents.insert(row >> 1, ());
            }
            let cols_here: Vec<usize> = (0..self.columns.len())
                .filter(|&i| self.column_log_sizes[i] == l - 1)
                .collect();

            // A `cols_here` column's value at a parent row is already present
            // in `queried_values` whenever that row is itself one of the
            // original query positions (at this layer's resolution); only
            // witness it otherwise.
            let shift = self.max_log_size - (l - 1);
            let layer_query_positions: std::collections::BTreeSet<usize> =
                queries.iter().map(|&q| q >> shift).collect();

            let mut next_needed = BTreeMap::new();
            for &p in parents.keys() {
                for child in [2 * p, 2 * p + 1] {
                    if !needed.contains_key(&child) {
                        hash_witness.push(self.layers[l as usize][child]);
                    }
                }
                if !layer_query_positions.contains(&p) {
                    for &c in &cols_here {
                        let v = self.columns[c][p];
                        column_witness.push(v);
                    }
                }
                let left = needed
                    .get(&(2 * p))
                    .copied()
                    .unwrap_or_else(|| self.layers[l as usize][2 * p]);
                let right = needed
                    .get(&(2 * p + 1))
                    .copied()
                    .unwrap_or_else(|| self.layers[l as usize][2 * p + 1]);
                let row_values: Vec<M31> = cols_here.iter().map(|&c| self.columns[c][p]).collect();
                let hash = hash_layer_node::<H>(Some((left, right)), &row_values);
                next_needed.insert(p, hash);
            }
            needed = next_needed;
        }

        (
            queried_values,
            MerkleDecommitment {
                hash_witness,
                column_witness,
            },
        )
    }
}

