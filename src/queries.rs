//! Query positions drawn from the channel: raw words reduced into a domain
//! of a given log-size, then deduplicated and sorted, with a `fold`
//! operation used when the FRI layer the query lands in has shrunk. §4.E.

use crate::channel::Channel;
use crate::hash::MerkleHasher;

/// A sorted, deduplicated set of positions into a domain of `log_size`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Queries {
    pub positions: Vec<usize>,
    pub log_size: u32,
}

impl Queries {
    /// Draw `n_queries` positions into a domain of `log_domain_size` by
    /// reducing fresh channel words modulo the domain size, then
    /// normalizing (sort + dedup).
    pub fn draw<H: MerkleHasher>(
        channel: &mut Channel<H>,
        log_domain_size: u32,
        n_queries: usize,
    ) -> Self {
        let words = channel.draw_query_words(n_queries);
        let domain_size = 1usize << log_domain_size;
        let mut positions: Vec<usize> = words
            .into_iter()
            .map(|w| (w as usize) & (domain_size - 1))
            .collect();
        positions.sort_unstable();
        positions.dedup();
        Self {
            positions,
            log_size: log_domain_size,
        }
    }

    /// Fold query positions from this domain down into one `n_folds` steps
    /// smaller, re-normalizing. Each fold step is a bit shift since folding
    /// a domain in half always maps position `p` to `p >> 1`.
    pub fn fold(&self, n_folds: u32) -> Self {
        assert!(n_folds <= self.log_size);
        let mut positions: Vec<usize> = self.positions.iter().map(|&p| p >> n_folds).collect();
        positions.sort_unstable();
        positions.dedup();
        Self {
            positions,
            log_size: self.log_size - n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_sorts_and_dedups() {
        let q = Queries {
            positions: vec![15, 7, 7, 3, 2, 8, 1, 0],
            log_size: 4,
        };
        let normalized = {
            let mut p = q.positions.clone();
            p.sort_unstable();
            p.dedup();
            p
        };
        assert_eq!(normalized, vec![0, 1, 2, 3, 7, 8, 15]);
    }

    #[test]
    fn fold_matches_spec_example() {
        let q = Queries {
            positions: vec![0, 1, 2, 3, 7, 8, 15],
            log_size: 4,
        };
        let folded1 = q.fold(1);
        assert_eq!(folded1.positions, vec![0, 1, 3, 4, 7]);
        assert_eq!(folded1.log_size, 3);

        let folded2 = folded1.fold(1);
        assert_eq!(folded2.positions, vec![0, 1, 2, 3]);
        assert_eq!(folded2.log_size, 2);
    }
}
