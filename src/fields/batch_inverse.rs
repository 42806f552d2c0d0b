//! Montgomery's batch-inversion trick, §4.A.
//!
//! Computes `n` inverses with a single Fermat inverse per SIMD lane instead
//! of one per element. Fails (panics, same as the scalar `inverse()`) if any
//! input is zero.

use crate::fields::{FieldExpOps, One};

/// Number of interleaved lanes in the fast path. An arbitrary-but-correct
/// choice (§9, open question ii): any width dividing the input length and
/// fitting the platform's natural vector width works equally well.
const WIDTH: usize = 4;

/// `dst[i] = column[i]^-1` for all `i`.
///
/// For `n < WIDTH` or `n % WIDTH != 0` falls back to the classic
/// single-lane cumulative-product method. Otherwise runs the interleaved
/// variant: `WIDTH` independent cumulative-product chains are built across
/// the column, the final `WIDTH`-wide tail is inverted with one Fermat
/// inverse per lane, and each chain is unwound back-to-front.
pub fn batch_inverse_in_place<F: FieldExpOps + One + Copy>(column: &[F], dst: &mut [F]) {
    assert_eq!(column.len(), dst.len());
    let n = column.len();
    if n == 0 {
        return;
    }
    if n < WIDTH || n % WIDTH != 0 {
        batch_inverse_classic(column, dst);
        return;
    }

    // Cumulative product per lane: dst[i] = column[i] * dst[i - WIDTH]
    // (with dst[lane] = column[lane] for i < WIDTH).
    for lane in 0..WIDTH {
        dst[lane] = column[lane];
    }
    for i in WIDTH..n {
        dst[i] = dst[i - WIDTH] * column[i];
    }

    // Invert the last WIDTH cumulative products, one Fermat inverse per lane.
    let mut tail_inv = [F::one(); WIDTH];
    for lane in 0..WIDTH {
        tail_inv[lane] = dst[n - WIDTH + lane]
            .inverse()
            .expect("batch_inverse_in_place requires every element to be non-zero");
    }

    // Unwind back-to-front: dst[i] currently holds the forward cumulative
    // product; multiplying by the running tail inverse peels off everything
    // above `i` in the chain, leaving column[i]^-1.
    for i in (WIDTH..n).rev() {
        let lane = i % WIDTH;
        let prev_cumulative = dst[i - WIDTH];
        dst[i] = prev_cumulative * tail_inv[lane];
        tail_inv[lane] *= column[i];
    }
    for lane in 0..WIDTH {
        dst[lane] = tail_inv[lane];
    }
}

fn batch_inverse_classic<F: FieldExpOps + One + Copy>(column: &[F], dst: &mut [F]) {
    let n = column.len();
    let mut cumulative = vec![F::one(); n];
    let mut acc = F::one();
    for i in 0..n {
        cumulative[i] = acc;
        acc = acc * column[i];
    }
    let mut acc_inv = acc
        .inverse()
        .expect("batch_inverse_in_place requires every element to be non-zero");
    for i in (0..n).rev() {
        dst[i] = cumulative[i] * acc_inv;
        acc_inv = acc_inv * column[i];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::m31::M31;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn rand_nonzero_column(n: usize, seed: u64) -> Vec<M31> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| loop {
                let v = M31::from(rng.gen::<u32>());
                if !matches!(v.as_u32(), 0) {
                    return v;
                }
            })
            .collect()
    }

    #[test]
    fn matches_scalar_inverse() {
        let column = rand_nonzero_column(37, 1);
        let mut dst = vec![M31::zero(); column.len()];
        batch_inverse_in_place(&column, &mut dst);
        for (c, d) in column.iter().zip(dst.iter()) {
            assert_eq!(c.inverse().unwrap(), *d);
        }
    }

    #[test]
    fn chunked_matches_unchunked() {
        let column = rand_nonzero_column(64, 2);
        let mut dst_fast = vec![M31::zero(); column.len()];
        batch_inverse_in_place(&column, &mut dst_fast);

        let mut dst_classic = vec![M31::zero(); column.len()];
        batch_inverse_classic(&column, &mut dst_classic);

        assert_eq!(dst_fast, dst_classic);
    }

    #[test]
    fn odd_length_falls_back_to_classic() {
        let column = rand_nonzero_column(13, 3);
        let mut dst = vec![M31::zero(); column.len()];
        batch_inverse_in_place(&column, &mut dst);
        for (c, d) in column.iter().zip(dst.iter()) {
            assert_eq!(c.inverse().unwrap(), *d);
        }
    }
}
