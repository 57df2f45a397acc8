// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Synapse projections.
//!
//! A layer boundary is summarized by two per-channel reductions of the
//! weight tensor.  The axis convention is deliberately asymmetric and must
//! not be "fixed": swapping an axis silently exchanges which quantity is
//! incoming vs outgoing without any shape error.
//!
//! - [`in_synapses`]:  rank-4 sums axes {1,2,3} (output channel kept),
//!   rank-2 sums axis 1; the bias joins elementwise.
//! - [`out_synapses`]: rank-4 sums axes {0,2,3} (input channel kept),
//!   rank-2 sums axis 0.
//!
//! Accumulation runs in the caller-chosen scalar `F` so the momentum solver
//! can reduce in double-double precision.

use ndarray::{ArrayD, Axis};

use crate::error::{MechError, Result};
use crate::real::Real;

fn reduce_keeping<F: Real>(w: &ArrayD<f64>, kept: Axis) -> Vec<F> {
    (0..w.len_of(kept))
        .map(|i| {
            w.index_axis(kept, i)
                .iter()
                .fold(F::zero(), |acc, &v| acc + F::from_f64(v))
        })
        .collect()
}

/// Sum of synapses flowing *into* the next layer, one entry per output
/// channel of `w`.
pub fn in_synapses<F: Real>(w: &ArrayD<f64>, b: Option<&ArrayD<f64>>) -> Result<Vec<F>> {
    let mut sums = match w.ndim() {
        4 | 2 => reduce_keeping(w, Axis(0)),
        n => return Err(MechError::UnsupportedRank(n)),
    };
    if let Some(bias) = b {
        if bias.len() != sums.len() {
            return Err(MechError::BiasMismatch {
                bias: bias.len(),
                channels: sums.len(),
            });
        }
        for (sum, &value) in sums.iter_mut().zip(bias.iter()) {
            *sum = *sum + F::from_f64(value);
        }
    }
    Ok(sums)
}

/// Sum of synapses flowing *out of* the previous layer, one entry per input
/// channel of `w`.
pub fn out_synapses<F: Real>(w: &ArrayD<f64>) -> Result<Vec<F>> {
    match w.ndim() {
        4 | 2 => Ok(reduce_keeping(w, Axis(1))),
        n => Err(MechError::UnsupportedRank(n)),
    }
}

/// `out_synapses(w_out) - in_synapses(w_in, b_in)`, the chain statistic
/// compared across time.  In a layer chain the outgoing input-channel count
/// of one layer equals the incoming output-channel count of the previous.
pub fn projection_gap<F: Real>(
    w_out: &ArrayD<f64>,
    w_in: &ArrayD<f64>,
    b_in: Option<&ArrayD<f64>>,
) -> Result<Vec<F>> {
    let outs = out_synapses::<F>(w_out)?;
    let ins = in_synapses::<F>(w_in, b_in)?;
    if outs.len() != ins.len() {
        return Err(MechError::ChannelMismatch {
            out: outs.len(),
            inp: ins.len(),
        });
    }
    Ok(outs
        .into_iter()
        .zip(ins)
        .map(|(o, i)| o - i)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array4};
    use twofloat::TwoFloat;

    fn vec_f64<F: Real>(values: Vec<F>) -> Vec<f64> {
        values.into_iter().map(Real::to_f64).collect()
    }

    #[test]
    fn rank2_in_synapses_sum_rows_and_add_bias() {
        let w = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let b = array![10.0, 20.0].into_dyn();
        assert_eq!(vec_f64(in_synapses::<f64>(&w, None).unwrap()), [3.0, 7.0]);
        assert_eq!(
            vec_f64(in_synapses::<f64>(&w, Some(&b)).unwrap()),
            [13.0, 27.0]
        );
    }

    #[test]
    fn rank2_out_synapses_sum_columns() {
        let w = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        assert_eq!(vec_f64(out_synapses::<f64>(&w).unwrap()), [4.0, 6.0]);
    }

    #[test]
    fn rank4_axis_convention_is_asymmetric() {
        // shape (out=2, in=3, kh=1, kw=2), w[o, i, 0, k] = 100*o + 10*i + k
        let w = Array4::from_shape_fn((2, 3, 1, 2), |(o, i, _, k)| {
            100.0 * o as f64 + 10.0 * i as f64 + k as f64
        })
        .into_dyn();
        // in: keep axis 0 → per output channel, sum over i and k
        let ins = vec_f64(in_synapses::<f64>(&w, None).unwrap());
        assert_eq!(ins, [(0.0 + 1.0) + (10.0 + 11.0) + (20.0 + 21.0), 663.0]);
        // out: keep axis 1 → per input channel, sum over o and k
        let outs = vec_f64(out_synapses::<f64>(&w).unwrap());
        assert_eq!(outs, [202.0, 242.0, 282.0]);
    }

    #[test]
    fn reductions_are_linear_in_the_tensor() {
        let w = array![[1.0, -2.0], [0.5, 4.0]].into_dyn();
        let scaled = w.mapv(|v| 3.0 * v);
        let base = vec_f64(out_synapses::<f64>(&w).unwrap());
        let tripled = vec_f64(out_synapses::<f64>(&scaled).unwrap());
        for (b, t) in base.iter().zip(&tripled) {
            assert_eq!(3.0 * b, *t);
        }
        let base_in = vec_f64(in_synapses::<f64>(&w, None).unwrap());
        let tripled_in = vec_f64(in_synapses::<f64>(&scaled, None).unwrap());
        for (b, t) in base_in.iter().zip(&tripled_in) {
            assert_eq!(3.0 * b, *t);
        }
    }

    #[test]
    fn gap_subtracts_elementwise() {
        let w_out = array![[1.0, 1.0], [1.0, 1.0]].into_dyn();
        let w_in = array![[1.0, 1.0], [1.0, 1.0]].into_dyn();
        let b_in = array![0.0, 0.0].into_dyn();
        let gap = vec_f64(projection_gap::<f64>(&w_out, &w_in, Some(&b_in)).unwrap());
        assert_eq!(gap, [0.0, 0.0]);
    }

    #[test]
    fn gap_rejects_channel_mismatch() {
        let w_out = array![[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]].into_dyn();
        let w_in = array![[1.0, 1.0], [1.0, 1.0]].into_dyn();
        assert!(matches!(
            projection_gap::<f64>(&w_out, &w_in, None),
            Err(MechError::ChannelMismatch { out: 3, inp: 2 })
        ));
    }

    #[test]
    fn rank3_tensors_are_rejected() {
        let w = ArrayD::zeros(ndarray::IxDyn(&[2, 2, 2]));
        assert!(matches!(
            out_synapses::<f64>(&w),
            Err(MechError::UnsupportedRank(3))
        ));
    }

    #[test]
    fn twofloat_reduction_matches_f64_on_exact_inputs() {
        let w = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let coarse = vec_f64(out_synapses::<f64>(&w).unwrap());
        let fine = vec_f64(out_synapses::<TwoFloat>(&w).unwrap());
        assert_eq!(coarse, fine);
    }
}
