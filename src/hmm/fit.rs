//! Maximum likelihood estimation of (F, aa).
use super::{IbdHmm, Parameters, Sequence, TransitionKernel};
use crate::dptable::DPTable;
use crate::optim::Minimizer;

/// Box constraints of (F, aa).
pub const LOWER_BOUNDS: [f64; 2] = [0f64, 0f64];
pub const UPPER_BOUNDS: [f64; 2] = [1f64, 1f64];

impl<K: TransitionKernel> IbdHmm<K> {
    /// The objective to be minimized: -log Pr{Data|F=x[0], aa=x[1]}.
    /// Each call runs the forward algorithm on its own scratch table.
    pub fn negative_log_likelihood(&self, seq: &Sequence, x: &[f64; 2]) -> f64 {
        let params = Parameters::from_array(*x);
        let mut scratch = DPTable::new(seq.length(), 0f64);
        -self.forward_into(seq, &params, &mut scratch)
    }
    /// Fit (F, aa) to the pair, starting from `init`.
    pub fn optimize<M: Minimizer + ?Sized>(
        &self,
        seq: &Sequence,
        init: &Parameters,
        minimizer: &M,
    ) -> Parameters {
        let objective = |x: &[f64; 2]| self.negative_log_likelihood(seq, x);
        let start = init.to_array();
        let optimized = minimizer.minimize(&objective, start, LOWER_BOUNDS, UPPER_BOUNDS);
        let optimized = Parameters::from_array(optimized);
        debug!(
            "FIT\t{}\t{}\t{:.3}",
            init,
            optimized,
            -objective(&optimized.to_array())
        );
        optimized
    }
}
