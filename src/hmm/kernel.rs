//! Transition kernels between the hidden states.
use super::State;

/// Log-probability to move from a state to another state across a genetic distance.
/// Implementors should keep {1-F, F} stationary, reduce to the identity at distance zero,
/// and converge to the stationary distribution as the distance grows.
pub trait TransitionKernel: Send + Sync {
    fn log_transition(&self, from: State, to: State, dist: f64, f: f64, aa: f64) -> f64;
}

/// The solution of the continuous-time two-state Markov chain with the generator
/// Q = aa * scale * [[-F, F], [1-F, -(1-F)]], i.e.,
/// P(d) = exp(-aa * scale * d) * I + (1 - exp(-aa * scale * d)) * [1-F, F].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoancestryDecay {
    /// Multiplier converting the genetic distance into the unit of `aa`.
    pub scale: f64,
}

impl CoancestryDecay {
    pub fn new(scale: f64) -> Self {
        assert!(0f64 <= scale);
        Self { scale }
    }
}

impl std::default::Default for CoancestryDecay {
    fn default() -> Self {
        Self { scale: 1f64 }
    }
}

impl TransitionKernel for CoancestryDecay {
    fn log_transition(&self, from: State, to: State, dist: f64, f: f64, aa: f64) -> f64 {
        let rate = aa * self.scale * dist;
        // 1 - exp(-rate), without cancellation for a short distance.
        let decay = -(-rate).exp_m1();
        let stationary = to.stationary(f);
        if from == to {
            ((1f64 - decay) + decay * stationary).ln()
        } else {
            (decay * stationary).ln()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    fn matrix<K: TransitionKernel>(kernel: &K, dist: f64, f: f64, aa: f64) -> [[f64; 2]; 2] {
        let mut mat = [[0f64; 2]; 2];
        for from in State::ALL {
            for to in State::ALL {
                mat[from as usize][to as usize] =
                    kernel.log_transition(from, to, dist, f, aa).exp();
            }
        }
        mat
    }
    #[test]
    fn rows_sum_to_one() {
        let kernel = CoancestryDecay::default();
        for &dist in &[0f64, 0.01, 0.5, 3.0, 100.0] {
            for &(f, aa) in &[(0.1, 0.1), (0.5, 0.9), (0.9, 0.01)] {
                let mat = matrix(&kernel, dist, f, aa);
                for row in mat.iter() {
                    assert!((row[0] + row[1] - 1f64).abs() < 1e-12, "{:?}", mat);
                }
            }
        }
    }
    #[test]
    fn stationary() {
        let kernel = CoancestryDecay::new(2.0);
        let (f, aa) = (0.3, 0.4);
        for &dist in &[0.1, 1.0, 10.0] {
            let mat = matrix(&kernel, dist, f, aa);
            let pi = [1f64 - f, f];
            for to in 0..2 {
                let next = pi[0] * mat[0][to] + pi[1] * mat[1][to];
                assert!((next - pi[to]).abs() < 1e-12);
            }
        }
    }
    #[test]
    fn identity_at_zero() {
        let kernel = CoancestryDecay::default();
        let (f, aa) = (0.3, 0.4);
        assert_eq!(kernel.log_transition(State::NonIbd, State::NonIbd, 0f64, f, aa), 0f64);
        assert_eq!(kernel.log_transition(State::Ibd, State::Ibd, 0f64, f, aa), 0f64);
        let off = kernel.log_transition(State::Ibd, State::NonIbd, 0f64, f, aa);
        assert_eq!(off, f64::NEG_INFINITY);
    }
    #[test]
    fn converge_to_stationary() {
        let kernel = CoancestryDecay::default();
        let (f, aa) = (0.2, 0.5);
        let mat = matrix(&kernel, 1_000f64, f, aa);
        for row in mat.iter() {
            assert!((row[0] - 0.8).abs() < 1e-9);
            assert!((row[1] - 0.2).abs() < 1e-9);
        }
        // Monotone decay of staying in IBD.
        let stay: Vec<_> = [0.1, 1.0, 5.0, 20.0]
            .iter()
            .map(|&d| kernel.log_transition(State::Ibd, State::Ibd, d, f, aa))
            .collect();
        assert!(stay.windows(2).all(|w| w[1] < w[0]), "{:?}", stay);
    }
}
