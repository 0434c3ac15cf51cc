//! A two-state hidden Markov model for identity-by-descent (IBD) tracts.
//! The hidden state at each site is either non-IBD or IBD, and each state emits the
//! genotype likelihoods of the site through a state-conditional genotype prior.
//! All the probabilities are kept in natural logarithm. Zero probabilities are
//! represented by `f64::NEG_INFINITY`, and every log-sum-exp in this module absorbs them.
//!
//! Forward, Backward, and Viterbi algorithms are in `full`, the likelihood objective and
//! the parameter estimation are in `fit`, and the transition kernel is in `kernel`.
pub mod fit;
pub mod full;
pub mod kernel;
pub use kernel::{CoancestryDecay, TransitionKernel};
use serde::{Deserialize, Serialize};

/// Number of hidden states. It never changes.
pub const N_STATES: usize = 2;
/// Number of genotype classes(0, 1, or 2 copies of the alternative allele).
pub const N_GENOTYPES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    NonIbd = 0,
    Ibd = 1,
}

impl State {
    pub const ALL: [State; N_STATES] = [State::NonIbd, State::Ibd];
    /// Stationary probability of this state, given the IBD fraction `f`.
    pub fn stationary(self, f: f64) -> f64 {
        match self {
            State::NonIbd => 1f64 - f,
            State::Ibd => f,
        }
    }
}

impl std::default::Default for State {
    fn default() -> Self {
        State::NonIbd
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// A site of a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    /// Log-likelihoods of the genotype classes 0/1/2.
    pub genotype_lks: [f64; N_GENOTYPES],
    /// `prior[state][genotype]`: log-weight of the genotype class conditioned on the state.
    pub prior: [[f64; N_GENOTYPES]; N_STATES],
    /// Genetic distance to the previous site.
    pub dist: f64,
}

impl Site {
    pub fn new(
        genotype_lks: [f64; N_GENOTYPES],
        prior: [[f64; N_GENOTYPES]; N_STATES],
        dist: f64,
    ) -> Self {
        Self {
            genotype_lks,
            prior,
            dist,
        }
    }
    /// The boundary site at the index 0. Only its position matters.
    pub fn sentinel() -> Self {
        Self {
            genotype_lks: [0f64; N_GENOTYPES],
            prior: [[0f64; N_GENOTYPES]; N_STATES],
            dist: 0f64,
        }
    }
    /// Log-likelihood of this site emitted from `state`,
    /// summarizing all the genotype classes.
    pub fn emission(&self, state: State) -> f64 {
        let prior = &self.prior[state as usize];
        let lks = &self.genotype_lks;
        logsumexp3(lks[0] + prior[0], lks[1] + prior[1], lks[2] + prior[2])
    }
}

/// Sites of a pair of individuals. The first site is a sentinel,
/// and `1..=length` are the real sites.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    sites: Vec<Site>,
}

impl Sequence {
    /// Create a sequence from the real sites. The sentinel would be prepended.
    pub fn new(sites: Vec<Site>) -> Self {
        let mut with_sentinel = Vec::with_capacity(sites.len() + 1);
        with_sentinel.push(Site::sentinel());
        with_sentinel.extend(sites);
        Self {
            sites: with_sentinel,
        }
    }
    /// Create a sequence from per-site arrays. Each array should have `length + 1` elements,
    /// where the first element is ignored.
    pub fn from_arrays(
        genotype_lks: &[[f64; N_GENOTYPES]],
        prior: &[[[f64; N_GENOTYPES]; N_STATES]],
        dist: &[f64],
    ) -> Self {
        assert_eq!(genotype_lks.len(), prior.len());
        assert_eq!(genotype_lks.len(), dist.len());
        assert!(!genotype_lks.is_empty());
        let sites = genotype_lks
            .iter()
            .zip(prior.iter())
            .zip(dist.iter())
            .skip(1)
            .map(|((&lks, &prior), &dist)| Site::new(lks, prior, dist))
            .collect();
        Self::new(sites)
    }
    /// Number of real sites.
    pub fn length(&self) -> usize {
        self.sites.len() - 1
    }
    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }
    pub fn site(&self, s: usize) -> &Site {
        &self.sites[s]
    }
    /// Iterate over the real sites with their indices(starting from 1).
    pub fn sites(&self) -> impl Iterator<Item = (usize, &Site)> {
        self.sites.iter().enumerate().skip(1)
    }
}

/// Parameters of the HMM shared by all the engines for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// IBD fraction, or the stationary probability of the IBD state. In [0,1].
    pub f: f64,
    /// State switching rate. In [0,1].
    pub aa: f64,
}

impl Parameters {
    pub fn new(f: f64, aa: f64) -> Self {
        Self { f, aa }
    }
    pub fn to_array(self) -> [f64; 2] {
        [self.f, self.aa]
    }
    pub fn from_array([f, aa]: [f64; 2]) -> Self {
        Self { f, aa }
    }
    /// Log-probability of the boundary row.
    pub fn log_initial(&self, state: State) -> f64 {
        state.stationary(self.f).ln()
    }
}

impl std::default::Default for Parameters {
    fn default() -> Self {
        Self { f: 0.1, aa: 0.1 }
    }
}

impl std::fmt::Display for Parameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "F:{:.4}\taa:{:.4}", self.f, self.aa)
    }
}

/// The IBD hidden Markov model, parametrized by the transition kernel.
#[derive(Debug, Clone, Default)]
pub struct IbdHmm<K: TransitionKernel = CoancestryDecay> {
    kernel: K,
}

impl IbdHmm<CoancestryDecay> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: TransitionKernel> IbdHmm<K> {
    pub fn with_kernel(kernel: K) -> Self {
        Self { kernel }
    }
    pub fn kernel(&self) -> &K {
        &self.kernel
    }
    /// `trans[from][to]` over the distance `dist`.
    fn transitions(&self, dist: f64, params: &Parameters) -> [[f64; N_STATES]; N_STATES] {
        let mut trans = [[0f64; N_STATES]; N_STATES];
        for from in State::ALL {
            for to in State::ALL {
                let lk = self.kernel.log_transition(from, to, dist, params.f, params.aa);
                trans[from as usize][to as usize] = lk;
            }
        }
        trans
    }
}

/// log(exp(x) + exp(y)). Negative infinity is the identity.
pub fn logsumexp2(x: f64, y: f64) -> f64 {
    let max = x.max(y);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + ((x - max).exp() + (y - max).exp()).ln()
}

pub fn logsumexp3(x: f64, y: f64, z: f64) -> f64 {
    let max = x.max(y).max(z);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + ((x - max).exp() + (y - max).exp() + (z - max).exp()).ln()
}

pub fn logsumexp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    xs.iter().map(|x| (x - max).exp()).sum::<f64>().ln() + max
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn logsumexp_test() {
        let x = logsumexp2(0.5f64.ln(), 0.25f64.ln());
        assert!((x - 0.75f64.ln()).abs() < 1e-12);
        let y = logsumexp3(0.1f64.ln(), 0.2f64.ln(), 0.3f64.ln());
        assert!((y - 0.6f64.ln()).abs() < 1e-12);
        let z = logsumexp(&[0.1f64.ln(), 0.2f64.ln(), 0.3f64.ln(), 0.4f64.ln()]);
        assert!(z.abs() < 1e-12);
        assert!(logsumexp(&[]).is_infinite());
    }
    #[test]
    fn negative_infinity_is_absorbed() {
        let ninf = f64::NEG_INFINITY;
        assert_eq!(logsumexp2(ninf, -3.0), -3.0);
        assert_eq!(logsumexp2(-3.0, ninf), -3.0);
        assert_eq!(logsumexp2(ninf, ninf), ninf);
        assert_eq!(logsumexp3(ninf, ninf, ninf), ninf);
        assert_eq!(logsumexp3(ninf, -1.0, ninf), -1.0);
        assert_eq!(logsumexp(&[ninf, ninf]), ninf);
    }
    #[test]
    fn emission() {
        let half = 0.5f64.ln();
        let prior = [[half, half, f64::NEG_INFINITY], [0f64, f64::NEG_INFINITY, f64::NEG_INFINITY]];
        let site = Site::new([0.2f64.ln(), 0.4f64.ln(), 0.4f64.ln()], prior, 1.0);
        assert!((site.emission(State::NonIbd) - 0.3f64.ln()).abs() < 1e-12);
        assert!((site.emission(State::Ibd) - 0.2f64.ln()).abs() < 1e-12);
        let site = Site::new([f64::NEG_INFINITY; 3], prior, 1.0);
        assert_eq!(site.emission(State::NonIbd), f64::NEG_INFINITY);
    }
    #[test]
    fn sequence() {
        let seq = Sequence::new(vec![]);
        assert_eq!(seq.length(), 0);
        assert!(seq.is_empty());
        let lks = vec![[0f64; 3]; 4];
        let prior = vec![[[0f64; 3]; 2]; 4];
        let dist = vec![-1f64, 0.5, 1.0, 1.5];
        let seq = Sequence::from_arrays(&lks, &prior, &dist);
        assert_eq!(seq.length(), 3);
        assert_eq!(seq.site(0).dist, 0f64);
        let dists: Vec<_> = seq.sites().map(|(s, site)| (s, site.dist)).collect();
        assert_eq!(dists, vec![(1, 0.5), (2, 1.0), (3, 1.5)]);
    }
}
