//! This module is to generate some random pairs to assess the performance.
//! Usually, it would not be used in the real-applications.
use crate::hmm::{Parameters, Sequence, Site, State, TransitionKernel, N_GENOTYPES};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct Profile {
    /// Probability that the called genotype differs from the true one.
    pub error: f64,
    /// Range of the alternative allele frequency.
    pub min_freq: f64,
    pub max_freq: f64,
    /// Mean genetic distance between adjacent sites.
    pub mean_dist: f64,
}

impl Profile {
    /// Log-prior of the genotype classes of a site with the alternative allele frequency `p`.
    /// The non-IBD state follows the Hardy-Weinberg equilibrium,
    /// while the IBD state never takes heterozygous genotypes.
    pub fn prior(p: f64) -> [[f64; N_GENOTYPES]; 2] {
        let q = 1f64 - p;
        [
            [(q * q).ln(), (2f64 * p * q).ln(), (p * p).ln()],
            [q.ln(), f64::NEG_INFINITY, p.ln()],
        ]
    }
    /// Log-likelihood of the genotype classes when `called` is observed.
    pub fn genotype_lks(&self, called: usize) -> [f64; N_GENOTYPES] {
        let mut lks = [(self.error / 2f64).ln(); N_GENOTYPES];
        lks[called] = (1f64 - self.error).ln();
        lks
    }
}

pub const PROFILE: Profile = Profile {
    error: 0.01,
    min_freq: 0.2,
    max_freq: 0.8,
    mean_dist: 1.0,
};

/// A simulated pair with the true states. The first state is for the sentinel.
#[derive(Debug, Clone)]
pub struct SimulatedPair {
    pub sequence: Sequence,
    pub states: Vec<State>,
}

/// Simulate a pair of `length` sites from the model with `params`.
pub fn simulate_pair<R: Rng, K: TransitionKernel>(
    rng: &mut R,
    length: usize,
    params: &Parameters,
    kernel: &K,
    profile: &Profile,
) -> SimulatedPair {
    let mut states = Vec::with_capacity(length + 1);
    let mut sites = Vec::with_capacity(length);
    let mut current = match rng.gen_bool(params.f) {
        true => State::Ibd,
        false => State::NonIbd,
    };
    states.push(State::NonIbd);
    for _ in 0..length {
        let dist = profile.mean_dist * rng.gen_range(0.5..1.5);
        let from = current;
        current = *State::ALL
            .choose_weighted(rng, |&to| {
                kernel
                    .log_transition(from, to, dist, params.f, params.aa)
                    .exp()
            })
            .unwrap();
        let freq = rng.gen_range(profile.min_freq..profile.max_freq);
        let prior = Profile::prior(freq);
        let truth = *[0usize, 1, 2]
            .choose_weighted(rng, |&g| prior[current as usize][g].exp())
            .unwrap();
        let called = if rng.gen_bool(profile.error) {
            let others: Vec<usize> = (0..N_GENOTYPES).filter(|&g| g != truth).collect();
            *others.choose(rng).unwrap()
        } else {
            truth
        };
        states.push(current);
        sites.push(Site::new(profile.genotype_lks(called), prior, dist));
    }
    SimulatedPair {
        sequence: Sequence::new(sites),
        states,
    }
}
