//! Estimating identity-by-descent (IBD) tracts between a pair of individuals
//! by a two-state hidden Markov model on genotype likelihoods.
//!
//! The entry points for a single pair are `run_forward`, `run_backward`, `run_viterbi`,
//! and `optimize_parameters`. To process many pairs concurrently, build a
//! `dispatch::Dispatcher` on a `dispatch::WorkerPool` and submit tasks.
#[macro_use]
extern crate log;
pub mod dispatch;
pub mod dptable;
pub mod error;
pub mod gen_seq;
pub mod hmm;
pub mod optim;
pub use dptable::DPTable;
pub use error::DispatchError;
pub use hmm::{IbdHmm, Parameters, Sequence, Site, State};

/// Forward algorithm with the default transition kernel.
/// Return the forward table and log Pr{Data|F,aa}.
pub fn run_forward(seq: &Sequence, f: f64, aa: f64) -> (DPTable, f64) {
    IbdHmm::new().forward(seq, &Parameters::new(f, aa))
}

/// Backward algorithm with the default transition kernel.
pub fn run_backward(seq: &Sequence, f: f64, aa: f64) -> (DPTable, f64) {
    IbdHmm::new().backward(seq, &Parameters::new(f, aa))
}

/// Viterbi algorithm with the default transition kernel.
/// Return the table, the state of each site, and the score of the best path.
pub fn run_viterbi(seq: &Sequence, f: f64, aa: f64) -> (DPTable, Vec<State>, f64) {
    IbdHmm::new().viterbi(seq, &Parameters::new(f, aa))
}

/// Maximum likelihood estimation of (F, aa) in [0,1]x[0,1] by the bounded BFGS.
pub fn optimize_parameters(seq: &Sequence, init_f: f64, init_aa: f64) -> (f64, f64) {
    let minimizer = optim::BoundedBfgs::default();
    let init = Parameters::new(init_f, init_aa);
    let fitted = IbdHmm::new().optimize(seq, &init, &minimizer);
    (fitted.f, fitted.aa)
}
